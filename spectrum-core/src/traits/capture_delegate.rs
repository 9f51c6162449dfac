use crate::models::error::CaptureError;
use crate::models::state::CaptureState;

/// Event delegate for capture session notifications.
///
/// `on_state_changed` fires on the thread that drives the session;
/// `on_fault` fires on the capture thread. Implementations should marshal to
/// their own thread if needed.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called when the capture loop stops because of an error rather than a
    /// stop request.
    fn on_fault(&self, error: &CaptureError);
}
