use crate::models::audio_models::{SpectrumData, SpectrumScale, WindowType};
use crate::models::error::CaptureError;

/// A provider of bar values for a renderer.
///
/// `update` and `spectrum` are called from the host's frame loop at whatever
/// cadence it runs; neither blocks on audio I/O.
pub trait AudioSource: Send {
    fn initialize(&mut self) -> Result<(), CaptureError>;

    /// Advance by `delta_time` seconds and fold in any pending audio.
    fn update(&mut self, delta_time: f32);

    /// Snapshot of the current smoothed bars.
    fn spectrum(&self) -> SpectrumData;

    fn set_amplification(&mut self, _amplification: f32) {}

    fn set_smoothing(&mut self, _smoothing: f32) {}

    fn set_bar_count(&mut self, _count: usize) {}

    fn set_window(&mut self, _window: WindowType) {}

    fn set_scale(&mut self, _scale: SpectrumScale) {}

    fn start_capture(&mut self) {}

    fn stop_capture(&mut self) {}

    fn is_capturing(&self) -> bool {
        false
    }
}
