use thiserror::Error;

/// Errors that can occur while acquiring or analysing loopback audio.
///
/// Cloneable so the capture thread can park the most recent failure in
/// shared state for `CaptureSession::last_error` to hand back later.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available")]
    DeviceNotAvailable,

    #[error("audio device was invalidated")]
    DeviceInvalidated,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("setup failed after {attempts} attempt(s): {reason}")]
    SetupFailure { attempts: u32, reason: String },

    #[error("start failed: {0}")]
    StartFailure(String),

    #[error("runtime fault: {0}")]
    RuntimeFault(String),

    #[error("capture session is not initialized")]
    NotInitialized,

    #[error("capture already running")]
    AlreadyCapturing,

    #[error("capture session is faulted; re-initialize before starting")]
    Faulted,

    #[error("timeout")]
    Timeout,

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Coarse grouping of [`CaptureError`] by where in the lifecycle it arises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Device enumeration, activation or format negotiation.
    Setup,
    /// The device accepted setup but refused to stream.
    Start,
    /// The capture loop failed while running.
    Runtime,
    /// The caller used the session in the wrong state.
    Usage,
}

impl CaptureError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DeviceNotAvailable | Self::ConfigurationFailed(_) | Self::SetupFailure { .. } => {
                ErrorCategory::Setup
            }
            Self::StartFailure(_) => ErrorCategory::Start,
            Self::DeviceInvalidated | Self::RuntimeFault(_) | Self::Timeout | Self::Unknown(_) => {
                ErrorCategory::Runtime
            }
            Self::NotInitialized | Self::AlreadyCapturing | Self::Faulted => ErrorCategory::Usage,
        }
    }

    /// Whether this error means the endpoint went away (unplugged, disabled,
    /// default device switched).
    pub fn is_device_loss(&self) -> bool {
        matches!(self, Self::DeviceInvalidated | Self::DeviceNotAvailable)
    }
}
