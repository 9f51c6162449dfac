use serde::Serialize;

use super::audio_models::CaptureMode;
use super::error::CaptureError;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → initialized → running → stopped ⇄ running
///                         ↓
///                      faulted → (initialize) → initialized
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Initialized,
    Running,
    Stopped,
    Faulted(CaptureError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }

    /// States from which `start` may be called.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Initialized | Self::Stopped)
    }
}

/// Counters and identifiers for debugging a capture session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureDiagnostics {
    pub session_id: String,
    pub mode: Option<CaptureMode>,
    pub init_attempts: u32,
    pub packets_delivered: u64,
    pub silent_packets: u64,
    pub frames_delivered: u64,
    pub fault_count: u32,
    pub last_fault_at: Option<String>,
}
