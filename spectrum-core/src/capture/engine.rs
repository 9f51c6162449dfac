use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::packet_processor::PacketProcessor;
use crate::models::audio_models::CaptureMode;
use crate::models::error::CaptureError;
use crate::traits::audio_backend::{DataSignal, WaitOutcome};

/// Acquisition strategy run on the capture thread.
///
/// Both loops exit with `Ok` once `running` is cleared, and with `Err` on the
/// first packet or wait failure.
#[derive(Clone)]
pub enum CaptureEngine {
    /// Wait on the device's "data ready" signal, bounded by `timeout` so a
    /// stop request is seen even if a wake-up is lost.
    EventDriven {
        signal: Arc<dyn DataSignal>,
        timeout: Duration,
    },
    /// Sleep `interval` between drains.
    Polling { interval: Duration },
}

impl CaptureEngine {
    pub fn mode(&self) -> CaptureMode {
        match self {
            Self::EventDriven { .. } => CaptureMode::EventDriven,
            Self::Polling { .. } => CaptureMode::Polling,
        }
    }

    pub fn run(
        &self,
        running: &AtomicBool,
        processor: &mut PacketProcessor,
    ) -> Result<(), CaptureError> {
        match self {
            Self::EventDriven { signal, timeout } => {
                while running.load(Ordering::Acquire) {
                    match signal.wait(*timeout)? {
                        WaitOutcome::Signaled => {
                            if !running.load(Ordering::Acquire) {
                                break;
                            }
                            processor.drain()?;
                        }
                        WaitOutcome::TimedOut => {
                            log::trace!("no audio signalled within {:?}", timeout);
                        }
                    }
                }
            }
            Self::Polling { interval } => {
                while running.load(Ordering::Acquire) {
                    thread::sleep(*interval);
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    processor.drain()?;
                }
            }
        }
        Ok(())
    }

    /// Unblock a waiting loop after `running` has been cleared.
    pub fn wake(&self) {
        if let Self::EventDriven { signal, .. } = self {
            signal.notify();
        }
    }
}

impl std::fmt::Debug for CaptureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventDriven { timeout, .. } => f
                .debug_struct("EventDriven")
                .field("timeout", timeout)
                .finish_non_exhaustive(),
            Self::Polling { interval } => f
                .debug_struct("Polling")
                .field("interval", interval)
                .finish(),
        }
    }
}
