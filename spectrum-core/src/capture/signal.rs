use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::models::error::CaptureError;
use crate::traits::audio_backend::{DataSignal, WaitOutcome};

/// In-process auto-reset event.
///
/// `notify` sets the signal and wakes one waiter; a successful `wait`
/// clears it again. A notify with no waiter is remembered until the next
/// wait.
#[derive(Debug, Default)]
pub struct EventSignal {
    set: Mutex<bool>,
    cond: Condvar,
}

impl EventSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        *self.set.lock()
    }
}

impl DataSignal for EventSignal {
    fn wait(&self, timeout: Duration) -> Result<WaitOutcome, CaptureError> {
        let mut set = self.set.lock();
        if !*set {
            // Spurious wakeups just re-check the flag.
            let _ = self.cond.wait_while_for(&mut set, |set| !*set, timeout);
        }
        if *set {
            *set = false;
            Ok(WaitOutcome::Signaled)
        } else {
            Ok(WaitOutcome::TimedOut)
        }
    }

    fn notify(&self) {
        *self.set.lock() = true;
        self.cond.notify_one();
    }
}
