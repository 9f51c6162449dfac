//! COM apartment handling for the threads that touch WASAPI objects.

use std::cell::RefCell;

use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::*;

use spectrum_core::models::error::CaptureError;

/// Balances one successful `CoInitializeEx` on the thread that created it.
pub(crate) struct CoUninitializeGuard;

impl CoUninitializeGuard {
    /// Join the multithreaded apartment on the calling thread.
    ///
    /// Returns `Ok(None)` when the thread already lives in a single-threaded
    /// apartment; WASAPI objects are agile, so that is usable too.
    pub(crate) fn enter_mta() -> Result<Option<Self>, CaptureError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            log::warn!("thread is already in a single-threaded COM apartment");
            return Ok(None);
        }
        hr.ok()
            .map_err(|e| CaptureError::Unknown(format!("CoInitializeEx failed: {}", e)))?;
        Ok(Some(Self))
    }
}

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

thread_local! {
    static APARTMENT: RefCell<Option<CoUninitializeGuard>> = const { RefCell::new(None) };
}

/// Make sure the calling thread has joined COM. The apartment is left when
/// the thread exits.
pub(crate) fn ensure_apartment() -> Result<(), CaptureError> {
    APARTMENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = CoUninitializeGuard::enter_mta()?;
        }
        Ok(())
    })
}
