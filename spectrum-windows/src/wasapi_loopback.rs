//! WASAPI loopback backend for the default render endpoint.
//!
//! Captures the mix going to the output device with
//! `AUDCLNT_STREAMFLAGS_LOOPBACK`. No special permissions are needed.
//!
//! ## Notes
//! - Shared mode only; the stream runs at the engine's mix format (32-bit float)
//! - Event-driven loopback needs Windows 10 1703+; older systems fall back to polling
//! - DRM-protected audio arrives as silent packets

use std::sync::Arc;
use std::time::Duration;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use spectrum_core::models::audio_models::AudioFormat;
use spectrum_core::models::error::CaptureError;
use spectrum_core::traits::audio_backend::{
    AudioBackend, CaptureStream, DataSignal, LoopbackEndpoint, RawPacket, WaitOutcome,
};

use crate::com::{ensure_apartment, CoUninitializeGuard};
use crate::device_enumerator::DeviceEnumerator;

/// Engine buffer requested at initialization: 0.5 s in 100 ns units.
const BUFFER_DURATION: i64 = 5_000_000;

const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;
/// KSDATAFORMAT_SUBTYPE_IEEE_FLOAT
const SUBTYPE_IEEE_FLOAT: windows::core::GUID =
    windows::core::GUID::from_u128(0x00000003_0000_0010_8000_00aa00389b71);

/// Whether `format` carries IEEE float samples, either directly or through
/// the extensible SubFormat.
///
/// # Safety
/// `format` must point to a valid `WAVEFORMATEX`, followed by the rest of a
/// `WAVEFORMATEXTENSIBLE` when its tag says so.
unsafe fn is_float_format(format: *const WAVEFORMATEX) -> bool {
    let wf = &*format;
    match wf.wFormatTag {
        WAVE_FORMAT_IEEE_FLOAT => true,
        WAVE_FORMAT_EXTENSIBLE => {
            let ext = format as *const WAVEFORMATEXTENSIBLE;
            // Packed struct; the GUID may be unaligned.
            let sub_format = std::ptr::read_unaligned(std::ptr::addr_of!((*ext).SubFormat));
            sub_format == SUBTYPE_IEEE_FLOAT
        }
        _ => false,
    }
}

fn map_error(err: windows::core::Error, call: &str) -> CaptureError {
    if err.code() == AUDCLNT_E_DEVICE_INVALIDATED {
        CaptureError::DeviceInvalidated
    } else {
        CaptureError::RuntimeFault(format!("{} failed: {}", call, err))
    }
}

/// Backend opening loopback clients on the default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasapiBackend;

impl WasapiBackend {
    pub fn new() -> Self {
        Self
    }

    /// Shared handle for `CaptureSession::new`.
    pub fn shared() -> Arc<dyn AudioBackend> {
        Arc::new(Self)
    }
}

impl AudioBackend for WasapiBackend {
    fn activate_default_output(&self) -> Result<Box<dyn LoopbackEndpoint>, CaptureError> {
        ensure_apartment()?;
        let enumerator = DeviceEnumerator::new()?;
        let device = enumerator.default_render_device()?;
        log::debug!(
            "activating loopback on '{}' ({})",
            DeviceEnumerator::friendly_name(&device).unwrap_or_else(|| "unknown device".into()),
            DeviceEnumerator::device_id(&device).unwrap_or_default()
        );
        Ok(Box::new(WasapiEndpoint::activate(device)?))
    }
}

/// Engine mix format, owned CoTaskMem allocation.
struct MixFormat(*mut WAVEFORMATEX);

impl MixFormat {
    fn as_ptr(&self) -> *const WAVEFORMATEX {
        self.0
    }
}

impl Drop for MixFormat {
    fn drop(&mut self) {
        unsafe {
            CoTaskMemFree(Some(self.0 as *const _));
        }
    }
}

/// An activated `IAudioClient` on the render device, not yet streaming.
pub struct WasapiEndpoint {
    device: IMMDevice,
    client: IAudioClient,
    mix: MixFormat,
    format: AudioFormat,
    event: Option<Arc<Win32Event>>,
}

// SAFETY: WASAPI interfaces are agile and the mix format pointer is only
// read; the endpoint is used by one thread at a time.
unsafe impl Send for WasapiEndpoint {}

impl WasapiEndpoint {
    fn activate(device: IMMDevice) -> Result<Self, CaptureError> {
        unsafe {
            let client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| CaptureError::ConfigurationFailed(format!("Activate failed: {}", e)))?;

            let mix = MixFormat(client.GetMixFormat().map_err(|e| {
                CaptureError::ConfigurationFailed(format!("GetMixFormat failed: {}", e))
            })?);
            let wf = &*mix.as_ptr();
            let format = AudioFormat::new(wf.nSamplesPerSec, wf.nChannels, wf.wBitsPerSample);
            if format.bits_per_sample != 32 || !is_float_format(mix.as_ptr()) {
                return Err(CaptureError::ConfigurationFailed(format!(
                    "mix format {} is not 32-bit float",
                    format
                )));
            }

            Ok(Self {
                device,
                client,
                mix,
                format,
                event: None,
            })
        }
    }

    fn initialize_client(&self, flags: u32) -> Result<(), CaptureError> {
        unsafe {
            self.client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    flags,
                    BUFFER_DURATION,
                    0,
                    self.mix.as_ptr(),
                    None
                )
                .map_err(|e| {
                    CaptureError::ConfigurationFailed(format!(
                        "IAudioClient::Initialize failed: {}",
                        e
                    ))
                })
        }
    }
}

impl LoopbackEndpoint for WasapiEndpoint {
    fn mix_format(&self) -> AudioFormat {
        self.format
    }

    fn initialize_event_driven(&mut self) -> Result<Arc<dyn DataSignal>, CaptureError> {
        let event = Arc::new(Win32Event::new()?);
        self.initialize_client(
            AUDCLNT_STREAMFLAGS_LOOPBACK
                | AUDCLNT_STREAMFLAGS_EVENTCALLBACK
                | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM,
        )?;
        unsafe {
            self.client.SetEventHandle(event.handle()).map_err(|e| {
                CaptureError::ConfigurationFailed(format!("SetEventHandle failed: {}", e))
            })?;
        }
        self.event = Some(Arc::clone(&event));
        Ok(event)
    }

    fn initialize_polling(&mut self) -> Result<(), CaptureError> {
        self.initialize_client(
            AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM,
        )
    }

    fn reset(&mut self) -> Result<(), CaptureError> {
        self.event = None;
        self.client = unsafe { self.device.Activate(CLSCTX_ALL, None) }
            .map_err(|e| CaptureError::ConfigurationFailed(format!("Activate failed: {}", e)))?;
        Ok(())
    }

    fn into_stream(self: Box<Self>) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let capture: IAudioCaptureClient = unsafe { self.client.GetService() }
            .map_err(|e| CaptureError::ConfigurationFailed(format!("GetService failed: {}", e)))?;
        let endpoint = *self;
        Ok(Box::new(WasapiStream {
            client: endpoint.client,
            capture,
            channels: endpoint.format.channels,
            mmcss: None,
            com: None,
            _event: endpoint.event,
        }))
    }
}

/// Packet queue of an initialized loopback client.
pub struct WasapiStream {
    client: IAudioClient,
    capture: IAudioCaptureClient,
    channels: u16,
    mmcss: Option<HANDLE>,
    com: Option<CoUninitializeGuard>,
    // Dropped after the client that signals it.
    _event: Option<Arc<Win32Event>>,
}

// SAFETY: WASAPI interfaces are agile; packet methods run only on the
// capture thread and start/stop only while it is not running.
unsafe impl Send for WasapiStream {}

impl CaptureStream for WasapiStream {
    fn start(&mut self) -> Result<(), CaptureError> {
        unsafe { self.client.Start() }
            .map_err(|e| CaptureError::StartFailure(format!("IAudioClient::Start failed: {}", e)))
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        unsafe { self.client.Stop() }.map_err(|e| map_error(e, "IAudioClient::Stop"))
    }

    fn next_packet_size(&mut self) -> Result<u32, CaptureError> {
        unsafe { self.capture.GetNextPacketSize() }.map_err(|e| map_error(e, "GetNextPacketSize"))
    }

    fn get_buffer(&mut self) -> Result<RawPacket<'_>, CaptureError> {
        let mut data: *mut u8 = std::ptr::null_mut();
        let mut frames: u32 = 0;
        let mut flags: u32 = 0;
        unsafe { self.capture.GetBuffer(&mut data, &mut frames, &mut flags, None, None) }
            .map_err(|e| map_error(e, "GetBuffer"))?;

        let silent = flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0;
        let samples: &[f32] = if frames == 0 || data.is_null() {
            &[]
        } else {
            // Valid until ReleaseBuffer, which needs `&mut self` again.
            let len = frames as usize * self.channels as usize;
            unsafe { std::slice::from_raw_parts(data as *const f32, len) }
        };
        Ok(RawPacket { samples, frames, silent })
    }

    fn release_buffer(&mut self, frames: u32) -> Result<(), CaptureError> {
        unsafe { self.capture.ReleaseBuffer(frames) }.map_err(|e| map_error(e, "ReleaseBuffer"))
    }

    fn enter_capture_thread(&mut self) -> Result<(), CaptureError> {
        self.com = CoUninitializeGuard::enter_mta()?;

        // MMCSS registration for real-time priority
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let registered =
            unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) };
        match registered {
            Ok(handle) => self.mmcss = Some(handle),
            Err(e) => log::warn!("MMCSS registration failed: {}", e),
        }
        Ok(())
    }

    fn leave_capture_thread(&mut self) {
        if let Some(handle) = self.mmcss.take() {
            let _ = unsafe { AvRevertMmThreadCharacteristics(handle) };
        }
        self.com = None;
    }
}

/// Auto-reset Win32 event the audio engine sets when a period is ready.
pub struct Win32Event(HANDLE);

// SAFETY: event handles may be waited on and set from any thread.
unsafe impl Send for Win32Event {}
unsafe impl Sync for Win32Event {}

impl Win32Event {
    pub fn new() -> Result<Self, CaptureError> {
        unsafe { CreateEventW(None, false, false, PCWSTR::null()) }
            .map(Self)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("CreateEventW failed: {}", e)))
    }

    fn handle(&self) -> HANDLE {
        self.0
    }
}

impl DataSignal for Win32Event {
    fn wait(&self, timeout: Duration) -> Result<WaitOutcome, CaptureError> {
        let millis = timeout.as_millis().min(u128::from(u32::MAX - 1)) as u32;
        let result = unsafe { WaitForSingleObject(self.0, millis) };
        if result == WAIT_OBJECT_0 {
            Ok(WaitOutcome::Signaled)
        } else if result == WAIT_TIMEOUT {
            Ok(WaitOutcome::TimedOut)
        } else {
            Err(CaptureError::RuntimeFault(format!(
                "WaitForSingleObject returned {:#x}",
                result.0
            )))
        }
    }

    fn notify(&self) {
        if let Err(e) = unsafe { SetEvent(self.0) } {
            log::warn!("SetEvent failed: {}", e);
        }
    }
}

impl Drop for Win32Event {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}
