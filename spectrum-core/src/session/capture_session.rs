use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::capture::device_session::DeviceSession;
use crate::capture::engine::CaptureEngine;
use crate::capture::packet_processor::{PacketProcessor, PacketStats, SinkSlot};
use crate::models::audio_models::{AudioFormat, CaptureMode};
use crate::models::config::CaptureSettings;
use crate::models::error::CaptureError;
use crate::models::state::{CaptureDiagnostics, CaptureState};
use crate::traits::audio_backend::{AudioBackend, AudioDataCallback};
use crate::traits::capture_delegate::CaptureDelegate;

/// Mutable session state shared with the capture thread.
struct SessionShared {
    state: CaptureState,
    last_error: Option<CaptureError>,
    diagnostics: CaptureDiagnostics,
}

/// Everything the capture thread needs to report a fault.
#[derive(Clone)]
struct FaultReporter {
    running: Arc<AtomicBool>,
    faulted: Arc<AtomicBool>,
    shared: Arc<Mutex<SessionShared>>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl FaultReporter {
    fn report(&self, error: CaptureError) {
        self.running.store(false, Ordering::Release);
        self.faulted.store(true, Ordering::Release);

        if error.is_device_loss() {
            log::error!("audio device lost during capture: {}", error);
        } else {
            log::error!("capture loop faulted: {}", error);
        }

        let state = CaptureState::Faulted(error.clone());
        {
            let mut shared = self.shared.lock();
            shared.state = state.clone();
            shared.last_error = Some(error.clone());
            shared.diagnostics.fault_count += 1;
            shared.diagnostics.last_fault_at = Some(chrono::Utc::now().to_rfc3339());
        }

        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&state);
            delegate.on_fault(&error);
        }
    }
}

/// Loopback capture of the default output device on a dedicated thread.
///
/// Lifecycle:
/// ```text
/// new → initialize → start ⇄ stop
///                      ↓ (runtime error)
///                   faulted → stop (releases device) → initialize
/// ```
///
/// Audio is pushed to the callback registered with [`set_callback`](Self::set_callback);
/// the callback runs on the capture thread and may be swapped at any time.
pub struct CaptureSession {
    backend: Arc<dyn AudioBackend>,
    settings: CaptureSettings,
    device: Option<DeviceSession>,
    worker: Option<JoinHandle<PacketProcessor>>,
    running: Arc<AtomicBool>,
    faulted: Arc<AtomicBool>,
    shared: Arc<Mutex<SessionShared>>,
    sink: SinkSlot,
    stats: Arc<PacketStats>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl CaptureSession {
    pub fn new(backend: Arc<dyn AudioBackend>, settings: CaptureSettings) -> Self {
        let diagnostics = CaptureDiagnostics {
            session_id: uuid::Uuid::new_v4().to_string(),
            ..CaptureDiagnostics::default()
        };
        Self {
            backend,
            settings,
            device: None,
            worker: None,
            running: Arc::new(AtomicBool::new(false)),
            faulted: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(Mutex::new(SessionShared {
                state: CaptureState::Idle,
                last_error: None,
                diagnostics,
            })),
            sink: Arc::new(Mutex::new(None)),
            stats: Arc::new(PacketStats::default()),
            delegate: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Register the audio sink. Replaces any previous one, also mid-capture.
    pub fn set_callback(&self, callback: AudioDataCallback) {
        *self.sink.lock() = Some(callback);
    }

    pub fn clear_callback(&self) {
        *self.sink.lock() = None;
    }

    /// Negotiate a fresh device session, discarding any previous one.
    ///
    /// Clears the faulted flag. A faulted session whose thread has not been
    /// joined yet is stopped first.
    pub fn initialize(&mut self) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            if !self.is_faulted() {
                return Err(CaptureError::AlreadyCapturing);
            }
            self.stop();
        }

        self.device = None;
        self.faulted.store(false, Ordering::Release);

        match DeviceSession::initialize(self.backend.as_ref(), &self.settings) {
            Ok(device) => {
                log::info!(
                    "loopback capture initialized: {} ({})",
                    device.format(),
                    device.mode()
                );
                {
                    let mut shared = self.shared.lock();
                    shared.last_error = None;
                    shared.diagnostics.init_attempts += device.attempts();
                    shared.diagnostics.mode = Some(device.mode());
                }
                self.device = Some(device);
                self.set_state(CaptureState::Initialized);
                Ok(())
            }
            Err(err) => {
                self.shared.lock().last_error = Some(err.clone());
                self.set_state(CaptureState::Idle);
                Err(err)
            }
        }
    }

    /// Start the device stream and spawn the capture thread.
    ///
    /// A refused stream start is retried once after `start_retry_delay`.
    /// Failure leaves the session initialized and not faulted.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_faulted() {
            return Err(CaptureError::Faulted);
        }
        if self.worker.is_some() {
            return Err(CaptureError::AlreadyCapturing);
        }
        let retry_delay = self.settings.start_retry_delay();
        let device = self.device.as_mut().ok_or(CaptureError::NotInitialized)?;

        if let Err(first) = Self::start_stream(device) {
            log::warn!("capture start failed: {}; retrying once", first);
            thread::sleep(retry_delay);
            if let Err(err) = Self::start_stream(device) {
                log::error!("capture start failed after retry: {}", err);
                self.shared.lock().last_error = Some(err.clone());
                return Err(err);
            }
        }

        let stream = device.take_stream().ok_or(CaptureError::NotInitialized)?;
        let engine = device.engine().clone();
        let processor = PacketProcessor::new(
            stream,
            device.format().channels,
            Arc::clone(&self.sink),
            Arc::clone(&self.stats),
            self.settings.deliver_silent_packets,
        );

        let reporter = self.reporter();

        self.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name("spectrum-capture".into())
            .spawn(move || run_capture_loop(engine, processor, reporter));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                self.set_state(CaptureState::Running);
                log::info!("loopback capture started");
                Ok(())
            }
            Err(e) => {
                // The stream went down with the closure; a new device session is required.
                self.running.store(false, Ordering::Release);
                self.device = None;
                let err = CaptureError::StartFailure(format!(
                    "failed to spawn capture thread: {}",
                    e
                ));
                log::error!("{}", err);
                self.shared.lock().last_error = Some(err.clone());
                self.set_state(CaptureState::Idle);
                Err(err)
            }
        }
    }

    fn start_stream(device: &mut DeviceSession) -> Result<(), CaptureError> {
        let stream = device.stream_mut().ok_or(CaptureError::NotInitialized)?;
        stream.start().map_err(|err| match err {
            CaptureError::StartFailure(_) => err,
            other => CaptureError::StartFailure(other.to_string()),
        })
    }

    /// Stop capture and join the capture thread.
    ///
    /// Safe to call at any time and any number of times. After a fault the
    /// device session is released so the next `initialize` starts clean.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        let Some(handle) = self.worker.take() else {
            return;
        };

        if let Some(device) = self.device.as_ref() {
            device.engine().wake();
        }

        match handle.join() {
            Ok(processor) => {
                let mut stream = processor.into_stream();
                if let Err(err) = stream.stop() {
                    log::warn!("failed to stop device stream: {}", err);
                }
                if let Some(device) = self.device.as_mut() {
                    device.restore_stream(stream);
                }
            }
            Err(_) => {
                log::error!("capture thread panicked outside the capture loop");
                self.reporter()
                    .report(CaptureError::RuntimeFault("capture thread panicked".into()));
            }
        }

        if self.is_faulted() {
            self.device = None;
            log::info!("faulted capture stopped; device released");
        } else {
            self.set_state(CaptureState::Stopped);
            log::info!("loopback capture stopped");
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Whether a capture thread exists that `stop` has not joined yet.
    pub fn has_capture_thread(&self) -> bool {
        self.worker.is_some()
    }

    pub fn last_error(&self) -> Option<CaptureError> {
        self.shared.lock().last_error.clone()
    }

    pub fn state(&self) -> CaptureState {
        self.shared.lock().state.clone()
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.device.as_ref().map(DeviceSession::format)
    }

    pub fn mode(&self) -> Option<CaptureMode> {
        self.device.as_ref().map(DeviceSession::mode)
    }

    /// Device sample rate, 0 when not initialized.
    pub fn sample_rate(&self) -> u32 {
        self.format().map_or(0, |f| f.sample_rate)
    }

    pub fn channels(&self) -> u16 {
        self.format().map_or(0, |f| f.channels)
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.format().map_or(0, |f| f.bits_per_sample)
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        let mut diagnostics = self.shared.lock().diagnostics.clone();
        diagnostics.packets_delivered = self.stats.packets_delivered();
        diagnostics.silent_packets = self.stats.silent_packets();
        diagnostics.frames_delivered = self.stats.frames_delivered();
        diagnostics
    }

    fn reporter(&self) -> FaultReporter {
        FaultReporter {
            running: Arc::clone(&self.running),
            faulted: Arc::clone(&self.faulted),
            shared: Arc::clone(&self.shared),
            delegate: self.delegate.clone(),
        }
    }

    fn set_state(&self, new_state: CaptureState) {
        self.shared.lock().state = new_state.clone();
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capture thread body. Returns the processor so its stream can be reused.
fn run_capture_loop(
    engine: CaptureEngine,
    mut processor: PacketProcessor,
    reporter: FaultReporter,
) -> PacketProcessor {
    if let Err(err) = processor.stream_mut().enter_capture_thread() {
        reporter.report(err);
        return processor;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.run(&reporter.running, &mut processor)
    }));
    processor.stream_mut().leave_capture_thread();

    let result = outcome
        .unwrap_or_else(|_| Err(CaptureError::RuntimeFault("capture loop panicked".into())));
    match result {
        Ok(()) => log::debug!("capture loop exited on stop request"),
        Err(err) if !reporter.running.load(Ordering::Acquire) => {
            log::debug!("capture loop ended during stop: {}", err);
        }
        Err(err) => reporter.report(err),
    }
    processor
}
