use std::sync::Arc;

use crate::analysis::analyzer::SpectrumAnalyzer;
use crate::models::audio_models::{SpectrumData, SpectrumScale, WindowType};
use crate::models::config::AudioConfig;
use crate::models::error::CaptureError;
use crate::session::capture_session::CaptureSession;
use crate::traits::audio_backend::AudioBackend;
use crate::traits::audio_source::AudioSource;

/// Spectrum of whatever the default output device is playing.
///
/// Owns the capture session and the analyzer fed by it. A session that
/// faults (device unplugged, format change) is stopped on the next
/// `update`, and the next `start_capture` renegotiates the device from
/// scratch.
pub struct RealtimeAudioSource {
    backend: Arc<dyn AudioBackend>,
    config: AudioConfig,
    analyzer: SpectrumAnalyzer,
    session: Option<CaptureSession>,
    capturing: bool,
    needs_reinit: bool,
}

impl RealtimeAudioSource {
    pub fn new(backend: Arc<dyn AudioBackend>, config: &AudioConfig) -> Self {
        Self {
            backend,
            config: config.clone(),
            analyzer: SpectrumAnalyzer::new(config),
            session: None,
            capturing: false,
            needs_reinit: false,
        }
    }

    pub fn analyzer(&self) -> &SpectrumAnalyzer {
        &self.analyzer
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    /// Negotiate the device and adopt its sample rate.
    fn initialize_session(&mut self) -> Result<(), CaptureError> {
        let session = self.session.get_or_insert_with(|| {
            CaptureSession::new(Arc::clone(&self.backend), self.config.capture.clone())
        });
        session.set_callback(self.analyzer.audio_callback());
        session.initialize()?;

        self.analyzer.set_sample_rate(session.sample_rate());
        self.needs_reinit = false;
        Ok(())
    }

    fn handle_fault(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_faulted() || !session.has_capture_thread() {
            return;
        }

        match session.last_error() {
            Some(err) if err.is_device_loss() => {
                log::warn!("audio device lost; capture will reinitialize on next start")
            }
            Some(err) => log::warn!("capture faulted ({}); stopping", err),
            None => log::warn!("capture faulted; stopping"),
        }
        session.stop();
        // Audio buffered from the lost stream would otherwise be analyzed
        // as if it were the start of the next one.
        self.analyzer.reset();
        self.capturing = false;
        self.needs_reinit = true;
    }
}

impl AudioSource for RealtimeAudioSource {
    /// Setup failure is logged and tolerated; `start_capture` retries it.
    fn initialize(&mut self) -> Result<(), CaptureError> {
        if let Err(err) = self.initialize_session() {
            log::error!(
                "realtime source: audio capture failed to initialize: {}",
                err
            );
            self.needs_reinit = true;
        }
        Ok(())
    }

    fn update(&mut self, _delta_time: f32) {
        self.handle_fault();
        self.analyzer.update();
    }

    fn spectrum(&self) -> SpectrumData {
        self.analyzer.spectrum()
    }

    fn set_amplification(&mut self, amplification: f32) {
        self.analyzer.set_amplification(amplification);
    }

    fn set_smoothing(&mut self, smoothing: f32) {
        self.analyzer.set_smoothing(smoothing);
    }

    fn set_bar_count(&mut self, count: usize) {
        self.analyzer.set_bar_count(count);
    }

    fn set_window(&mut self, window: WindowType) {
        self.analyzer.set_window(window);
    }

    fn set_scale(&mut self, scale: SpectrumScale) {
        self.analyzer.set_scale(scale);
    }

    fn start_capture(&mut self) {
        if self.capturing {
            return;
        }

        self.handle_fault();
        let stale = self
            .session
            .as_ref()
            .map_or(true, |s| !s.is_initialized() || s.is_faulted());
        if self.needs_reinit || stale {
            if let Err(err) = self.initialize_session() {
                log::error!("realtime source: reinitialization failed: {}", err);
                return;
            }
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.start() {
            Ok(()) => {
                self.capturing = true;
                log::info!("realtime source: capture started");
            }
            Err(err) => log::error!("realtime source: capture failed to start: {}", err),
        }
    }

    fn stop_capture(&mut self) {
        if !self.capturing {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.stop();
        }
        self.capturing = false;
        log::info!("realtime source: capture stopped");
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }
}
