use std::thread;

use super::engine::CaptureEngine;
use crate::models::audio_models::{AudioFormat, CaptureMode};
use crate::models::config::CaptureSettings;
use crate::models::error::CaptureError;
use crate::traits::audio_backend::{AudioBackend, CaptureStream, LoopbackEndpoint};

/// A negotiated loopback client: device format, the acquisition strategy the
/// device accepted, and its packet stream.
///
/// The stream is lent to the capture thread while running and handed back
/// on stop.
pub struct DeviceSession {
    format: AudioFormat,
    engine: CaptureEngine,
    stream: Option<Box<dyn CaptureStream>>,
    attempts: u32,
}

impl DeviceSession {
    /// Activate the default output device and negotiate a capture mode.
    ///
    /// Each attempt tries event-driven mode first (when preferred) and falls
    /// back to polling on the same device after a client reset. Failed
    /// attempts are retried up to `max_init_attempts` times with
    /// `init_retry_delay` between them.
    pub fn initialize(
        backend: &dyn AudioBackend,
        settings: &CaptureSettings,
    ) -> Result<Self, CaptureError> {
        let max_attempts = settings.max_init_attempts.max(1);
        let mut last_error = CaptureError::DeviceNotAvailable;

        for attempt in 1..=max_attempts {
            match Self::try_initialize(backend, settings) {
                Ok((format, engine, stream)) => {
                    log::debug!(
                        "device negotiated {} capture at {} (attempt {}/{})",
                        engine.mode(),
                        format,
                        attempt,
                        max_attempts
                    );
                    return Ok(Self {
                        format,
                        engine,
                        stream: Some(stream),
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    if attempt < max_attempts {
                        log::warn!(
                            "audio setup attempt {}/{} failed: {}; retrying",
                            attempt,
                            max_attempts,
                            err
                        );
                        thread::sleep(settings.init_retry_delay());
                    }
                    last_error = err;
                }
            }
        }

        log::error!(
            "audio setup failed after {} attempts: {}",
            max_attempts,
            last_error
        );
        Err(CaptureError::SetupFailure {
            attempts: max_attempts,
            reason: last_error.to_string(),
        })
    }

    fn try_initialize(
        backend: &dyn AudioBackend,
        settings: &CaptureSettings,
    ) -> Result<(AudioFormat, CaptureEngine, Box<dyn CaptureStream>), CaptureError> {
        let mut endpoint = backend.activate_default_output()?;
        let format = endpoint.mix_format();
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "unusable mix format: {}",
                format
            )));
        }

        let engine = if settings.prefer_event_driven {
            match endpoint.initialize_event_driven() {
                Ok(signal) => CaptureEngine::EventDriven {
                    signal,
                    timeout: settings.event_wait_timeout(),
                },
                Err(err) => {
                    log::debug!(
                        "event-driven mode refused ({}), falling back to polling",
                        err
                    );
                    endpoint.reset()?;
                    Self::init_polling(endpoint.as_mut(), settings)?
                }
            }
        } else {
            Self::init_polling(endpoint.as_mut(), settings)?
        };

        let stream = endpoint.into_stream()?;
        Ok((format, engine, stream))
    }

    fn init_polling(
        endpoint: &mut dyn LoopbackEndpoint,
        settings: &CaptureSettings,
    ) -> Result<CaptureEngine, CaptureError> {
        endpoint.initialize_polling()?;
        Ok(CaptureEngine::Polling {
            interval: settings.poll_interval(),
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn mode(&self) -> CaptureMode {
        self.engine.mode()
    }

    pub fn engine(&self) -> &CaptureEngine {
        &self.engine
    }

    /// Attempts the successful negotiation took.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn stream_mut(&mut self) -> Option<&mut (dyn CaptureStream + 'static)> {
        self.stream.as_deref_mut()
    }

    pub fn take_stream(&mut self) -> Option<Box<dyn CaptureStream>> {
        self.stream.take()
    }

    pub fn restore_stream(&mut self, stream: Box<dyn CaptureStream>) {
        self.stream = Some(stream);
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("format", &self.format)
            .field("engine", &self.engine)
            .field("stream_held", &self.stream.is_some())
            .field("attempts", &self.attempts)
            .finish()
    }
}
