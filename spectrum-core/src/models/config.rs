use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::{SpectrumScale, WindowType};
use super::error::CaptureError;

pub const MIN_BAR_COUNT: usize = 16;
pub const MAX_BAR_COUNT: usize = 256;
pub const MIN_FFT_SIZE: usize = 64;
pub const MAX_FFT_SIZE: usize = 16384;
pub const MIN_AMPLIFICATION: f32 = 0.1;
pub const MAX_AMPLIFICATION: f32 = 5.0;

pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_BAR_COUNT: usize = 64;
pub const DEFAULT_AMPLIFICATION: f32 = 1.0;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_PEAK_DECAY: f32 = 0.98;
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Analysis and capture configuration.
///
/// Every field has a default, so a partial JSON document is enough:
/// ```
/// use spectrum_core::AudioConfig;
///
/// let config = AudioConfig::from_json(r#"{ "bar_count": 32, "scale": "Linear" }"#).unwrap();
/// assert_eq!(config.bar_count, 32);
/// assert_eq!(config.fft_size, 2048);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Analysis frame length in samples (power of two).
    pub fft_size: usize,

    /// Number of output bars.
    pub bar_count: usize,

    /// Exponent applied after perceptual compression.
    pub amplification: f32,

    /// Release smoothing factor (0 = no smoothing, 1 = frozen).
    pub smoothing: f32,

    /// Per-update multiplier applied to a peak that is not being refreshed.
    pub peak_decay: f32,

    pub window: WindowType,

    pub scale: SpectrumScale,

    /// Sample rate assumed until a device format has been negotiated.
    pub sample_rate: u32,

    /// Seed for the jitter of the synthetic test signal.
    pub test_signal_seed: u64,

    pub capture: CaptureSettings,
}

impl AudioConfig {
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        serde_json::from_str(json).map_err(|e| CaptureError::ConfigurationFailed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, CaptureError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::ConfigurationFailed(e.to_string()))
    }

    /// Report the first out-of-range field.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if !(MIN_BAR_COUNT..=MAX_BAR_COUNT).contains(&self.bar_count) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "bar count {} outside {}..={}",
                self.bar_count, MIN_BAR_COUNT, MAX_BAR_COUNT
            )));
        }
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(CaptureError::ConfigurationFailed(format!(
                "FFT size {} must be a power of two in {}..={}",
                self.fft_size, MIN_FFT_SIZE, MAX_FFT_SIZE
            )));
        }
        if !(MIN_AMPLIFICATION..=MAX_AMPLIFICATION).contains(&self.amplification) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "amplification {} outside {}..={}",
                self.amplification, MIN_AMPLIFICATION, MAX_AMPLIFICATION
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "smoothing {} outside 0..=1",
                self.smoothing
            )));
        }
        if !(0.0..=1.0).contains(&self.peak_decay) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "peak decay {} outside 0..=1",
                self.peak_decay
            )));
        }
        if self.sample_rate == 0 {
            return Err(CaptureError::ConfigurationFailed("sample rate must be positive".into()));
        }
        Ok(())
    }

    /// Copy with every field forced into its valid range.
    pub fn clamped(&self) -> Self {
        Self {
            fft_size: clamp_fft_size(self.fft_size),
            bar_count: clamp_bar_count(self.bar_count),
            amplification: clamp_amplification(self.amplification),
            smoothing: clamp_unit(self.smoothing),
            peak_decay: clamp_unit(self.peak_decay),
            sample_rate: self.sample_rate.max(1),
            ..self.clone()
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            bar_count: DEFAULT_BAR_COUNT,
            amplification: DEFAULT_AMPLIFICATION,
            smoothing: DEFAULT_SMOOTHING,
            peak_decay: DEFAULT_PEAK_DECAY,
            window: WindowType::Hann,
            scale: SpectrumScale::Logarithmic,
            sample_rate: DEFAULT_SAMPLE_RATE,
            test_signal_seed: 0x5eed,
            capture: CaptureSettings::default(),
        }
    }
}

/// Retry counts, delays and mode preferences for device setup and the
/// capture loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub max_init_attempts: u32,
    pub init_retry_delay_ms: u64,
    pub start_retry_delay_ms: u64,
    /// Upper bound on how long the event-driven loop blocks before
    /// re-checking the stop flag.
    pub event_wait_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub prefer_event_driven: bool,
    /// Deliver silent-flagged packets as zeros instead of skipping them.
    pub deliver_silent_packets: bool,
}

impl CaptureSettings {
    /// Zero-delay variant for tests.
    pub fn immediate() -> Self {
        Self {
            init_retry_delay_ms: 0,
            start_retry_delay_ms: 0,
            event_wait_timeout_ms: 20,
            poll_interval_ms: 1,
            ..Self::default()
        }
    }

    pub fn init_retry_delay(&self) -> Duration {
        Duration::from_millis(self.init_retry_delay_ms)
    }

    pub fn start_retry_delay(&self) -> Duration {
        Duration::from_millis(self.start_retry_delay_ms)
    }

    pub fn event_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.event_wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            max_init_attempts: 3,
            init_retry_delay_ms: 200,
            start_retry_delay_ms: 50,
            event_wait_timeout_ms: 2000,
            poll_interval_ms: 10,
            prefer_event_driven: true,
            deliver_silent_packets: false,
        }
    }
}

pub fn clamp_bar_count(count: usize) -> usize {
    count.clamp(MIN_BAR_COUNT, MAX_BAR_COUNT)
}

/// Round up to a power of two, then clamp.
pub fn clamp_fft_size(size: usize) -> usize {
    size.max(1).next_power_of_two().clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
}

pub fn clamp_amplification(value: f32) -> f32 {
    if value.is_nan() {
        return DEFAULT_AMPLIFICATION;
    }
    value.clamp(MIN_AMPLIFICATION, MAX_AMPLIFICATION)
}

/// Saturate to 0..=1; NaN maps to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AudioConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = AudioConfig::from_json(
            r#"{ "bar_count": 32, "window": "Blackman", "capture": { "poll_interval_ms": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.bar_count, 32);
        assert_eq!(config.window, WindowType::Blackman);
        assert_eq!(config.capture.poll_interval_ms, 5);
        assert_eq!(config.capture.max_init_attempts, 3);
        assert_eq!(config.scale, SpectrumScale::Logarithmic);
    }

    #[test]
    fn malformed_json_is_configuration_error() {
        let err = AudioConfig::from_json("{ bar_count: }").unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
    }

    #[test]
    fn validate_rejects_non_power_of_two_fft() {
        let config = AudioConfig {
            fft_size: 1000,
            ..AudioConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn clamped_forces_bounds() {
        let config = AudioConfig {
            fft_size: 1000,
            bar_count: 4,
            amplification: 9.0,
            smoothing: -0.5,
            peak_decay: 1.5,
            ..AudioConfig::default()
        }
        .clamped();

        assert_eq!(config.fft_size, 1024);
        assert_eq!(config.bar_count, MIN_BAR_COUNT);
        assert_eq!(config.amplification, MAX_AMPLIFICATION);
        assert_eq!(config.smoothing, 0.0);
        assert_eq!(config.peak_decay, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn clamp_helpers_handle_nan() {
        assert_eq!(clamp_unit(f32::NAN), 0.0);
        assert_eq!(clamp_amplification(f32::NAN), DEFAULT_AMPLIFICATION);
    }

    #[test]
    fn json_round_trip_preserves_settings() {
        let config = AudioConfig {
            bar_count: 48,
            capture: CaptureSettings::immediate(),
            ..AudioConfig::default()
        };
        let parsed = AudioConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
