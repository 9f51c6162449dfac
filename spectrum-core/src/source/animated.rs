use crate::analysis::analyzer::SpectrumAnalyzer;
use crate::models::audio_models::SpectrumData;
use crate::models::config::AudioConfig;
use crate::models::error::CaptureError;
use crate::traits::audio_source::AudioSource;

/// Synthetic spectrum for running without an audio device.
pub struct AnimatedAudioSource {
    analyzer: SpectrumAnalyzer,
    clock: f32,
}

impl AnimatedAudioSource {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            analyzer: SpectrumAnalyzer::new(config),
            clock: 0.0,
        }
    }

    /// Seconds of animation played so far.
    pub fn clock(&self) -> f32 {
        self.clock
    }
}

impl AudioSource for AnimatedAudioSource {
    fn initialize(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn update(&mut self, delta_time: f32) {
        self.clock += delta_time.max(0.0);
        self.analyzer.generate_test_data(self.clock);
    }

    fn spectrum(&self) -> SpectrumData {
        self.analyzer.spectrum()
    }

    fn set_smoothing(&mut self, smoothing: f32) {
        self.analyzer.set_smoothing(smoothing);
    }

    fn set_bar_count(&mut self, count: usize) {
        self.analyzer.set_bar_count(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_advances_clock_and_fills_bars() {
        let mut source = AnimatedAudioSource::new(&AudioConfig::default());
        source.initialize().unwrap();
        assert!(source.spectrum().iter().all(|&v| v == 0.0));

        for _ in 0..30 {
            source.update(1.0 / 60.0);
        }

        assert!((source.clock() - 0.5).abs() < 1e-4);
        assert_eq!(source.spectrum().len(), 64);
        assert!(source.spectrum().iter().any(|&v| v > 0.0));
        assert!(!source.is_capturing());
    }

    #[test]
    fn bar_count_follows_setter() {
        let mut source = AnimatedAudioSource::new(&AudioConfig::default());
        source.set_bar_count(32);
        source.update(0.1);
        assert_eq!(source.spectrum().len(), 32);
    }
}
