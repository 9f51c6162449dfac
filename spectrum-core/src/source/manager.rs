use std::sync::Arc;

use super::animated::AnimatedAudioSource;
use super::realtime::RealtimeAudioSource;
use crate::models::audio_models::{SpectrumData, SpectrumScale, WindowType};
use crate::models::config::{clamp_amplification, clamp_bar_count, AudioConfig};
use crate::models::error::CaptureError;
use crate::traits::audio_backend::AudioBackend;
use crate::traits::audio_source::AudioSource;

/// Switches between live capture and the synthetic animation and applies
/// user adjustments to both.
pub struct AudioManager {
    config: AudioConfig,
    realtime: RealtimeAudioSource,
    animated: AnimatedAudioSource,
    animating: bool,
}

impl AudioManager {
    pub fn new(backend: Arc<dyn AudioBackend>, config: AudioConfig) -> Self {
        let config = config.clamped();
        Self {
            realtime: RealtimeAudioSource::new(backend, &config),
            animated: AnimatedAudioSource::new(&config),
            config,
            animating: false,
        }
    }

    /// Prepare both sources. Live capture starts out selected but stopped.
    pub fn initialize(&mut self) -> Result<(), CaptureError> {
        self.realtime.initialize()?;
        self.animated.initialize()?;
        Ok(())
    }

    pub fn update(&mut self, delta_time: f32) {
        self.current_mut().update(delta_time);
    }

    pub fn spectrum(&self) -> SpectrumData {
        self.current().spectrum()
    }

    /// Start or stop live capture. Ignored while animating.
    pub fn toggle_capture(&mut self) {
        if self.animating {
            return;
        }
        if self.realtime.is_capturing() {
            self.realtime.stop_capture();
        } else {
            self.realtime.start_capture();
        }
    }

    /// Switch between the animation and live capture. Turning the animation
    /// on stops capture.
    pub fn toggle_animation(&mut self) {
        self.animating = !self.animating;
        if self.animating {
            self.realtime.stop_capture();
            log::info!("animation mode on");
        } else {
            log::info!("animation mode off");
        }
    }

    pub fn change_amplification(&mut self, delta: f32) {
        self.config.amplification = clamp_amplification(self.config.amplification + delta);
        self.realtime.set_amplification(self.config.amplification);
        log::info!("amplification: {:.1}", self.config.amplification);
    }

    pub fn change_bar_count(&mut self, delta: i32) {
        let requested = self.config.bar_count as i64 + i64::from(delta);
        self.config.bar_count = clamp_bar_count(requested.max(0) as usize);
        self.realtime.set_bar_count(self.config.bar_count);
        self.animated.set_bar_count(self.config.bar_count);
        log::info!("bar count: {}", self.config.bar_count);
    }

    pub fn change_fft_window(&mut self, direction: i32) {
        self.config.window = self.config.window.cycle(direction);
        self.realtime.set_window(self.config.window);
        log::info!("FFT window: {}", self.config.window);
    }

    pub fn change_spectrum_scale(&mut self, direction: i32) {
        self.config.scale = self.config.scale.cycle(direction);
        self.realtime.set_scale(self.config.scale);
        log::info!("spectrum scale: {}", self.config.scale);
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn is_capturing(&self) -> bool {
        self.realtime.is_capturing()
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn amplification(&self) -> f32 {
        self.config.amplification
    }

    pub fn bar_count(&self) -> usize {
        self.config.bar_count
    }

    pub fn window(&self) -> WindowType {
        self.config.window
    }

    pub fn scale(&self) -> SpectrumScale {
        self.config.scale
    }

    pub fn realtime(&self) -> &RealtimeAudioSource {
        &self.realtime
    }

    fn current(&self) -> &dyn AudioSource {
        if self.animating {
            &self.animated
        } else {
            &self.realtime
        }
    }

    fn current_mut(&mut self) -> &mut dyn AudioSource {
        if self.animating {
            &mut self.animated
        } else {
            &mut self.realtime
        }
    }
}
