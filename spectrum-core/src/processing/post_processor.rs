use crate::models::config::{
    clamp_amplification, clamp_unit, DEFAULT_AMPLIFICATION, DEFAULT_PEAK_DECAY, DEFAULT_SMOOTHING,
};

/// Gain applied before log compression.
const SENSITIVITY: f32 = 150.0;
/// Fraction of the smoothing factor used while a bar is rising.
const ATTACK_MULTIPLIER: f32 = 0.5;
/// Peaks decaying below this snap to zero.
const PEAK_FLOOR: f32 = 1e-6;

/// Perceptual scaling, peak tracking and attack/release smoothing for bar values.
///
/// `smoothed_bars()` is the externally visible spectrum. Both per-bar arrays
/// always have the same length.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    amplification: f32,
    smoothing: f32,
    peak_decay: f32,
    smoothed: Vec<f32>,
    peaks: Vec<f32>,
}

impl PostProcessor {
    pub fn new(bar_count: usize) -> Self {
        Self {
            amplification: DEFAULT_AMPLIFICATION,
            smoothing: DEFAULT_SMOOTHING,
            peak_decay: DEFAULT_PEAK_DECAY,
            smoothed: vec![0.0; bar_count],
            peaks: vec![0.0; bar_count],
        }
    }

    /// Scale `spectrum` in place, then fold it into the peak and smoothed state.
    ///
    /// A spectrum of a different length than the current bar count resizes
    /// (and resets) the per-bar state first.
    pub fn process(&mut self, spectrum: &mut [f32]) {
        if spectrum.len() != self.smoothed.len() {
            log::debug!(
                "post processor resized from {} to {} bars",
                self.smoothed.len(),
                spectrum.len()
            );
            self.set_bar_count(spectrum.len());
        }

        self.apply_scaling(spectrum);
        self.update_peaks(spectrum);
        self.apply_smoothing(spectrum);
    }

    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
        self.peaks.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Resize the per-bar state. Any change zeroes smoothed bars and peaks.
    pub fn set_bar_count(&mut self, bar_count: usize) {
        if bar_count == self.smoothed.len() {
            return;
        }
        self.smoothed = vec![0.0; bar_count];
        self.peaks = vec![0.0; bar_count];
    }

    pub fn bar_count(&self) -> usize {
        self.smoothed.len()
    }

    pub fn set_amplification(&mut self, amplification: f32) {
        self.amplification = clamp_amplification(amplification);
    }

    pub fn amplification(&self) -> f32 {
        self.amplification
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = clamp_unit(smoothing);
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn set_peak_decay(&mut self, decay: f32) {
        self.peak_decay = clamp_unit(decay);
    }

    pub fn peak_decay(&self) -> f32 {
        self.peak_decay
    }

    pub fn smoothed_bars(&self) -> &[f32] {
        &self.smoothed
    }

    pub fn peak_values(&self) -> &[f32] {
        &self.peaks
    }

    fn apply_scaling(&self, spectrum: &mut [f32]) {
        let norm = SENSITIVITY.ln_1p();
        for value in spectrum.iter_mut() {
            // Negative or NaN input compresses to 0.
            let input = if value.is_nan() { 0.0 } else { value.max(0.0) };
            let scaled = (input * SENSITIVITY).ln_1p() / norm;
            *value = scaled.powf(self.amplification).clamp(0.0, 1.0);
        }
    }

    fn update_peaks(&mut self, spectrum: &[f32]) {
        for (peak, &value) in self.peaks.iter_mut().zip(spectrum) {
            if value > *peak {
                *peak = value;
            } else {
                *peak *= self.peak_decay;
                if *peak < PEAK_FLOOR {
                    *peak = 0.0;
                }
            }
        }
    }

    fn apply_smoothing(&mut self, spectrum: &[f32]) {
        for (smoothed, &value) in self.smoothed.iter_mut().zip(spectrum) {
            let factor = if value > *smoothed {
                self.smoothing * ATTACK_MULTIPLIER
            } else {
                self.smoothing
            };
            *smoothed = *smoothed * factor + value * (1.0 - factor);
        }
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(crate::models::config::DEFAULT_BAR_COUNT)
    }
}
