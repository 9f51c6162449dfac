use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::models::audio_models::WindowType;

/// Windowed forward FFT over a fixed-size frame, keeping bin magnitudes.
///
/// Magnitudes are scaled by `2 / fft_size`, so a full-scale sine sitting on a
/// bin centre reads 1.0 under a rectangular window (0.5 under Hann).
pub struct FftProcessor {
    fft_size: usize,
    window_type: WindowType,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl FftProcessor {
    /// `fft_size` must be a power of two; callers clamp beforehand.
    pub fn new(fft_size: usize, window_type: WindowType) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            fft_size,
            window_type,
            window: build_window(window_type, fft_size),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; fft_size / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins (`fft_size / 2`).
    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn set_window_type(&mut self, window_type: WindowType) {
        if window_type != self.window_type {
            self.window_type = window_type;
            self.window = build_window(window_type, self.fft_size);
        }
    }

    /// Window `frame`, transform it, and store magnitudes.
    ///
    /// Shorter frames are zero-padded; extra samples are ignored.
    pub fn process(&mut self, frame: &[f32]) {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 2.0 / self.fft_size as f32;
        for (magnitude, bin) in self.magnitudes.iter_mut().zip(self.buffer.iter()) {
            *magnitude = bin.norm() * scale;
        }
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }
}

/// Periodic window of length `size`.
pub fn build_window(window_type: WindowType, size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| {
            let phase = 2.0 * PI * i as f32 / n;
            match window_type {
                WindowType::Hann => 0.5 * (1.0 - phase.cos()),
                WindowType::Hamming => 0.54 - 0.46 * phase.cos(),
                WindowType::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
                WindowType::Rectangular => 1.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(bin: usize, size: usize, amplitude: f32) -> Vec<f32> {
        (0..size)
            .map(|i| amplitude * (2.0 * PI * bin as f32 * i as f32 / size as f32).sin())
            .collect()
    }

    #[test]
    fn rectangular_sine_reads_amplitude() {
        let mut fft = FftProcessor::new(1024, WindowType::Rectangular);
        fft.process(&sine(64, 1024, 0.8));

        assert_eq!(fft.magnitudes().len(), 512);
        assert_abs_diff_eq!(fft.magnitudes()[64], 0.8, epsilon = 1e-3);
        assert!(fft.magnitudes()[10] < 1e-3);
    }

    #[test]
    fn hann_sine_halves_peak_and_splits_into_neighbours() {
        let mut fft = FftProcessor::new(1024, WindowType::Hann);
        fft.process(&sine(100, 1024, 1.0));

        let mags = fft.magnitudes();
        assert_abs_diff_eq!(mags[100], 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(mags[99], 0.25, epsilon = 1e-3);
        assert_abs_diff_eq!(mags[101], 0.25, epsilon = 1e-3);
        assert!(mags[120] < 1e-4);
    }

    #[test]
    fn silence_gives_zero_magnitudes() {
        let mut fft = FftProcessor::new(256, WindowType::Blackman);
        fft.process(&[0.0; 256]);
        assert!(fft.magnitudes().iter().all(|&m| m == 0.0));
    }

    #[test]
    fn processing_is_deterministic() {
        let signal: Vec<f32> = (0..512).map(|i| ((i * 7919) % 97) as f32 / 97.0 - 0.5).collect();
        let mut a = FftProcessor::new(512, WindowType::Hamming);
        let mut b = FftProcessor::new(512, WindowType::Hamming);
        a.process(&signal);
        b.process(&signal);
        assert_eq!(a.magnitudes(), b.magnitudes());
    }

    #[test]
    fn short_frame_is_zero_padded() {
        let mut fft = FftProcessor::new(256, WindowType::Rectangular);
        fft.process(&[1.0; 128]);
        // Half-length DC pulse: DC bin sees half the energy.
        assert_abs_diff_eq!(fft.magnitudes()[0], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn window_shapes() {
        let hann = build_window(WindowType::Hann, 8);
        assert_abs_diff_eq!(hann[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hann[4], 1.0, epsilon = 1e-6);

        let hamming = build_window(WindowType::Hamming, 8);
        assert_abs_diff_eq!(hamming[0], 0.08, epsilon = 1e-6);

        let blackman = build_window(WindowType::Blackman, 8);
        assert_abs_diff_eq!(blackman[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(blackman[4], 1.0, epsilon = 1e-6);

        let rectangular = build_window(WindowType::Rectangular, 8);
        assert!(rectangular.iter().all(|&w| w == 1.0));
    }

    #[test]
    fn set_window_type_rebuilds_window() {
        let mut fft = FftProcessor::new(64, WindowType::Hann);
        fft.set_window_type(WindowType::Rectangular);
        assert_eq!(fft.window_type(), WindowType::Rectangular);
        fft.process(&[1.0; 64]);
        // DC of a constant 1.0 frame under rectangular window = 2.0 with 2/N scaling.
        assert_abs_diff_eq!(fft.magnitudes()[0], 2.0, epsilon = 1e-4);
    }
}
