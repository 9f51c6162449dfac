use std::ops::Range;

use crate::models::audio_models::SpectrumScale;

const LOG_MIN_FREQ: f32 = 20.0;
const LOG_MAX_FREQ: f32 = 20_000.0;

/// Groups FFT magnitude bins into a fixed number of bars.
///
/// Every scale partitions its bin span into contiguous, non-overlapping
/// half-open ranges, one per bar, and a bar's value is the mean magnitude of
/// its range. A range that rounds to nothing yields 0.
#[derive(Debug, Clone)]
pub struct FrequencyMapper {
    bar_count: usize,
    sample_rate: u32,
}

impl FrequencyMapper {
    pub fn new(bar_count: usize, sample_rate: u32) -> Self {
        Self {
            bar_count,
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn set_bar_count(&mut self, bar_count: usize) {
        self.bar_count = bar_count;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Centre frequency of `bin` for a transform of `fft_size` samples.
    pub fn frequency_for_bin(&self, bin: usize, fft_size: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / fft_size as f32
    }

    /// Lowest bin whose centre frequency is at or above `frequency`.
    pub fn bin_for_frequency(&self, frequency: f32, fft_size: usize) -> usize {
        (frequency.max(0.0) * fft_size as f32 / self.sample_rate as f32).ceil() as usize
    }

    /// Fill `bars` from `magnitudes` (length = fft_size / 2).
    ///
    /// `bars.len()` is the bar count used for this call.
    pub fn map_fft_to_bars(&self, magnitudes: &[f32], bars: &mut [f32], scale: SpectrumScale) {
        let bin_count = magnitudes.len();
        let bar_count = bars.len();
        for (bar, value) in bars.iter_mut().enumerate() {
            let range = self.range_for(bar, bar_count, bin_count, scale);
            *value = if range.is_empty() {
                0.0
            } else {
                let len = range.len() as f32;
                magnitudes[range].iter().sum::<f32>() / len
            };
        }
    }

    /// Half-open bin range feeding `bar` at the configured bar count.
    pub fn bar_bin_range(
        &self,
        bar: usize,
        bin_count: usize,
        scale: SpectrumScale,
    ) -> Range<usize> {
        self.range_for(bar, self.bar_count, bin_count, scale)
    }

    /// Frequency span `[start, end)` covered by `bar`.
    pub fn bar_frequency_range(
        &self,
        bar: usize,
        bin_count: usize,
        scale: SpectrumScale,
    ) -> (f32, f32) {
        let n = self.bar_count.max(1);
        match scale {
            SpectrumScale::Linear => {
                let range = self.bar_bin_range(bar, bin_count, scale);
                let fft_size = bin_count * 2;
                (
                    self.frequency_for_bin(range.start, fft_size),
                    self.frequency_for_bin(range.end, fft_size),
                )
            }
            SpectrumScale::Logarithmic | SpectrumScale::Mel => (
                self.edge_frequency(bar, n, scale),
                self.edge_frequency(bar + 1, n, scale),
            ),
        }
    }

    fn range_for(
        &self,
        bar: usize,
        bar_count: usize,
        bin_count: usize,
        scale: SpectrumScale,
    ) -> Range<usize> {
        if bar_count == 0 || bin_count < 2 || bar >= bar_count {
            return 0..0;
        }

        // Bin 0 is DC and never contributes.
        let (start, end) = match scale {
            SpectrumScale::Linear => {
                let usable = (bin_count - 1) as f64;
                let width = usable / bar_count as f64;
                (
                    1 + (bar as f64 * width).floor() as usize,
                    1 + ((bar + 1) as f64 * width).floor() as usize,
                )
            }
            SpectrumScale::Logarithmic | SpectrumScale::Mel => {
                let fft_size = bin_count * 2;
                let low = self.edge_frequency(bar, bar_count, scale);
                let high = self.edge_frequency(bar + 1, bar_count, scale);
                (
                    self.bin_for_frequency(low, fft_size),
                    self.bin_for_frequency(high, fft_size),
                )
            }
        };

        let start = start.clamp(1, bin_count);
        let end = end.clamp(1, bin_count);
        start..end.max(start)
    }

    /// Lower edge of bar `edge` (or upper edge of bar `edge - 1`).
    fn edge_frequency(&self, edge: usize, bar_count: usize, scale: SpectrumScale) -> f32 {
        let max_freq = LOG_MAX_FREQ.min(self.nyquist());
        let t = edge as f32 / bar_count as f32;
        match scale {
            SpectrumScale::Linear => t * self.nyquist(),
            SpectrumScale::Logarithmic => {
                if max_freq <= LOG_MIN_FREQ {
                    return t * max_freq;
                }
                LOG_MIN_FREQ * (max_freq / LOG_MIN_FREQ).powf(t)
            }
            SpectrumScale::Mel => {
                let low = hz_to_mel(LOG_MIN_FREQ.min(max_freq));
                let high = hz_to_mel(max_freq);
                mel_to_hz(low + (high - low) * t)
            }
        }
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}
