use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::audio_models::{SpectrumData, SpectrumScale, WindowType};
use crate::models::config::{clamp_bar_count, AudioConfig};
use crate::processing::fft_processor::FftProcessor;
use crate::processing::frequency_mapper::FrequencyMapper;
use crate::processing::post_processor::PostProcessor;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::audio_backend::AudioDataCallback;

/// Half-width of the random jitter added to the test signal.
const TEST_JITTER: f32 = 0.05;

struct AnalyzerState {
    fft: FftProcessor,
    mapper: FrequencyMapper,
    post: PostProcessor,
    scale: SpectrumScale,
    frame: Vec<f32>,
    bars: Vec<f32>,
    rng: StdRng,
}

impl AnalyzerState {
    fn bar_count(&self) -> usize {
        self.bars.len()
    }
}

/// Turns captured audio into smoothed bar values.
///
/// The capture thread only appends to the sample buffer (see
/// [`audio_callback`](Self::audio_callback)). Everything else runs on the
/// caller's thread: [`update`](Self::update) drains the buffer in
/// `fft_size` frames with 50% overlap, each frame going through
/// FFT → bar mapping → post-processing.
///
/// All methods take `&self`; configuration changes and analysis serialize on
/// one lock, so bars and peaks always have the current bar count.
pub struct SpectrumAnalyzer {
    buffer: Arc<RingBuffer>,
    state: Mutex<AnalyzerState>,
}

impl SpectrumAnalyzer {
    /// Build from `config`, clamping out-of-range values.
    pub fn new(config: &AudioConfig) -> Self {
        let config = config.clamped();
        let mut post = PostProcessor::new(config.bar_count);
        post.set_amplification(config.amplification);
        post.set_smoothing(config.smoothing);
        post.set_peak_decay(config.peak_decay);

        Self {
            buffer: Arc::new(RingBuffer::with_capacity(config.fft_size * 4)),
            state: Mutex::new(AnalyzerState {
                fft: FftProcessor::new(config.fft_size, config.window),
                mapper: FrequencyMapper::new(config.bar_count, config.sample_rate),
                post,
                scale: config.scale,
                frame: vec![0.0; config.fft_size],
                bars: vec![0.0; config.bar_count],
                rng: StdRng::seed_from_u64(config.test_signal_seed),
            }),
        }
    }

    /// Append interleaved samples (down-mixed to mono). Capture-thread safe.
    pub fn on_audio_data(&self, samples: &[f32], channels: u16) {
        self.buffer.add(samples, channels);
    }

    /// Sink closure to register with a capture session.
    pub fn audio_callback(&self) -> AudioDataCallback {
        let buffer = Arc::clone(&self.buffer);
        Arc::new(move |samples: &[f32], channels: u16| buffer.add(samples, channels))
    }

    /// Analyze every complete frame buffered so far. Returns the number of
    /// frames processed.
    pub fn update(&self) -> usize {
        let mut processed = 0;
        loop {
            // The frame is consumed under the same lock as the copy so a
            // concurrent `reset` cannot discard audio that arrived after it.
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let fft_size = state.fft.fft_size();
            if !self.buffer.has_enough_data(fft_size) {
                break;
            }
            self.buffer.copy_to(&mut state.frame, fft_size);
            state.fft.process(&state.frame);
            state
                .mapper
                .map_fft_to_bars(state.fft.magnitudes(), &mut state.bars, state.scale);
            state.post.process(&mut state.bars);
            self.buffer.consume(fft_size / 2);
            drop(guard);
            processed += 1;
        }

        if processed > 0 {
            log::trace!(
                "analyzed {} frames, {} samples left",
                processed,
                self.buffer.len()
            );
        }
        processed
    }

    /// Current smoothed bars; zeros until the first frame is analyzed.
    pub fn spectrum(&self) -> SpectrumData {
        self.state.lock().post.smoothed_bars().to_vec()
    }

    pub fn peak_values(&self) -> SpectrumData {
        self.state.lock().post.peak_values().to_vec()
    }

    /// Smoothed bars and peaks read under one lock, so both always have the
    /// same length even while the bar count is being changed.
    pub fn snapshot(&self) -> (SpectrumData, SpectrumData) {
        let state = self.state.lock();
        (
            state.post.smoothed_bars().to_vec(),
            state.post.peak_values().to_vec(),
        )
    }

    /// Raw synthetic bars: a travelling sine across the bars, tapering
    /// toward the high end, plus a little seeded jitter.
    pub fn generate_test_spectrum(&self, time_offset: f32) -> SpectrumData {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        test_spectrum(&mut state.rng, state.bars.len(), time_offset)
    }

    /// Feed one synthetic frame through post-processing, as if it came from
    /// the device.
    pub fn generate_test_data(&self, time_offset: f32) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let bar_count = state.bar_count();
        state.bars = test_spectrum(&mut state.rng, bar_count, time_offset);
        state.post.process(&mut state.bars);
    }

    /// Clamped to 16..=256. Resets smoothing and peak state.
    pub fn set_bar_count(&self, count: usize) {
        let count = clamp_bar_count(count);
        let mut state = self.state.lock();
        if count == state.bar_count() {
            return;
        }
        state.mapper.set_bar_count(count);
        state.post.set_bar_count(count);
        state.bars = vec![0.0; count];
    }

    pub fn set_amplification(&self, amplification: f32) {
        self.state.lock().post.set_amplification(amplification);
    }

    pub fn set_smoothing(&self, smoothing: f32) {
        self.state.lock().post.set_smoothing(smoothing);
    }

    pub fn set_window(&self, window: WindowType) {
        self.state.lock().fft.set_window_type(window);
    }

    pub fn set_scale(&self, scale: SpectrumScale) {
        self.state.lock().scale = scale;
    }

    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.state.lock().mapper.set_sample_rate(sample_rate);
    }

    pub fn bar_count(&self) -> usize {
        self.state.lock().bar_count()
    }

    pub fn amplification(&self) -> f32 {
        self.state.lock().post.amplification()
    }

    pub fn smoothing(&self) -> f32 {
        self.state.lock().post.smoothing()
    }

    pub fn scale(&self) -> SpectrumScale {
        self.state.lock().scale
    }

    pub fn window(&self) -> WindowType {
        self.state.lock().fft.window_type()
    }

    pub fn fft_size(&self) -> usize {
        self.state.lock().fft.fft_size()
    }

    pub fn sample_rate(&self) -> u32 {
        self.state.lock().mapper.sample_rate()
    }

    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Drop buffered audio, smoothing and peaks.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        self.buffer.clear();
        state.post.reset();
        state.bars.iter_mut().for_each(|v| *v = 0.0);
    }
}

fn test_spectrum(rng: &mut StdRng, bar_count: usize, time_offset: f32) -> SpectrumData {
    (0..bar_count)
        .map(|i| {
            let position = i as f32 / bar_count as f32;
            let phase = time_offset * 2.0 + i as f32 * 0.3;
            let wave = (phase.sin() + 1.0) * 0.5 * (1.0 - position * 0.7);
            (wave + rng.gen_range(-TEST_JITTER..TEST_JITTER)).clamp(0.0, 1.0)
        })
        .collect()
}
