use std::collections::VecDeque;

use parking_lot::Mutex;

/// Thread-safe FIFO of mono samples between the capture thread and the
/// analysis step.
///
/// The capture thread appends down-mixed packets with [`add`](Self::add);
/// the analyzer peeks a frame with [`copy_to`](Self::copy_to) and drops the
/// hop with [`consume`](Self::consume). Storage grows as needed: if the
/// consumer stalls, the buffer grows rather than dropping audio.
#[derive(Debug, Default)]
pub struct RingBuffer {
    samples: Mutex<VecDeque<f32>>,
}

impl RingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Down-mix interleaved frames to mono (channel average) and append.
    ///
    /// A trailing partial frame is ignored. `channels == 0` is a no-op.
    pub fn add(&self, interleaved: &[f32], channels: u16) {
        if channels == 0 || interleaved.len() < channels as usize {
            return;
        }
        let channels = channels as usize;
        let frames = interleaved.len() / channels;
        let scale = 1.0 / channels as f32;

        let mut samples = self.samples.lock();
        samples.reserve(frames);
        for frame in interleaved.chunks_exact(channels) {
            samples.push_back(frame.iter().sum::<f32>() * scale);
        }
    }

    /// Append samples that are already mono.
    pub fn add_mono(&self, mono: &[f32]) {
        self.samples.lock().extend(mono.iter().copied());
    }

    pub fn has_enough_data(&self, required: usize) -> bool {
        self.samples.lock().len() >= required
    }

    /// Copy the oldest `count` samples into `dest[..count]` without
    /// removing them. Returns the number copied, which is less than `count`
    /// only when the buffer or `dest` is shorter.
    pub fn copy_to(&self, dest: &mut [f32], count: usize) -> usize {
        let samples = self.samples.lock();
        let count = count.min(samples.len()).min(dest.len());
        for (slot, &sample) in dest[..count].iter_mut().zip(samples.iter()) {
            *slot = sample;
        }
        count
    }

    /// Remove the oldest `count` samples.
    pub fn consume(&self, count: usize) {
        let mut samples = self.samples.lock();
        let count = count.min(samples.len());
        samples.drain(..count);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_downmixes_stereo() {
        let buf = RingBuffer::new();
        buf.add(&[0.2, 0.8, 0.4, 0.6, -1.0, 1.0], 2);

        let mut out = [0.0; 3];
        assert_eq!(buf.copy_to(&mut out, 3), 3);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!(out[2].abs() < 1e-6);
    }

    #[test]
    fn add_mono_passthrough() {
        let buf = RingBuffer::new();
        buf.add(&[0.1, 0.2, 0.3], 1);
        let mut out = [0.0; 3];
        buf.copy_to(&mut out, 3);
        assert_eq!(out, [0.1, 0.2, 0.3]);
    }

    #[test]
    fn add_ignores_partial_frame_and_zero_channels() {
        let buf = RingBuffer::new();
        buf.add(&[1.0, 1.0, 1.0], 2);
        assert_eq!(buf.len(), 1);

        buf.add(&[1.0, 1.0], 0);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn copy_does_not_consume() {
        let buf = RingBuffer::new();
        buf.add_mono(&[1.0, 2.0, 3.0, 4.0]);

        let mut out = [0.0; 2];
        buf.copy_to(&mut out, 2);
        buf.copy_to(&mut out, 2);
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn consume_removes_oldest_first() {
        let buf = RingBuffer::new();
        buf.add_mono(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        buf.consume(2);

        let mut out = [0.0; 3];
        assert_eq!(buf.copy_to(&mut out, 3), 3);
        assert_eq!(out, [3.0, 4.0, 5.0]);
    }

    #[test]
    fn consume_more_than_available_empties() {
        let buf = RingBuffer::new();
        buf.add_mono(&[1.0, 2.0]);
        buf.consume(10);
        assert!(buf.is_empty());
    }

    #[test]
    fn has_enough_data_threshold() {
        let buf = RingBuffer::with_capacity(8);
        buf.add_mono(&[0.0; 7]);
        assert!(!buf.has_enough_data(8));
        buf.add_mono(&[0.0]);
        assert!(buf.has_enough_data(8));
    }

    #[test]
    fn copy_short_buffer_reports_count() {
        let buf = RingBuffer::new();
        buf.add_mono(&[1.0, 2.0]);
        let mut out = [9.0; 4];
        assert_eq!(buf.copy_to(&mut out, 4), 2);
        assert_eq!(out, [1.0, 2.0, 9.0, 9.0]);
    }

    #[test]
    fn concurrent_writer_preserves_order() {
        use std::sync::Arc;
        use std::thread;

        let buf = Arc::new(RingBuffer::new());
        let writer = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || {
                for chunk in 0..100 {
                    let samples: Vec<f32> = (0..10).map(|i| (chunk * 10 + i) as f32).collect();
                    buf.add_mono(&samples);
                }
            })
        };
        writer.join().unwrap();

        let mut out = vec![0.0; 1000];
        assert_eq!(buf.copy_to(&mut out, 1000), 1000);
        assert!(out.windows(2).all(|w| w[1] == w[0] + 1.0));
    }

    #[test]
    fn clear_empties() {
        let buf = RingBuffer::new();
        buf.add_mono(&[1.0; 16]);
        buf.clear();
        assert!(buf.is_empty());
    }
}
