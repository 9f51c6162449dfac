use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::traits::audio_backend::{AudioDataCallback, CaptureStream};

/// Registered sink, swappable while the capture thread is running.
pub type SinkSlot = Arc<Mutex<Option<AudioDataCallback>>>;

/// Packet counters updated by the capture thread.
#[derive(Debug, Default)]
pub struct PacketStats {
    packets: AtomicU64,
    silent: AtomicU64,
    frames: AtomicU64,
}

impl PacketStats {
    pub fn packets_delivered(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn silent_packets(&self) -> u64 {
        self.silent.load(Ordering::Relaxed)
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn record_delivery(&self, frames: u32) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.frames.fetch_add(u64::from(frames), Ordering::Relaxed);
    }
}

/// Drains every queued packet from a stream into the registered sink.
///
/// Each packet is released back to the device exactly once, whether it was
/// delivered, skipped as silent, or the sink panicked.
pub struct PacketProcessor {
    stream: Box<dyn CaptureStream>,
    channels: u16,
    sink: SinkSlot,
    stats: Arc<PacketStats>,
    deliver_silent: bool,
    silence: Vec<f32>,
}

impl PacketProcessor {
    pub fn new(
        stream: Box<dyn CaptureStream>,
        channels: u16,
        sink: SinkSlot,
        stats: Arc<PacketStats>,
        deliver_silent: bool,
    ) -> Self {
        Self {
            stream,
            channels,
            sink,
            stats,
            deliver_silent,
            silence: Vec::new(),
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn stream_mut(&mut self) -> &mut dyn CaptureStream {
        self.stream.as_mut()
    }

    pub fn into_stream(self) -> Box<dyn CaptureStream> {
        self.stream
    }

    /// Process packets until the device reports an empty queue.
    pub fn drain(&mut self) -> Result<(), CaptureError> {
        while self.stream.next_packet_size()? > 0 {
            self.process_packet()?;
        }
        Ok(())
    }

    fn process_packet(&mut self) -> Result<(), CaptureError> {
        let channels = self.channels;
        let packet = self.stream.get_buffer()?;
        let frames = packet.frames;
        let wanted = frames as usize * channels as usize;

        let delivered = if frames == 0 {
            Ok(())
        } else if packet.silent {
            self.stats.silent.fetch_add(1, Ordering::Relaxed);
            if self.deliver_silent {
                self.silence.clear();
                self.silence.resize(wanted, 0.0);
                deliver(&self.sink, &self.stats, &self.silence, frames, channels)
            } else {
                Ok(())
            }
        } else {
            let len = wanted.min(packet.samples.len());
            deliver(
                &self.sink,
                &self.stats,
                &packet.samples[..len],
                frames,
                channels,
            )
        };

        self.stream.release_buffer(frames)?;
        delivered
    }
}

fn deliver(
    sink: &SinkSlot,
    stats: &PacketStats,
    samples: &[f32],
    frames: u32,
    channels: u16,
) -> Result<(), CaptureError> {
    let guard = sink.lock();
    let Some(callback) = guard.as_ref() else {
        return Ok(());
    };

    match panic::catch_unwind(AssertUnwindSafe(|| callback(samples, channels))) {
        Ok(()) => {
            stats.record_delivery(frames);
            Ok(())
        }
        Err(_) => Err(CaptureError::RuntimeFault("audio sink panicked".into())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::traits::audio_backend::RawPacket;

    struct QueueStream {
        packets: VecDeque<(Vec<f32>, bool)>,
        current: Option<Vec<f32>>,
        released: Arc<Mutex<Vec<u32>>>,
    }

    impl QueueStream {
        fn boxed(
            packets: Vec<(Vec<f32>, bool)>,
            released: &Arc<Mutex<Vec<u32>>>,
        ) -> Box<dyn CaptureStream> {
            Box::new(Self {
                packets: packets.into(),
                current: None,
                released: Arc::clone(released),
            })
        }
    }

    impl CaptureStream for QueueStream {
        fn start(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn next_packet_size(&mut self) -> Result<u32, CaptureError> {
            Ok(self.packets.front().map_or(0, |(s, _)| (s.len() / 2) as u32))
        }

        fn get_buffer(&mut self) -> Result<RawPacket<'_>, CaptureError> {
            let (samples, silent) = self.packets.pop_front().ok_or(CaptureError::Timeout)?;
            let samples = self.current.insert(samples).as_slice();
            Ok(RawPacket {
                samples,
                frames: (samples.len() / 2) as u32,
                silent,
            })
        }

        fn release_buffer(&mut self, frames: u32) -> Result<(), CaptureError> {
            self.current = None;
            self.released.lock().push(frames);
            Ok(())
        }
    }

    fn recording_sink() -> (SinkSlot, Arc<Mutex<Vec<f32>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::clone(&received);
        let callback: AudioDataCallback = Arc::new(move |samples: &[f32], _channels: u16| {
            target.lock().extend_from_slice(samples);
        });
        (Arc::new(Mutex::new(Some(callback))), received)
    }

    #[test]
    fn drains_all_packets_in_order() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let stream = QueueStream::boxed(
            vec![(vec![1.0, 2.0], false), (vec![3.0, 4.0, 5.0, 6.0], false)],
            &released,
        );
        let (sink, received) = recording_sink();
        let stats = Arc::new(PacketStats::default());
        let mut processor = PacketProcessor::new(stream, 2, sink, Arc::clone(&stats), false);

        processor.drain().unwrap();

        assert_eq!(*received.lock(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(*released.lock(), vec![1, 2]);
        assert_eq!(stats.packets_delivered(), 2);
        assert_eq!(stats.frames_delivered(), 3);
    }

    #[test]
    fn silent_packets_are_released_but_not_delivered() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let stream = QueueStream::boxed(
            vec![(vec![9.0, 9.0], true), (vec![1.0, 1.0], false)],
            &released,
        );
        let (sink, received) = recording_sink();
        let stats = Arc::new(PacketStats::default());
        let mut processor = PacketProcessor::new(stream, 2, sink, Arc::clone(&stats), false);

        processor.drain().unwrap();

        assert_eq!(*received.lock(), vec![1.0, 1.0]);
        assert_eq!(*released.lock(), vec![1, 1]);
        assert_eq!(stats.silent_packets(), 1);
        assert_eq!(stats.packets_delivered(), 1);
    }

    #[test]
    fn silent_packets_can_be_delivered_as_zeros() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let stream = QueueStream::boxed(vec![(vec![9.0, 9.0], true)], &released);
        let (sink, received) = recording_sink();
        let mut processor = PacketProcessor::new(stream, 2, sink, Arc::default(), true);

        processor.drain().unwrap();

        assert_eq!(*received.lock(), vec![0.0, 0.0]);
    }

    #[test]
    fn missing_sink_still_releases() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let stream = QueueStream::boxed(vec![(vec![1.0, 1.0], false)], &released);
        let mut processor = PacketProcessor::new(stream, 2, Arc::default(), Arc::default(), false);

        processor.drain().unwrap();

        assert_eq!(*released.lock(), vec![1]);
    }

    #[test]
    fn panicking_sink_releases_and_faults() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let stream = QueueStream::boxed(
            vec![(vec![1.0, 1.0], false), (vec![2.0, 2.0], false)],
            &released,
        );
        let callback: AudioDataCallback = Arc::new(|_: &[f32], _: u16| panic!("sink failure"));
        let sink: SinkSlot = Arc::new(Mutex::new(Some(callback)));
        let mut processor = PacketProcessor::new(stream, 2, sink, Arc::default(), false);

        let err = processor.drain().unwrap_err();

        assert!(matches!(err, CaptureError::RuntimeFault(_)));
        assert_eq!(*released.lock(), vec![1]);
    }
}
