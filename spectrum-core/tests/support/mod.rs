//! Scripted in-memory loopback backend for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use spectrum_core::{
    AudioBackend, AudioDataCallback, AudioFormat, CaptureDelegate, CaptureError, CaptureState,
    CaptureStream, DataSignal, EventSignal, LoopbackEndpoint, RawPacket,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `condition` until it holds or two seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// What the fake device does next, plus what it has seen.
#[derive(Debug)]
pub struct Script {
    pub format: AudioFormat,
    pub fail_activations: u32,
    pub refuse_event_mode: bool,
    pub refuse_polling: bool,
    pub refuse_starts: u32,
    pub invalidated: bool,
    pub panic_on_leave: bool,
    pub packets: VecDeque<(Vec<f32>, bool)>,

    pub activations: u32,
    pub resets: u32,
    pub starts: u32,
    pub stops: u32,
    pub released_frames: u64,
    pub released_packets: u32,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            format: AudioFormat::new(48000, 2, 32),
            fail_activations: 0,
            refuse_event_mode: false,
            refuse_polling: false,
            refuse_starts: 0,
            invalidated: false,
            panic_on_leave: false,
            packets: VecDeque::new(),
            activations: 0,
            resets: 0,
            starts: 0,
            stops: 0,
            released_frames: 0,
            released_packets: 0,
        }
    }
}

/// Backend whose behaviour is driven by a shared [`Script`].
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    signal: Arc<EventSignal>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(edit: impl FnOnce(&mut Script)) -> Self {
        let backend = Self::new();
        edit(&mut backend.script.lock());
        backend
    }

    pub fn shared(&self) -> Arc<dyn AudioBackend> {
        Arc::new(self.clone())
    }

    pub fn script(&self) -> parking_lot::MutexGuard<'_, Script> {
        self.script.lock()
    }

    /// Queue one interleaved packet and signal the device event.
    pub fn push_packet(&self, samples: Vec<f32>, silent: bool) {
        self.script.lock().packets.push_back((samples, silent));
        self.signal.notify();
    }

    /// Make every following packet query fail as an unplugged device would.
    pub fn invalidate(&self) {
        self.script.lock().invalidated = true;
        self.signal.notify();
    }

    pub fn restore(&self) {
        self.script.lock().invalidated = false;
    }
}

impl AudioBackend for ScriptedBackend {
    fn activate_default_output(&self) -> Result<Box<dyn LoopbackEndpoint>, CaptureError> {
        let mut script = self.script.lock();
        script.activations += 1;
        if script.fail_activations > 0 {
            script.fail_activations -= 1;
            return Err(CaptureError::DeviceNotAvailable);
        }
        Ok(Box::new(ScriptedEndpoint {
            script: Arc::clone(&self.script),
            signal: Arc::clone(&self.signal),
        }))
    }
}

struct ScriptedEndpoint {
    script: Arc<Mutex<Script>>,
    signal: Arc<EventSignal>,
}

impl LoopbackEndpoint for ScriptedEndpoint {
    fn mix_format(&self) -> AudioFormat {
        self.script.lock().format
    }

    fn initialize_event_driven(&mut self) -> Result<Arc<dyn DataSignal>, CaptureError> {
        if self.script.lock().refuse_event_mode {
            return Err(CaptureError::ConfigurationFailed("event callback unsupported".into()));
        }
        let signal: Arc<dyn DataSignal> = self.signal.clone();
        Ok(signal)
    }

    fn initialize_polling(&mut self) -> Result<(), CaptureError> {
        if self.script.lock().refuse_polling {
            return Err(CaptureError::ConfigurationFailed("polling refused".into()));
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), CaptureError> {
        self.script.lock().resets += 1;
        Ok(())
    }

    fn into_stream(self: Box<Self>) -> Result<Box<dyn CaptureStream>, CaptureError> {
        Ok(Box::new(ScriptedStream {
            script: self.script,
            current: None,
        }))
    }
}

struct ScriptedStream {
    script: Arc<Mutex<Script>>,
    current: Option<Vec<f32>>,
}

impl ScriptedStream {
    fn frames_of(&self, samples: &[f32]) -> u32 {
        let channels = self.script.lock().format.channels.max(1) as usize;
        (samples.len() / channels) as u32
    }
}

impl CaptureStream for ScriptedStream {
    fn start(&mut self) -> Result<(), CaptureError> {
        let mut script = self.script.lock();
        if script.refuse_starts > 0 {
            script.refuse_starts -= 1;
            return Err(CaptureError::StartFailure("device busy".into()));
        }
        script.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.script.lock().stops += 1;
        Ok(())
    }

    fn next_packet_size(&mut self) -> Result<u32, CaptureError> {
        let script = self.script.lock();
        if script.invalidated {
            return Err(CaptureError::DeviceInvalidated);
        }
        let channels = script.format.channels.max(1) as usize;
        Ok(script.packets.front().map_or(0, |(s, _)| (s.len() / channels) as u32))
    }

    fn get_buffer(&mut self) -> Result<RawPacket<'_>, CaptureError> {
        let (samples, silent) = self
            .script
            .lock()
            .packets
            .pop_front()
            .ok_or_else(|| CaptureError::RuntimeFault("no packet queued".into()))?;
        let frames = self.frames_of(&samples);
        let samples = self.current.insert(samples).as_slice();
        Ok(RawPacket { samples, frames, silent })
    }

    fn release_buffer(&mut self, frames: u32) -> Result<(), CaptureError> {
        self.current = None;
        let mut script = self.script.lock();
        script.released_frames += u64::from(frames);
        script.released_packets += 1;
        Ok(())
    }

    fn leave_capture_thread(&mut self) {
        let panic_on_leave = self.script.lock().panic_on_leave;
        if panic_on_leave {
            panic!("thread teardown failed");
        }
    }
}

/// Sink that records every delivered sample.
pub fn recording_callback() -> (AudioDataCallback, Arc<Mutex<Vec<f32>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let target = Arc::clone(&received);
    let callback: AudioDataCallback = Arc::new(move |samples: &[f32], _channels: u16| {
        target.lock().extend_from_slice(samples);
    });
    (callback, received)
}

/// Delegate that records state changes and faults.
#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<CaptureState>>,
    pub faults: Mutex<Vec<CaptureError>>,
}

impl CaptureDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: &CaptureState) {
        self.states.lock().push(state.clone());
    }

    fn on_fault(&self, error: &CaptureError) {
        self.faults.lock().push(error.clone());
    }
}
