use std::sync::Arc;
use std::time::Duration;

use crate::models::audio_models::AudioFormat;
use crate::models::error::CaptureError;

/// Callback invoked with each delivered packet.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples, `frames * channels` long. Only valid
///   for the duration of the call.
/// - `channels`: Number of interleaved channels.
pub type AudioDataCallback = Arc<dyn Fn(&[f32], u16) + Send + Sync + 'static>;

/// Entry point of a platform audio API.
///
/// Implemented by:
/// - `WasapiBackend` (Windows)
pub trait AudioBackend: Send + Sync {
    /// Resolve the default output device and activate a client on it in
    /// loopback configuration, not yet initialized for streaming.
    fn activate_default_output(&self) -> Result<Box<dyn LoopbackEndpoint>, CaptureError>;
}

/// An activated but not yet streaming client on the default output device.
pub trait LoopbackEndpoint: Send {
    /// Format the device mixes in; capture runs at this format.
    fn mix_format(&self) -> AudioFormat;

    /// Initialize for event-signalled capture. Returns the signal the device
    /// sets whenever a buffer period is ready.
    fn initialize_event_driven(&mut self) -> Result<Arc<dyn DataSignal>, CaptureError>;

    /// Initialize for timer-polled capture.
    fn initialize_polling(&mut self) -> Result<(), CaptureError>;

    /// Drop a half-initialized client and activate a fresh one on the same
    /// device, so the other mode can be tried.
    fn reset(&mut self) -> Result<(), CaptureError>;

    /// Finish setup and hand over the packet stream.
    fn into_stream(self: Box<Self>) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// A borrowed view into device-owned memory. Valid only until the matching
/// [`CaptureStream::release_buffer`].
#[derive(Debug, Clone, Copy)]
pub struct RawPacket<'a> {
    pub samples: &'a [f32],
    pub frames: u32,
    pub silent: bool,
}

/// Packet queue of an initialized loopback client.
///
/// `start`/`stop` are called from the controlling thread while the capture
/// thread is not running; the packet methods are called only from the
/// capture thread.
pub trait CaptureStream: Send {
    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Frames in the next packet, 0 when the queue is empty.
    fn next_packet_size(&mut self) -> Result<u32, CaptureError>;

    fn get_buffer(&mut self) -> Result<RawPacket<'_>, CaptureError>;

    fn release_buffer(&mut self, frames: u32) -> Result<(), CaptureError>;

    /// Per-thread setup on the capture thread (COM apartment, scheduling class).
    fn enter_capture_thread(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn leave_capture_thread(&mut self) {}
}

/// Result of waiting on a [`DataSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
}

/// Auto-reset "data ready" notification shared between the device and the
/// capture thread.
pub trait DataSignal: Send + Sync {
    /// Block until signalled or until `timeout` elapses. An `Err` means the
    /// wait itself failed and the loop cannot continue.
    fn wait(&self, timeout: Duration) -> Result<WaitOutcome, CaptureError>;

    /// Set the signal; used by the stop path to wake a blocked waiter.
    fn notify(&self);
}
