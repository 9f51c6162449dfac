//! # spectrum-core
//!
//! Platform-agnostic core of the loopback spectrum analyzer.
//!
//! Captures what the default output device is playing, runs it through a
//! windowed FFT, groups the bins into bars and smooths them for display.
//! Platform backends (Windows WASAPI) implement the `AudioBackend` family of
//! traits and plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! spectrum-core (this crate)
//! ├── traits/       ← AudioBackend, LoopbackEndpoint, CaptureStream, DataSignal, AudioSource, CaptureDelegate
//! ├── models/       ← CaptureError, CaptureState, AudioConfig, AudioFormat, WindowType, SpectrumScale
//! ├── capture/      ← DeviceSession, CaptureEngine, PacketProcessor, EventSignal
//! ├── session/      ← CaptureSession (capture thread lifecycle)
//! ├── processing/   ← RingBuffer, FftProcessor, FrequencyMapper, PostProcessor
//! ├── analysis/     ← SpectrumAnalyzer
//! └── source/       ← RealtimeAudioSource, AnimatedAudioSource, AudioManager
//! ```
//!
//! Data flow:
//! ```text
//! [capture thread] CaptureEngine → PacketProcessor → sink → RingBuffer
//! [update thread]  RingBuffer → FftProcessor → FrequencyMapper → PostProcessor → spectrum()
//! ```

pub mod analysis;
pub mod capture;
pub mod models;
pub mod processing;
pub mod session;
pub mod source;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use analysis::analyzer::SpectrumAnalyzer;
pub use capture::engine::CaptureEngine;
pub use capture::signal::EventSignal;
pub use models::audio_models::{AudioFormat, CaptureMode, SpectrumData, SpectrumScale, WindowType};
pub use models::config::{AudioConfig, CaptureSettings};
pub use models::error::{CaptureError, ErrorCategory};
pub use models::state::{CaptureDiagnostics, CaptureState};
pub use processing::fft_processor::FftProcessor;
pub use processing::frequency_mapper::FrequencyMapper;
pub use processing::post_processor::PostProcessor;
pub use processing::ring_buffer::RingBuffer;
pub use session::capture_session::CaptureSession;
pub use source::animated::AnimatedAudioSource;
pub use source::manager::AudioManager;
pub use source::realtime::RealtimeAudioSource;
pub use traits::audio_backend::{
    AudioBackend, AudioDataCallback, CaptureStream, DataSignal, LoopbackEndpoint, RawPacket,
    WaitOutcome,
};
pub use traits::audio_source::AudioSource;
pub use traits::capture_delegate::CaptureDelegate;
