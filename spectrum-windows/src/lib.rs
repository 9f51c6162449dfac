//! # spectrum-windows
//!
//! Windows WASAPI loopback backend for spectrum-core.
//!
//! Provides:
//! - `WasapiBackend` — `AudioBackend` opening loopback clients on the default output device
//! - `Win32Event` — `DataSignal` backed by an auto-reset Win32 event
//! - `DeviceEnumerator` — default render endpoint lookup via the MMDevice API
//!
//! ## Platform Requirements
//! - Windows 10 1703+ (build 15063) for event-driven loopback
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use spectrum_core::{AudioConfig, AudioManager};
//! use spectrum_windows::WasapiBackend;
//!
//! let mut manager = AudioManager::new(WasapiBackend::shared(), AudioConfig::default());
//! manager.initialize()?;
//! manager.toggle_capture();
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_loopback;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_loopback::{WasapiBackend, WasapiEndpoint, WasapiStream, Win32Event};
