use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-bar values, index 0 = lowest frequency band.
pub type SpectrumData = Vec<f32>;

/// Negotiated device format. Fixed for the lifetime of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} channels, {} bits",
            self.sample_rate, self.channels, self.bits_per_sample
        )
    }
}

/// How the capture thread learns that packets are ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// The device signals an event when a buffer period completes.
    EventDriven,
    /// The capture thread wakes on a fixed interval and drains the queue.
    Polling,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventDriven => f.write_str("Event-driven"),
            Self::Polling => f.write_str("Polling"),
        }
    }
}

/// Window applied to each analysis frame before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WindowType {
    #[default]
    Hann,
    Hamming,
    Blackman,
    Rectangular,
}

impl WindowType {
    pub const ALL: [WindowType; 4] = [Self::Hann, Self::Hamming, Self::Blackman, Self::Rectangular];

    /// Step through the window types, wrapping at both ends.
    pub fn cycle(self, direction: i32) -> Self {
        cycle_in(&Self::ALL, self, direction)
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hann => "Hann",
            Self::Hamming => "Hamming",
            Self::Blackman => "Blackman",
            Self::Rectangular => "Rectangular",
        };
        f.write_str(name)
    }
}

/// How FFT bins are grouped into bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpectrumScale {
    /// Equal-width bin ranges.
    Linear,
    /// Geometric band edges; low frequencies get more bars.
    #[default]
    Logarithmic,
    /// Band edges equally spaced in mel.
    Mel,
}

impl SpectrumScale {
    pub const ALL: [SpectrumScale; 3] = [Self::Linear, Self::Logarithmic, Self::Mel];

    pub fn cycle(self, direction: i32) -> Self {
        cycle_in(&Self::ALL, self, direction)
    }
}

impl fmt::Display for SpectrumScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linear => "Linear",
            Self::Logarithmic => "Logarithmic",
            Self::Mel => "Mel",
        };
        f.write_str(name)
    }
}

fn cycle_in<T: Copy + PartialEq>(all: &[T], current: T, direction: i32) -> T {
    let count = all.len() as i32;
    let index = all.iter().position(|v| *v == current).unwrap_or(0) as i32;
    let next = ((index + direction) % count + count) % count;
    all[next as usize]
}
