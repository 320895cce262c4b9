use serde::{Deserialize, Serialize};

/// Capability snapshot of a video endpoint: supported frame-rate and
/// frame-size ranges with their granularities.
///
/// Computed lazily through the driver and cached by the controller until
/// the next full graph rebuild invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoCapabilities {
    pub min_frame_rate: f64,
    pub max_frame_rate: f64,
    /// Step between supported frame rates, e.g. 5 fps steps from 5 to 30.
    pub frame_rate_granularity: f64,
    pub min_width: u32,
    pub max_width: u32,
    pub width_granularity: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub height_granularity: u32,
}

/// Capability snapshot of an audio endpoint, mirroring the audio stream
/// capabilities a capture device reports: channel count, sample size and
/// sampling rate ranges with granularities (e.g. 11025 Hz to 44100 Hz in
/// steps of 11025 Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioCapabilities {
    pub minimum_channels: u16,
    pub maximum_channels: u16,
    pub channels_granularity: u16,
    pub minimum_sample_size: u16,
    pub maximum_sample_size: u16,
    pub sample_size_granularity: u16,
    pub minimum_sampling_rate: u32,
    pub maximum_sampling_rate: u32,
    pub sampling_rate_granularity: u32,
}
