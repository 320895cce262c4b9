//! In-memory device catalog for the simulated backend.
//!
//! Tests assemble a catalog of device blueprints, hand it to a `SimDriver`,
//! and keep a clone to flip live properties (a device becoming busy) while
//! a controller owns the driver.

use std::sync::Arc;

use parking_lot::Mutex;

use media_capture_core::graph::MediaKind;
use media_capture_core::models::capabilities::{AudioCapabilities, VideoCapabilities};
use media_capture_core::models::device::DeviceReference;
use media_capture_core::models::format::{AudioFormat, VideoFormat};
use media_capture_core::routing::PhysicalSourceInfo;

/// Video half of a device blueprint: what the endpoint supports and the
/// format a fresh source node starts with.
#[derive(Debug, Clone, Copy)]
pub struct SimVideoSpec {
    pub caps: VideoCapabilities,
    pub default_format: VideoFormat,
}

/// Audio half of a device blueprint.
#[derive(Debug, Clone, Copy)]
pub struct SimAudioSpec {
    pub caps: AudioCapabilities,
    pub default_format: AudioFormat,
}

/// Blueprint of one simulated capture device.
#[derive(Debug, Clone)]
pub struct SimDeviceSpec {
    pub id: String,
    pub name: String,
    pub kind: MediaKind,
    /// Whether the capture output also exists as an interleaved pin.
    pub supports_interleaved: bool,
    /// A busy device refuses connections on any of its pins.
    pub in_use: bool,
    pub video: Option<SimVideoSpec>,
    pub audio: Option<SimAudioSpec>,
    pub connectors: Vec<PhysicalSourceInfo>,
}

impl SimDeviceSpec {
    /// A video device with webcam-like defaults: 5-30 fps in steps of 5,
    /// 160x120 up to 640x480 in steps of 160x120, starting at 640x480@30.
    pub fn video(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: MediaKind::Video,
            supports_interleaved: false,
            in_use: false,
            video: Some(SimVideoSpec {
                caps: VideoCapabilities {
                    min_frame_rate: 5.0,
                    max_frame_rate: 30.0,
                    frame_rate_granularity: 5.0,
                    min_width: 160,
                    max_width: 640,
                    width_granularity: 160,
                    min_height: 120,
                    max_height: 480,
                    height_granularity: 120,
                },
                default_format: VideoFormat {
                    frame_rate: 30.0,
                    width: 640,
                    height: 480,
                },
            }),
            audio: None,
            connectors: Vec::new(),
        }
    }

    /// An audio device with sound-card-like defaults: 1-2 channels, 8 or
    /// 16 bits, 11025-44100 Hz in steps of 11025, starting at 44.1k/16/2.
    pub fn audio(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: MediaKind::Audio,
            supports_interleaved: false,
            in_use: false,
            video: None,
            audio: Some(SimAudioSpec {
                caps: AudioCapabilities {
                    minimum_channels: 1,
                    maximum_channels: 2,
                    channels_granularity: 1,
                    minimum_sample_size: 8,
                    maximum_sample_size: 16,
                    sample_size_granularity: 8,
                    minimum_sampling_rate: 11_025,
                    maximum_sampling_rate: 44_100,
                    sampling_rate_granularity: 11_025,
                },
                default_format: AudioFormat::new(2, 44_100, 16),
            }),
            connectors: Vec::new(),
        }
    }

    pub fn with_interleaved(mut self) -> Self {
        self.supports_interleaved = true;
        self
    }

    pub fn with_connectors(mut self, connectors: Vec<PhysicalSourceInfo>) -> Self {
        self.connectors = connectors;
        self
    }

    pub fn with_video(mut self, spec: SimVideoSpec) -> Self {
        self.video = Some(spec);
        self
    }

    pub fn with_audio(mut self, spec: SimAudioSpec) -> Self {
        self.audio = Some(spec);
        self
    }

    pub fn reference(&self) -> DeviceReference {
        DeviceReference::new(self.id.clone(), self.name.clone())
    }
}

/// Shared, mutable catalog of simulated devices. Clone-cheap; all clones
/// see the same devices.
#[derive(Clone, Default)]
pub struct SimCatalog {
    inner: Arc<Mutex<Vec<SimDeviceSpec>>>,
}

impl SimCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device and return the reference a controller selects it
    /// by.
    pub fn add(&self, spec: SimDeviceSpec) -> DeviceReference {
        let reference = spec.reference();
        self.inner.lock().push(spec);
        reference
    }

    /// Everything currently registered, as selectable references.
    pub fn devices(&self) -> Vec<DeviceReference> {
        self.inner.lock().iter().map(SimDeviceSpec::reference).collect()
    }

    /// Mark a device busy (held by another process) or free again.
    /// Returns false when the id is unknown.
    pub fn set_in_use(&self, id: &str, in_use: bool) -> bool {
        let mut devices = self.inner.lock();
        match devices.iter_mut().find(|d| d.id == id) {
            Some(device) => {
                device.in_use = in_use;
                true
            }
            None => false,
        }
    }

    pub(crate) fn spec(&self, id: &str) -> Option<SimDeviceSpec> {
        self.inner.lock().iter().find(|d| d.id == id).cloned()
    }
}
