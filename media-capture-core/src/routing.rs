//! Physical-connector source selection.
//!
//! Devices with multiple physical inputs expose them through one of two
//! native mechanisms: a crossbar (route an input pin to an output pin, the
//! usual shape for TV tuners) or an input mixer (a per-pin enable flag, the
//! usual shape for sound cards). Both sit behind the same small capability
//! interface so callers just enable a source by index.

use crate::graph::NodeId;
use crate::models::error::CaptureError;
use crate::traits::graph_driver::GraphDriver;

/// The kind of physical connector a crossbar input represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    VideoTuner,
    VideoComposite,
    VideoSvideo,
    VideoRgb,
    VideoUsb,
    VideoFirewire,
    AudioTuner,
    AudioLine,
    AudioMic,
    AudioSpdif,
    AudioAux,
    Unknown,
}

impl ConnectorKind {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::VideoTuner => "Video Tuner",
            Self::VideoComposite => "Video Composite",
            Self::VideoSvideo => "Video S-Video",
            Self::VideoRgb => "Video RGB",
            Self::VideoUsb => "Video USB",
            Self::VideoFirewire => "Video Firewire",
            Self::AudioTuner => "Audio Tuner",
            Self::AudioLine => "Audio Line In",
            Self::AudioMic => "Audio Mic",
            Self::AudioSpdif => "Audio SPDIF Digital",
            Self::AudioAux => "Audio AUX",
            Self::Unknown => "Unknown Connector",
        }
    }
}

/// Crossbar pins routed together with a primary connector, e.g. the audio
/// input that belongs to a video input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelatedPins {
    pub output_pin: u32,
    pub input_pin: u32,
}

/// One physical source discovered on a device, as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalSourceInfo {
    Crossbar {
        connector: ConnectorKind,
        output_pin: u32,
        input_pin: u32,
        related: Option<RelatedPins>,
    },
    MixerPin {
        pin: u32,
        name: String,
    },
}

/// Uniform enable/disable capability over the two routing mechanisms.
pub trait SourceControl {
    fn name(&self) -> &str;

    fn enabled<D: GraphDriver>(&self, driver: &mut D) -> Result<bool, CaptureError>;

    fn set_enabled<D: GraphDriver>(&self, driver: &mut D, enable: bool)
        -> Result<(), CaptureError>;
}

/// A crossbar input. Enabling routes the input pin to its output pin (and
/// the related pair, when present); disabling un-routes the output pins.
/// Routing switches atomically per call, so enabling a new input never
/// requires disabling the previous one first.
#[derive(Debug, Clone)]
pub struct CrossbarSource {
    node: NodeId,
    output_pin: u32,
    input_pin: u32,
    related: Option<RelatedPins>,
    name: String,
}

impl SourceControl for CrossbarSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled<D: GraphDriver>(&self, driver: &mut D) -> Result<bool, CaptureError> {
        Ok(driver.routed_input(self.node, self.output_pin)? == Some(self.input_pin))
    }

    fn set_enabled<D: GraphDriver>(
        &self,
        driver: &mut D,
        enable: bool,
    ) -> Result<(), CaptureError> {
        let input = enable.then_some(self.input_pin);
        driver.route(self.node, self.output_pin, input)?;
        if let Some(related) = self.related {
            let related_input = enable.then_some(related.input_pin);
            driver.route(self.node, related.output_pin, related_input)?;
        }
        Ok(())
    }
}

/// A mixer input pin. Only one pin per device should be enabled at a time;
/// `SourceCollection::select` disables the others before enabling one.
#[derive(Debug, Clone)]
pub struct MixerSource {
    node: NodeId,
    pin: u32,
    name: String,
}

impl SourceControl for MixerSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled<D: GraphDriver>(&self, driver: &mut D) -> Result<bool, CaptureError> {
        driver.mixer_enabled(self.node, self.pin)
    }

    fn set_enabled<D: GraphDriver>(
        &self,
        driver: &mut D,
        enable: bool,
    ) -> Result<(), CaptureError> {
        driver.set_mixer_enabled(self.node, self.pin, enable)
    }
}

/// Either routing variant, selected at discovery time.
#[derive(Debug, Clone)]
pub enum PhysicalSource {
    Crossbar(CrossbarSource),
    Mixer(MixerSource),
}

impl SourceControl for PhysicalSource {
    fn name(&self) -> &str {
        match self {
            Self::Crossbar(s) => s.name(),
            Self::Mixer(s) => s.name(),
        }
    }

    fn enabled<D: GraphDriver>(&self, driver: &mut D) -> Result<bool, CaptureError> {
        match self {
            Self::Crossbar(s) => s.enabled(driver),
            Self::Mixer(s) => s.enabled(driver),
        }
    }

    fn set_enabled<D: GraphDriver>(
        &self,
        driver: &mut D,
        enable: bool,
    ) -> Result<(), CaptureError> {
        match self {
            Self::Crossbar(s) => s.set_enabled(driver, enable),
            Self::Mixer(s) => s.set_enabled(driver, enable),
        }
    }
}

/// Physical sources discovered on one device node. Usually empty: most
/// devices have a single hard-wired input.
#[derive(Debug, Clone, Default)]
pub struct SourceCollection {
    sources: Vec<PhysicalSource>,
}

impl SourceCollection {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Discover the physical sources of `node` through the driver.
    pub fn from_device<D: GraphDriver>(
        driver: &mut D,
        node: NodeId,
    ) -> Result<Self, CaptureError> {
        let sources = driver
            .physical_sources(node)?
            .into_iter()
            .map(|info| match info {
                PhysicalSourceInfo::Crossbar {
                    connector,
                    output_pin,
                    input_pin,
                    related,
                } => PhysicalSource::Crossbar(CrossbarSource {
                    node,
                    output_pin,
                    input_pin,
                    related,
                    name: connector.display_name().to_string(),
                }),
                PhysicalSourceInfo::MixerPin { pin, name } => {
                    PhysicalSource::Mixer(MixerSource { node, pin, name })
                }
            })
            .collect();
        Ok(Self { sources })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Index of the first enabled source, if any.
    pub fn current<D: GraphDriver>(
        &self,
        driver: &mut D,
    ) -> Result<Option<usize>, CaptureError> {
        for (i, source) in self.sources.iter().enumerate() {
            if source.enabled(driver)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Enable the source at `index`, or disable all sources (mute) when
    /// `index` is `None`.
    ///
    /// Crossbar routing switches atomically, so only the chosen source is
    /// touched; mixer pins are disabled one by one first because several
    /// can be enabled at once natively.
    pub fn select<D: GraphDriver>(
        &self,
        driver: &mut D,
        index: Option<usize>,
    ) -> Result<(), CaptureError> {
        let Some(index) = index else {
            for source in &self.sources {
                source.set_enabled(driver, false)?;
            }
            return Ok(());
        };

        let chosen = self.sources.get(index).ok_or_else(|| {
            CaptureError::UnsupportedCapability(format!(
                "source index {} out of range ({} sources)",
                index,
                self.sources.len()
            ))
        })?;

        if matches!(chosen, PhysicalSource::Mixer(_)) {
            for (i, source) in self.sources.iter().enumerate() {
                if i != index {
                    source.set_enabled(driver, false)?;
                }
            }
        }
        chosen.set_enabled(driver, true)
    }
}
