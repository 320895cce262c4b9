//! The graph lifecycle controller.
//!
//! `GraphController` owns the pipeline graph and its nodes exclusively and
//! exposes the synchronous control surface: device/compressor selection,
//! destination file, preview surface, format properties, physical-source
//! routing, and the cue/start/stop/dispose lifecycle. Callers serialize
//! access; nothing here is re-entrant.
//!
//! Split across three files: this one carries the public surface and the
//! property setters, `graph_ops` the create/render/derender/destroy state
//! machine, `format_ops` the format negotiation protocol.

mod format_ops;
mod graph_ops;

pub use format_ops::StreamTarget;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::graph::{NodeId, OutputPin, Topology};
use crate::models::capabilities::{AudioCapabilities, VideoCapabilities};
use crate::models::device::{DeviceReference, PreviewSurface};
use crate::models::error::CaptureError;
use crate::models::format::{ContainerFormat, FormatField, FormatValue};
use crate::models::state::GraphState;
use crate::routing::SourceCollection;
use crate::tap::{FrameCallback, SampleTap};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::graph_driver::GraphDriver;

/// Read-only snapshot of the controller's graph bookkeeping, for callers
/// and tests that want to observe topology without touching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphDiagnostics {
    pub state: GraphState,
    pub node_count: usize,
    pub connection_count: usize,
    pub capture_rendered: bool,
    pub preview_rendered: bool,
}

/// Owns the capture pipeline graph and drives its lifecycle.
pub struct GraphController<D: GraphDriver> {
    pub(crate) driver: D,
    pub(crate) state: GraphState,
    pub(crate) topology: Topology,

    // Branch bookkeeping: what is wanted vs. what is currently wired.
    pub(crate) want_preview_rendered: bool,
    pub(crate) want_capture_rendered: bool,
    pub(crate) is_preview_rendered: bool,
    pub(crate) is_capture_rendered: bool,

    // Selected devices. Changing any of these forces a full rebuild.
    pub(crate) video_device: Option<DeviceReference>,
    pub(crate) audio_device: Option<DeviceReference>,
    pub(crate) video_compressor: Option<DeviceReference>,
    pub(crate) audio_compressor: Option<DeviceReference>,

    pub(crate) filename: PathBuf,
    pub(crate) container: ContainerFormat,
    pub(crate) preview_surface: Option<PreviewSurface>,

    // Node handles, valid only while the graph is at least Created (for
    // devices/compressors) or Rendered (for the downstream nodes).
    pub(crate) video_source_node: Option<NodeId>,
    pub(crate) audio_source_node: Option<NodeId>,
    pub(crate) video_compressor_node: Option<NodeId>,
    pub(crate) audio_compressor_node: Option<NodeId>,
    pub(crate) mux_node: Option<NodeId>,
    pub(crate) file_sink_node: Option<NodeId>,
    pub(crate) renderer_node: Option<NodeId>,
    pub(crate) tap_node: Option<NodeId>,

    // Stream-configuration endpoints resolved when the graph is created.
    pub(crate) video_stream_config: Option<(NodeId, OutputPin)>,
    pub(crate) audio_stream_config: Option<(NodeId, OutputPin)>,

    // Lazily computed, cached until the next full rebuild.
    pub(crate) video_caps: Option<VideoCapabilities>,
    pub(crate) audio_caps: Option<AudioCapabilities>,
    pub(crate) video_sources: Option<SourceCollection>,
    pub(crate) audio_sources: Option<SourceCollection>,

    pub(crate) allow_sample_tap: bool,
    pub(crate) tap: SampleTap,

    pub(crate) delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl<D: GraphDriver> GraphController<D> {
    /// Create a controller over `driver` with the initially selected
    /// devices. At least one device is required. The destination file
    /// starts as a generated temp path; the graph is created eagerly so
    /// capability and source queries work right away.
    pub fn new(
        driver: D,
        video_device: Option<DeviceReference>,
        audio_device: Option<DeviceReference>,
    ) -> Result<Self, CaptureError> {
        if video_device.is_none() && audio_device.is_none() {
            return Err(CaptureError::UnsupportedCapability(
                "at least one of the video and audio devices must be set".into(),
            ));
        }

        let container = ContainerFormat::Avi;
        let mut controller = Self {
            driver,
            state: GraphState::Null,
            topology: Topology::new(),
            want_preview_rendered: false,
            want_capture_rendered: false,
            is_preview_rendered: false,
            is_capture_rendered: false,
            video_device,
            audio_device,
            video_compressor: None,
            audio_compressor: None,
            filename: temp_filename(container),
            container,
            preview_surface: None,
            video_source_node: None,
            audio_source_node: None,
            video_compressor_node: None,
            audio_compressor_node: None,
            mux_node: None,
            file_sink_node: None,
            renderer_node: None,
            tap_node: None,
            video_stream_config: None,
            audio_stream_config: None,
            video_caps: None,
            audio_caps: None,
            video_sources: None,
            audio_sources: None,
            allow_sample_tap: false,
            tap: SampleTap::new(),
            delegate: None,
        };
        controller.ensure_created()?;
        Ok(controller)
    }

    // --- State queries ---

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state.is_capturing()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped()
    }

    /// Cued: the capture branch is wired and paused, ready for a
    /// zero-latency start.
    pub fn is_cued(&self) -> bool {
        self.is_capture_rendered && self.state == GraphState::Rendered
    }

    pub fn diagnostics(&self) -> GraphDiagnostics {
        GraphDiagnostics {
            state: self.state,
            node_count: self.topology.node_count(),
            connection_count: self.topology.connection_count(),
            capture_rendered: self.is_capture_rendered,
            preview_rendered: self.is_preview_rendered,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    // --- Device and compressor selection (full rebuild each) ---

    pub fn video_device(&self) -> Option<&DeviceReference> {
        self.video_device.as_ref()
    }

    pub fn audio_device(&self) -> Option<&DeviceReference> {
        self.audio_device.as_ref()
    }

    pub fn video_compressor(&self) -> Option<&DeviceReference> {
        self.video_compressor.as_ref()
    }

    pub fn audio_compressor(&self) -> Option<&DeviceReference> {
        self.audio_compressor.as_ref()
    }

    pub fn set_video_device(
        &mut self,
        device: Option<DeviceReference>,
    ) -> Result<(), CaptureError> {
        self.assert_stopped("set_video_device")?;
        if device.is_none() && self.audio_device.is_none() {
            return Err(CaptureError::UnsupportedCapability(
                "cannot clear the video device: no audio device is selected".into(),
            ));
        }
        self.rebuild_with(|c| c.video_device = device)
    }

    pub fn set_audio_device(
        &mut self,
        device: Option<DeviceReference>,
    ) -> Result<(), CaptureError> {
        self.assert_stopped("set_audio_device")?;
        if device.is_none() && self.video_device.is_none() {
            return Err(CaptureError::UnsupportedCapability(
                "cannot clear the audio device: no video device is selected".into(),
            ));
        }
        self.rebuild_with(|c| c.audio_device = device)
    }

    /// Set or clear the video compressor. The graph is fully rebuilt, so
    /// previously negotiated formats revert to device defaults — re-apply
    /// format settings afterwards.
    pub fn set_video_compressor(
        &mut self,
        device: Option<DeviceReference>,
    ) -> Result<(), CaptureError> {
        self.assert_stopped("set_video_compressor")?;
        self.rebuild_with(|c| c.video_compressor = device)
    }

    pub fn set_audio_compressor(
        &mut self,
        device: Option<DeviceReference>,
    ) -> Result<(), CaptureError> {
        self.assert_stopped("set_audio_compressor")?;
        self.rebuild_with(|c| c.audio_compressor = device)
    }

    /// A device or compressor change alters node identity, so nothing can
    /// be adjusted incrementally: tear the whole graph down, apply the
    /// change, re-render, and resume preview if it was wanted.
    fn rebuild_with(
        &mut self,
        apply: impl FnOnce(&mut Self),
    ) -> Result<(), CaptureError> {
        self.destroy();
        apply(self);
        self.want_preview_rendered =
            self.preview_surface.is_some() && self.video_device.is_some();
        self.render()?;
        self.start_preview_if_needed();
        Ok(())
    }

    // --- Destination file ---

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Change the destination file. Rejected while capturing and once the
    /// capture branch is cued; stop first.
    pub fn set_filename(&mut self, path: impl Into<PathBuf>) -> Result<(), CaptureError> {
        self.assert_stopped("set_filename")?;
        if self.is_cued() {
            return Err(CaptureError::InvalidState {
                operation: "set_filename while cued",
            });
        }
        self.filename = path.into();
        if let Some(sink) = self.file_sink_node {
            self.driver.set_sink_file(sink, &self.filename)?;
        }
        Ok(())
    }

    pub fn container_format(&self) -> ContainerFormat {
        self.container
    }

    /// Change the container selector. Silently ignored while capturing.
    /// Rewrites the destination file extension to match.
    pub fn set_container_format(&mut self, container: ContainerFormat) {
        if self.is_capturing() {
            return;
        }
        self.container = container;
        self.filename = self.filename.with_extension(container.extension());
    }

    // --- Preview ---

    pub fn preview_surface(&self) -> Option<&PreviewSurface> {
        self.preview_surface.as_ref()
    }

    /// Set or clear the display surface the preview branch renders into.
    /// The preview branch is wanted whenever both a surface and a video
    /// device are present.
    pub fn set_preview_surface(
        &mut self,
        surface: Option<PreviewSurface>,
    ) -> Result<(), CaptureError> {
        self.assert_stopped("set_preview_surface")?;
        self.derender();
        self.preview_surface = surface;
        self.want_preview_rendered =
            self.preview_surface.is_some() && self.video_device.is_some();
        self.render()?;
        self.start_preview_if_needed();
        Ok(())
    }

    // --- Capabilities (lazy, cached until the next rebuild) ---

    pub fn video_caps(&mut self) -> Result<VideoCapabilities, CaptureError> {
        self.ensure_created()?;
        if let Some(caps) = self.video_caps {
            return Ok(caps);
        }
        let (node, _) = self.video_stream_config.ok_or_else(|| {
            CaptureError::UnsupportedCapability(
                "the video device exposes no stream configuration".into(),
            )
        })?;
        let caps = self.driver.video_capabilities(node)?;
        self.video_caps = Some(caps);
        Ok(caps)
    }

    pub fn audio_caps(&mut self) -> Result<AudioCapabilities, CaptureError> {
        self.ensure_created()?;
        if let Some(caps) = self.audio_caps {
            return Ok(caps);
        }
        let (node, _) = self.audio_stream_config.ok_or_else(|| {
            CaptureError::UnsupportedCapability(
                "the audio device exposes no stream configuration".into(),
            )
        })?;
        let caps = self.driver.audio_capabilities(node)?;
        self.audio_caps = Some(caps);
        Ok(caps)
    }

    // --- Format properties (see format_ops for the protocol) ---

    pub fn frame_rate(&mut self) -> Result<f64, CaptureError> {
        self.format_field(StreamTarget::Video, FormatField::FrameRate)?
            .as_rate()
            .ok_or_else(unexpected_value)
    }

    /// Set the capture frame rate. The nearest supported rate is used and
    /// returned when the device cannot produce the exact value.
    pub fn set_frame_rate(&mut self, fps: f64) -> Result<f64, CaptureError> {
        self.set_format_field(
            StreamTarget::Video,
            FormatField::FrameRate,
            FormatValue::Rate(fps),
        )?
        .as_rate()
        .ok_or_else(unexpected_value)
    }

    pub fn frame_size(&mut self) -> Result<(u32, u32), CaptureError> {
        self.format_field(StreamTarget::Video, FormatField::FrameSize)?
            .as_size()
            .ok_or_else(unexpected_value)
    }

    pub fn set_frame_size(&mut self, width: u32, height: u32) -> Result<(u32, u32), CaptureError> {
        self.set_format_field(
            StreamTarget::Video,
            FormatField::FrameSize,
            FormatValue::Size { width, height },
        )?
        .as_size()
        .ok_or_else(unexpected_value)
    }

    pub fn audio_channels(&mut self) -> Result<u16, CaptureError> {
        self.format_field(StreamTarget::Audio, FormatField::ChannelCount)?
            .as_channels()
            .ok_or_else(unexpected_value)
    }

    pub fn set_audio_channels(&mut self, channels: u16) -> Result<u16, CaptureError> {
        self.set_format_field(
            StreamTarget::Audio,
            FormatField::ChannelCount,
            FormatValue::Channels(channels),
        )?
        .as_channels()
        .ok_or_else(unexpected_value)
    }

    pub fn audio_sample_rate(&mut self) -> Result<u32, CaptureError> {
        self.format_field(StreamTarget::Audio, FormatField::SampleRate)?
            .as_hertz()
            .ok_or_else(unexpected_value)
    }

    pub fn set_audio_sample_rate(&mut self, hertz: u32) -> Result<u32, CaptureError> {
        self.set_format_field(
            StreamTarget::Audio,
            FormatField::SampleRate,
            FormatValue::Hertz(hertz),
        )?
        .as_hertz()
        .ok_or_else(unexpected_value)
    }

    pub fn audio_sample_size(&mut self) -> Result<u16, CaptureError> {
        self.format_field(StreamTarget::Audio, FormatField::SampleDepth)?
            .as_bits()
            .ok_or_else(unexpected_value)
    }

    pub fn set_audio_sample_size(&mut self, bits: u16) -> Result<u16, CaptureError> {
        self.set_format_field(
            StreamTarget::Audio,
            FormatField::SampleDepth,
            FormatValue::Bits(bits),
        )?
        .as_bits()
        .ok_or_else(unexpected_value)
    }

    // --- Physical source routing ---

    pub fn video_source_names(&mut self) -> Result<Vec<String>, CaptureError> {
        self.ensure_video_sources()?;
        Ok(self
            .video_sources
            .as_ref()
            .map(SourceCollection::names)
            .unwrap_or_default())
    }

    pub fn audio_source_names(&mut self) -> Result<Vec<String>, CaptureError> {
        self.ensure_audio_sources()?;
        Ok(self
            .audio_sources
            .as_ref()
            .map(SourceCollection::names)
            .unwrap_or_default())
    }

    pub fn current_video_source(&mut self) -> Result<Option<usize>, CaptureError> {
        self.ensure_video_sources()?;
        match self.video_sources.as_ref() {
            Some(collection) => collection.current(&mut self.driver),
            None => Ok(None),
        }
    }

    pub fn current_audio_source(&mut self) -> Result<Option<usize>, CaptureError> {
        self.ensure_audio_sources()?;
        match self.audio_sources.as_ref() {
            Some(collection) => collection.current(&mut self.driver),
            None => Ok(None),
        }
    }

    /// Enable one physical video input, or mute them all with `None`.
    pub fn select_video_source(&mut self, index: Option<usize>) -> Result<(), CaptureError> {
        self.ensure_video_sources()?;
        match self.video_sources.as_ref() {
            Some(collection) => collection.select(&mut self.driver, index),
            None => Ok(()),
        }
    }

    pub fn select_audio_source(&mut self, index: Option<usize>) -> Result<(), CaptureError> {
        self.ensure_audio_sources()?;
        match self.audio_sources.as_ref() {
            Some(collection) => collection.select(&mut self.driver, index),
            None => Ok(()),
        }
    }

    fn ensure_video_sources(&mut self) -> Result<(), CaptureError> {
        self.ensure_created()?;
        if self.video_sources.is_none() {
            let collection = match self.video_source_node {
                Some(node) => SourceCollection::from_device(&mut self.driver, node)?,
                None => SourceCollection::empty(),
            };
            self.video_sources = Some(collection);
        }
        Ok(())
    }

    fn ensure_audio_sources(&mut self) -> Result<(), CaptureError> {
        self.ensure_created()?;
        if self.audio_sources.is_none() {
            let collection = match self.audio_source_node {
                Some(node) => SourceCollection::from_device(&mut self.driver, node)?,
                None => SourceCollection::empty(),
            };
            self.audio_sources = Some(collection);
        }
        Ok(())
    }

    // --- Sample tap ---

    /// Allow a raw-sample tap node on the preview branch. Takes effect the
    /// next time the preview branch is rendered.
    pub fn enable_sample_tap(&mut self, allow: bool) {
        self.allow_sample_tap = allow;
    }

    /// Arm the tap for one frame: the next frame delivered on the preview
    /// branch is copied out and `callback` fires once on the delivery
    /// thread. Call again (or `rearm_frame_grab`) for the next frame.
    pub fn arm_frame_grab(&mut self, callback: FrameCallback) -> Result<(), CaptureError> {
        let tap_node = self.tap_node.ok_or_else(|| {
            CaptureError::UnsupportedCapability(
                "the sample tap is not rendered; enable it and render the preview branch".into(),
            )
        })?;
        let format = self.driver.connected_video_format(tap_node)?;
        // 24-bit RGB frames
        let frame_size = format.width as usize * format.height as usize * 3;
        self.tap.arm(callback, frame_size);
        Ok(())
    }

    /// Let one more frame through to the previously armed callback.
    pub fn rearm_frame_grab(&mut self) {
        self.tap.rearm();
    }

    pub fn disarm_frame_grab(&mut self) {
        self.tap.disarm();
    }

    // --- Lifecycle ---

    /// Prepare for capturing with minimal start latency: render the capture
    /// branch and pause the pipeline clock. Optional; `start` cues
    /// implicitly. Not allowed while capturing.
    pub fn cue(&mut self) -> Result<(), CaptureError> {
        self.assert_stopped("cue")?;
        self.want_capture_rendered = true;
        self.render()?;
        self.driver.pause()
    }

    /// Begin capturing.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.assert_stopped("start")?;
        self.want_capture_rendered = true;
        self.render()?;
        self.driver.run()?;
        self.set_state(GraphState::Capturing);
        Ok(())
    }

    /// Stop the current capture. Succeeds in every state, including when
    /// nothing is capturing. Fires the completion notification exactly
    /// once per capture session, then restores the preview branch on a
    /// best-effort basis.
    pub fn stop(&mut self) {
        self.want_capture_rendered = false;
        self.driver.stop_clock();

        if self.state == GraphState::Capturing {
            self.set_state(GraphState::Rendered);
            if let Some(delegate) = self.delegate.clone() {
                delegate.on_capture_complete();
            }
        }

        // Re-render to tear the capture branch down when a preview branch
        // needs restoring. Stop must always succeed, so failures here are
        // logged and swallowed.
        if self.state >= GraphState::Created {
            if let Err(err) = self.render() {
                log::warn!("re-render after stop failed: {err}");
            }
            self.start_preview_if_needed();
        }
    }

    /// Stop and release everything. The completion notification does not
    /// fire. Safe in every state, never raises.
    pub fn dispose(&mut self) {
        self.want_preview_rendered = false;
        self.want_capture_rendered = false;
        self.delegate = None;
        self.destroy();
    }

    // --- Internal helpers ---

    pub(crate) fn set_state(&mut self, new_state: GraphState) {
        if self.state == new_state {
            return;
        }
        self.state = new_state;
        if let Some(delegate) = self.delegate.clone() {
            delegate.on_state_changed(new_state);
        }
    }

    pub(crate) fn assert_stopped(&self, operation: &'static str) -> Result<(), CaptureError> {
        if self.state.is_capturing() {
            return Err(CaptureError::InvalidState { operation });
        }
        Ok(())
    }
}

impl<D: GraphDriver> Drop for GraphController<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn unexpected_value() -> CaptureError {
    CaptureError::UnsupportedCapability("the driver returned a mismatched format value".into())
}

fn temp_filename(container: ContainerFormat) -> PathBuf {
    std::env::temp_dir().join(format!(
        "capture_{}.{}",
        uuid::Uuid::new_v4(),
        container.extension()
    ))
}
