//! Simulated pipeline driver.
//!
//! Implements `GraphDriver` against in-memory state instead of a native
//! media stack, with the same error contract: busy devices refuse
//! connections with `DeviceInUse`, missing interleaved pins fail with
//! `ConnectionFailure`, formats are only accessible on disconnected
//! endpoints and are clamped to the device capabilities on write.
//!
//! The driver is clone-cheap and all clones share one graph, so a test can
//! keep a handle for inspection and frame pumping while a controller owns
//! another.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use media_capture_core::graph::{MediaKind, NodeId, OutputPin};
use media_capture_core::models::capabilities::{AudioCapabilities, VideoCapabilities};
use media_capture_core::models::device::{DeviceReference, PreviewSurface};
use media_capture_core::models::error::CaptureError;
use media_capture_core::models::format::{AudioFormat, ContainerFormat, FormatBlock, VideoFormat};
use media_capture_core::routing::PhysicalSourceInfo;
use media_capture_core::tap::TapSink;
use media_capture_core::traits::graph_driver::GraphDriver;

use crate::catalog::SimCatalog;

/// State of the simulated pipeline clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimClock {
    #[default]
    Stopped,
    Paused,
    Running,
}

struct SourceState {
    device_id: String,
    device_name: String,
    kind: MediaKind,
    supports_interleaved: bool,
    video_format: Option<VideoFormat>,
    audio_format: Option<AudioFormat>,
    /// Crossbar routing: output pin -> routed input pin.
    routes: BTreeMap<u32, u32>,
    /// Mixer routing: input pin -> enabled.
    mixer: BTreeMap<u32, bool>,
}

enum SimNode {
    Source(SourceState),
    Compressor { device_id: String },
    Mux,
    FileSink { path: PathBuf },
    Renderer { surface: Option<u64> },
    Tap { sink: Option<TapSink> },
}

#[derive(Default)]
struct SimInner {
    graph_alive: bool,
    next_node: u64,
    nodes: BTreeMap<NodeId, SimNode>,
    connections: Vec<(NodeId, OutputPin, NodeId)>,
    clock: SimClock,
}

/// Simulated backend over a shared device catalog.
#[derive(Clone)]
pub struct SimDriver {
    catalog: SimCatalog,
    inner: Arc<Mutex<SimInner>>,
}

impl SimDriver {
    pub fn new(catalog: SimCatalog) -> Self {
        Self {
            catalog,
            inner: Arc::new(Mutex::new(SimInner::default())),
        }
    }

    // --- Inspection, for tests ---

    pub fn clock(&self) -> SimClock {
        self.inner.lock().clock
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// Output pins of the current connections, for wiring assertions.
    pub fn connected_pins(&self) -> Vec<OutputPin> {
        self.inner
            .lock()
            .connections
            .iter()
            .map(|&(_, pin, _)| pin)
            .collect()
    }

    /// Whether any renderer node currently holds a preview surface.
    pub fn preview_attached(&self) -> bool {
        self.inner
            .lock()
            .nodes
            .values()
            .any(|n| matches!(n, SimNode::Renderer { surface: Some(_) }))
    }

    /// Destination path of the file sink, when one exists.
    pub fn sink_path(&self) -> Option<PathBuf> {
        self.inner.lock().nodes.values().find_map(|n| match n {
            SimNode::FileSink { path } => Some(path.clone()),
            _ => None,
        })
    }

    /// Push one black frame through every connected tap while the clock
    /// runs. Returns whether any tap received a frame. Sinks are invoked
    /// after the graph lock is released, like a real delivery thread.
    pub fn pump_preview_frame(&self) -> bool {
        let deliveries: Vec<(TapSink, VideoFormat)> = {
            let inner = self.inner.lock();
            if inner.clock != SimClock::Running {
                return false;
            }
            inner
                .nodes
                .iter()
                .filter_map(|(&id, node)| match node {
                    SimNode::Tap { sink: Some(sink) } => inner
                        .upstream_video_format(id)
                        .map(|format| (sink.clone(), format)),
                    _ => None,
                })
                .collect()
        };

        let mut delivered = false;
        for (sink, format) in deliveries {
            let frame = vec![0u8; format.width as usize * format.height as usize * 3];
            sink.deliver(&frame, format.width, format.height);
            delivered = true;
        }
        delivered
    }
}

impl SimInner {
    fn alive(&self, operation: &'static str) -> Result<(), CaptureError> {
        if self.graph_alive {
            Ok(())
        } else {
            Err(CaptureError::InvalidState { operation })
        }
    }

    fn alloc(&mut self, node: SimNode) -> NodeId {
        self.next_node += 1;
        let id = NodeId::from_raw(self.next_node);
        self.nodes.insert(id, node);
        id
    }

    fn node(&self, id: NodeId) -> Result<&SimNode, CaptureError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| CaptureError::ConnectionFailure(format!("unknown node {:?}", id)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SimNode, CaptureError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| CaptureError::ConnectionFailure(format!("unknown node {:?}", id)))
    }

    fn source(&self, id: NodeId) -> Result<&SourceState, CaptureError> {
        match self.node(id)? {
            SimNode::Source(state) => Ok(state),
            _ => Err(CaptureError::UnsupportedCapability(format!(
                "node {:?} is not a source",
                id
            ))),
        }
    }

    fn source_mut(&mut self, id: NodeId) -> Result<&mut SourceState, CaptureError> {
        match self.node_mut(id)? {
            SimNode::Source(state) => Ok(state),
            _ => Err(CaptureError::UnsupportedCapability(format!(
                "node {:?} is not a source",
                id
            ))),
        }
    }

    fn endpoint_connected(&self, node: NodeId, pin: OutputPin) -> bool {
        self.connections
            .iter()
            .any(|&(from, p, _)| from == node && p == pin)
    }

    /// The negotiated format of the video source feeding `node`.
    fn upstream_video_format(&self, node: NodeId) -> Option<VideoFormat> {
        let &(from, _, _) = self.connections.iter().find(|&&(_, _, to)| to == node)?;
        match self.nodes.get(&from)? {
            SimNode::Source(state) => state.video_format,
            _ => None,
        }
    }

    /// Validate that `pin` exists on `from` and that the device behind it
    /// will accept a connection right now.
    fn check_output(
        &self,
        catalog: &SimCatalog,
        from: NodeId,
        pin: OutputPin,
    ) -> Result<(), CaptureError> {
        match self.node(from)? {
            SimNode::Source(state) => {
                let busy = catalog
                    .spec(&state.device_id)
                    .map(|spec| spec.in_use)
                    .unwrap_or(false);
                if busy {
                    return Err(CaptureError::DeviceInUse {
                        device: state.device_name.clone(),
                    });
                }
                let supported = match pin {
                    OutputPin::Capture(MediaKind::Interleaved) => {
                        state.kind == MediaKind::Video && state.supports_interleaved
                    }
                    OutputPin::Capture(kind) => state.kind == kind,
                    OutputPin::Preview(kind) => {
                        state.kind == MediaKind::Video && kind == MediaKind::Video
                    }
                    OutputPin::Out => false,
                };
                if !supported {
                    return Err(CaptureError::ConnectionFailure(format!(
                        "device '{}' has no {:?} pin",
                        state.device_name, pin
                    )));
                }
                Ok(())
            }
            SimNode::Compressor { .. } | SimNode::Mux | SimNode::Tap { .. } => {
                if pin == OutputPin::Out {
                    Ok(())
                } else {
                    Err(CaptureError::ConnectionFailure(format!(
                        "node {:?} only has a plain output pin",
                        from
                    )))
                }
            }
            SimNode::FileSink { .. } | SimNode::Renderer { .. } => Err(
                CaptureError::ConnectionFailure(format!("node {:?} has no outputs", from)),
            ),
        }
    }
}

impl GraphDriver for SimDriver {
    fn create_graph(&mut self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        inner.graph_alive = true;
        inner.clock = SimClock::Stopped;
        log::debug!("simulated graph created");
        Ok(())
    }

    fn destroy_graph(&mut self) {
        let mut inner = self.inner.lock();
        if inner.graph_alive {
            log::debug!(
                "simulated graph destroyed ({} nodes released)",
                inner.nodes.len()
            );
        }
        inner.graph_alive = false;
        inner.nodes.clear();
        inner.connections.clear();
        inner.clock = SimClock::Stopped;
    }

    fn add_source(
        &mut self,
        device: &DeviceReference,
        kind: MediaKind,
    ) -> Result<NodeId, CaptureError> {
        let mut inner = self.inner.lock();
        inner.alive("add_source")?;
        let spec = self.catalog.spec(&device.id).ok_or_else(|| {
            CaptureError::ConnectionFailure(format!("no such device '{}'", device.id))
        })?;
        if spec.kind != kind {
            return Err(CaptureError::ConnectionFailure(format!(
                "device '{}' is not a {:?} capture device",
                spec.name, kind
            )));
        }
        // Fresh nodes always start from the catalog defaults; negotiated
        // formats do not survive node re-creation.
        Ok(inner.alloc(SimNode::Source(SourceState {
            device_id: spec.id.clone(),
            device_name: spec.name.clone(),
            kind: spec.kind,
            supports_interleaved: spec.supports_interleaved,
            video_format: spec.video.map(|v| v.default_format),
            audio_format: spec.audio.map(|a| a.default_format),
            routes: BTreeMap::new(),
            mixer: BTreeMap::new(),
        })))
    }

    fn add_compressor(
        &mut self,
        device: &DeviceReference,
        _kind: MediaKind,
    ) -> Result<NodeId, CaptureError> {
        let mut inner = self.inner.lock();
        inner.alive("add_compressor")?;
        Ok(inner.alloc(SimNode::Compressor {
            device_id: device.id.clone(),
        }))
    }

    fn add_mux(&mut self, _container: ContainerFormat) -> Result<NodeId, CaptureError> {
        let mut inner = self.inner.lock();
        inner.alive("add_mux")?;
        Ok(inner.alloc(SimNode::Mux))
    }

    fn add_file_sink(&mut self, path: &Path) -> Result<NodeId, CaptureError> {
        let mut inner = self.inner.lock();
        inner.alive("add_file_sink")?;
        Ok(inner.alloc(SimNode::FileSink {
            path: path.to_path_buf(),
        }))
    }

    fn add_renderer(&mut self) -> Result<NodeId, CaptureError> {
        let mut inner = self.inner.lock();
        inner.alive("add_renderer")?;
        Ok(inner.alloc(SimNode::Renderer { surface: None }))
    }

    fn add_sample_tap(&mut self) -> Result<NodeId, CaptureError> {
        let mut inner = self.inner.lock();
        inner.alive("add_sample_tap")?;
        Ok(inner.alloc(SimNode::Tap { sink: None }))
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        if inner
            .connections
            .iter()
            .any(|&(from, _, to)| from == node || to == node)
        {
            return Err(CaptureError::Cleanup(format!(
                "node {:?} still has connections",
                node
            )));
        }
        match inner.nodes.get(&node) {
            Some(SimNode::Renderer { surface: Some(_) }) => Err(CaptureError::Cleanup(format!(
                "renderer {:?} still holds the preview surface",
                node
            ))),
            Some(_) => {
                inner.nodes.remove(&node);
                Ok(())
            }
            None => Err(CaptureError::Cleanup(format!("unknown node {:?}", node))),
        }
    }

    fn has_output_pin(&self, node: NodeId, pin: OutputPin) -> bool {
        let inner = self.inner.lock();
        match inner.nodes.get(&node) {
            Some(SimNode::Source(state)) => match pin {
                OutputPin::Capture(MediaKind::Interleaved) => {
                    state.kind == MediaKind::Video && state.supports_interleaved
                }
                OutputPin::Capture(kind) => state.kind == kind,
                OutputPin::Preview(kind) => {
                    state.kind == MediaKind::Video && kind == MediaKind::Video
                }
                OutputPin::Out => false,
            },
            Some(SimNode::Compressor { .. }) | Some(SimNode::Mux) | Some(SimNode::Tap { .. }) => {
                pin == OutputPin::Out
            }
            _ => false,
        }
    }

    fn connect(&mut self, from: NodeId, pin: OutputPin, to: NodeId) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        inner.alive("connect")?;
        inner.check_output(&self.catalog, from, pin)?;
        if let SimNode::Source(_) = inner.node(to)? {
            return Err(CaptureError::ConnectionFailure(format!(
                "source node {:?} accepts no inputs",
                to
            )));
        }
        if inner
            .connections
            .iter()
            .any(|&(f, _, t)| f == from && t == to)
        {
            return Err(CaptureError::ConnectionFailure(format!(
                "{:?} and {:?} are already connected",
                from, to
            )));
        }
        inner.connections.push((from, pin, to));
        Ok(())
    }

    fn disconnect(&mut self, from: NodeId, to: NodeId) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        let before = inner.connections.len();
        inner
            .connections
            .retain(|&(f, _, t)| !(f == from && t == to));
        if inner.connections.len() == before {
            return Err(CaptureError::Cleanup(format!(
                "{:?} and {:?} are not connected",
                from, to
            )));
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        inner.alive("run")?;
        inner.clock = SimClock::Running;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        inner.alive("pause")?;
        inner.clock = SimClock::Paused;
        Ok(())
    }

    fn stop_clock(&mut self) {
        self.inner.lock().clock = SimClock::Stopped;
    }

    fn attach_preview(
        &mut self,
        renderer: NodeId,
        surface: &PreviewSurface,
    ) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        match inner.node_mut(renderer)? {
            SimNode::Renderer { surface: slot } => {
                *slot = Some(surface.raw());
                Ok(())
            }
            _ => Err(CaptureError::ConnectionFailure(format!(
                "node {:?} is not a renderer",
                renderer
            ))),
        }
    }

    fn detach_preview(&mut self, renderer: NodeId) {
        let mut inner = self.inner.lock();
        if let Some(SimNode::Renderer { surface }) = inner.nodes.get_mut(&renderer) {
            *surface = None;
        }
    }

    fn set_tap_sink(&mut self, tap: NodeId, sink: TapSink) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        match inner.node_mut(tap)? {
            SimNode::Tap { sink: slot } => {
                *slot = Some(sink);
                Ok(())
            }
            _ => Err(CaptureError::ConnectionFailure(format!(
                "node {:?} is not a sample tap",
                tap
            ))),
        }
    }

    fn connected_video_format(&self, node: NodeId) -> Result<VideoFormat, CaptureError> {
        let inner = self.inner.lock();
        inner.upstream_video_format(node).ok_or_else(|| {
            CaptureError::ConnectionFailure(format!(
                "node {:?} is not fed by a video source",
                node
            ))
        })
    }

    fn get_format(&mut self, node: NodeId, pin: OutputPin) -> Result<FormatBlock, CaptureError> {
        let inner = self.inner.lock();
        if inner.endpoint_connected(node, pin) {
            return Err(CaptureError::ConnectionFailure(
                "formats are only accessible while the endpoint is disconnected".into(),
            ));
        }
        let state = inner.source(node)?;
        format_block(state, pin)
    }

    fn set_format(
        &mut self,
        node: NodeId,
        pin: OutputPin,
        block: FormatBlock,
    ) -> Result<FormatBlock, CaptureError> {
        let mut inner = self.inner.lock();
        if inner.endpoint_connected(node, pin) {
            return Err(CaptureError::ConnectionFailure(
                "formats are only accessible while the endpoint is disconnected".into(),
            ));
        }
        let spec = {
            let state = inner.source(node)?;
            self.catalog.spec(&state.device_id).ok_or_else(|| {
                CaptureError::ConnectionFailure(format!(
                    "device '{}' disappeared from the catalog",
                    state.device_name
                ))
            })?
        };
        let state = inner.source_mut(node)?;

        match (pin, block) {
            (
                OutputPin::Capture(MediaKind::Video)
                | OutputPin::Capture(MediaKind::Interleaved)
                | OutputPin::Preview(MediaKind::Video),
                FormatBlock::Video(requested),
            ) => {
                let caps = spec.video.map(|v| v.caps).ok_or_else(|| {
                    CaptureError::UnsupportedCapability(
                        "the device has no video capabilities".into(),
                    )
                })?;
                let clamped = clamp_video(requested, &caps);
                state.video_format = Some(clamped);
                Ok(FormatBlock::Video(clamped))
            }
            (OutputPin::Capture(MediaKind::Audio), FormatBlock::Audio(requested)) => {
                let caps = spec.audio.map(|a| a.caps).ok_or_else(|| {
                    CaptureError::UnsupportedCapability(
                        "the device has no audio capabilities".into(),
                    )
                })?;
                let clamped = clamp_audio(requested, &caps);
                state.audio_format = Some(clamped);
                Ok(FormatBlock::Audio(clamped))
            }
            _ => Err(CaptureError::UnsupportedCapability(
                "the format block does not match the endpoint".into(),
            )),
        }
    }

    fn video_capabilities(&mut self, node: NodeId) -> Result<VideoCapabilities, CaptureError> {
        let inner = self.inner.lock();
        let state = inner.source(node)?;
        self.catalog
            .spec(&state.device_id)
            .and_then(|spec| spec.video.map(|v| v.caps))
            .ok_or_else(|| {
                CaptureError::UnsupportedCapability("the device has no video capabilities".into())
            })
    }

    fn audio_capabilities(&mut self, node: NodeId) -> Result<AudioCapabilities, CaptureError> {
        let inner = self.inner.lock();
        let state = inner.source(node)?;
        self.catalog
            .spec(&state.device_id)
            .and_then(|spec| spec.audio.map(|a| a.caps))
            .ok_or_else(|| {
                CaptureError::UnsupportedCapability("the device has no audio capabilities".into())
            })
    }

    fn set_sink_file(&mut self, sink: NodeId, path: &Path) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        match inner.node_mut(sink)? {
            SimNode::FileSink { path: slot } => {
                *slot = path.to_path_buf();
                Ok(())
            }
            _ => Err(CaptureError::ConnectionFailure(format!(
                "node {:?} is not a file sink",
                sink
            ))),
        }
    }

    fn physical_sources(
        &mut self,
        node: NodeId,
    ) -> Result<Vec<PhysicalSourceInfo>, CaptureError> {
        let inner = self.inner.lock();
        let state = inner.source(node)?;
        Ok(self
            .catalog
            .spec(&state.device_id)
            .map(|spec| spec.connectors)
            .unwrap_or_default())
    }

    fn route(
        &mut self,
        node: NodeId,
        output_pin: u32,
        input_pin: Option<u32>,
    ) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        let state = inner.source_mut(node)?;
        match input_pin {
            Some(input) => {
                state.routes.insert(output_pin, input);
            }
            None => {
                state.routes.remove(&output_pin);
            }
        }
        Ok(())
    }

    fn routed_input(
        &mut self,
        node: NodeId,
        output_pin: u32,
    ) -> Result<Option<u32>, CaptureError> {
        let inner = self.inner.lock();
        Ok(inner.source(node)?.routes.get(&output_pin).copied())
    }

    fn set_mixer_enabled(
        &mut self,
        node: NodeId,
        pin: u32,
        enable: bool,
    ) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        inner.source_mut(node)?.mixer.insert(pin, enable);
        Ok(())
    }

    fn mixer_enabled(&mut self, node: NodeId, pin: u32) -> Result<bool, CaptureError> {
        let inner = self.inner.lock();
        Ok(inner.source(node)?.mixer.get(&pin).copied().unwrap_or(false))
    }
}

fn format_block(state: &SourceState, pin: OutputPin) -> Result<FormatBlock, CaptureError> {
    match pin {
        OutputPin::Capture(MediaKind::Video)
        | OutputPin::Capture(MediaKind::Interleaved)
        | OutputPin::Preview(MediaKind::Video) => state
            .video_format
            .map(FormatBlock::Video)
            .ok_or_else(no_format),
        OutputPin::Capture(MediaKind::Audio) => state
            .audio_format
            .map(FormatBlock::Audio)
            .ok_or_else(no_format),
        _ => Err(no_format()),
    }
}

fn no_format() -> CaptureError {
    CaptureError::UnsupportedCapability("the endpoint carries no negotiable format".into())
}

/// Clamp into [min, max] and snap to the nearest granularity step above
/// `min`, mirroring how capture hardware quantizes requested formats.
fn snap_f64(value: f64, min: f64, max: f64, step: f64) -> f64 {
    let clamped = value.clamp(min, max);
    if step <= 0.0 {
        return clamped;
    }
    (min + ((clamped - min) / step).round() * step).clamp(min, max)
}

fn snap_u32(value: u32, min: u32, max: u32, step: u32) -> u32 {
    let clamped = value.clamp(min, max);
    if step == 0 {
        return clamped;
    }
    (min + (clamped - min + step / 2) / step * step).min(max)
}

fn snap_u16(value: u16, min: u16, max: u16, step: u16) -> u16 {
    snap_u32(value.into(), min.into(), max.into(), step.into()) as u16
}

fn clamp_video(requested: VideoFormat, caps: &VideoCapabilities) -> VideoFormat {
    VideoFormat {
        frame_rate: snap_f64(
            requested.frame_rate,
            caps.min_frame_rate,
            caps.max_frame_rate,
            caps.frame_rate_granularity,
        ),
        width: snap_u32(
            requested.width,
            caps.min_width,
            caps.max_width,
            caps.width_granularity,
        ),
        height: snap_u32(
            requested.height,
            caps.min_height,
            caps.max_height,
            caps.height_granularity,
        ),
    }
}

fn clamp_audio(requested: AudioFormat, caps: &AudioCapabilities) -> AudioFormat {
    AudioFormat::new(
        snap_u16(
            requested.channels,
            caps.minimum_channels,
            caps.maximum_channels,
            caps.channels_granularity,
        ),
        snap_u32(
            requested.sample_rate,
            caps.minimum_sampling_rate,
            caps.maximum_sampling_rate,
            caps.sampling_rate_granularity,
        ),
        snap_u16(
            requested.bits_per_sample,
            caps.minimum_sample_size,
            caps.maximum_sample_size,
            caps.sample_size_granularity,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SimDeviceSpec;

    fn video_driver() -> (SimDriver, DeviceReference) {
        let catalog = SimCatalog::new();
        let device = catalog.add(SimDeviceSpec::video("cam0", "Sim Camera"));
        (SimDriver::new(catalog), device)
    }

    #[test]
    fn busy_device_refuses_connections() {
        let (mut driver, device) = video_driver();
        driver.create_graph().unwrap();
        let source = driver.add_source(&device, MediaKind::Video).unwrap();
        let mux = driver.add_mux(ContainerFormat::Avi).unwrap();

        driver.catalog.set_in_use("cam0", true);
        let err = driver
            .connect(source, OutputPin::Capture(MediaKind::Video), mux)
            .unwrap_err();
        assert!(matches!(err, CaptureError::DeviceInUse { ref device } if device == "Sim Camera"));
        assert_eq!(driver.connection_count(), 0);

        driver.catalog.set_in_use("cam0", false);
        driver
            .connect(source, OutputPin::Capture(MediaKind::Video), mux)
            .unwrap();
    }

    #[test]
    fn interleaved_pin_requires_device_support() {
        let (mut driver, device) = video_driver();
        driver.create_graph().unwrap();
        let source = driver.add_source(&device, MediaKind::Video).unwrap();
        let mux = driver.add_mux(ContainerFormat::Avi).unwrap();

        assert!(!driver.has_output_pin(source, OutputPin::Capture(MediaKind::Interleaved)));
        let err = driver
            .connect(source, OutputPin::Capture(MediaKind::Interleaved), mux)
            .unwrap_err();
        assert!(matches!(err, CaptureError::ConnectionFailure(_)));
    }

    #[test]
    fn set_format_snaps_to_capabilities() {
        let (mut driver, device) = video_driver();
        driver.create_graph().unwrap();
        let source = driver.add_source(&device, MediaKind::Video).unwrap();
        let pin = OutputPin::Capture(MediaKind::Video);

        let accepted = driver
            .set_format(
                source,
                pin,
                FormatBlock::Video(VideoFormat {
                    frame_rate: 23.0,
                    width: 555,
                    height: 999,
                }),
            )
            .unwrap();
        assert_eq!(
            accepted,
            FormatBlock::Video(VideoFormat {
                frame_rate: 25.0,
                width: 480,
                height: 480,
            })
        );
        assert_eq!(driver.get_format(source, pin).unwrap(), accepted);
    }

    #[test]
    fn formats_locked_while_endpoint_connected() {
        let (mut driver, device) = video_driver();
        driver.create_graph().unwrap();
        let source = driver.add_source(&device, MediaKind::Video).unwrap();
        let mux = driver.add_mux(ContainerFormat::Avi).unwrap();
        let pin = OutputPin::Capture(MediaKind::Video);
        driver.connect(source, pin, mux).unwrap();

        assert!(matches!(
            driver.get_format(source, pin),
            Err(CaptureError::ConnectionFailure(_))
        ));
        driver.disconnect(source, mux).unwrap();
        assert!(driver.get_format(source, pin).is_ok());
    }

    #[test]
    fn fresh_source_node_starts_from_catalog_defaults() {
        let (mut driver, device) = video_driver();
        driver.create_graph().unwrap();
        let pin = OutputPin::Capture(MediaKind::Video);

        let source = driver.add_source(&device, MediaKind::Video).unwrap();
        driver
            .set_format(
                source,
                pin,
                FormatBlock::Video(VideoFormat {
                    frame_rate: 10.0,
                    width: 320,
                    height: 240,
                }),
            )
            .unwrap();
        driver.remove_node(source).unwrap();

        let source = driver.add_source(&device, MediaKind::Video).unwrap();
        let block = driver.get_format(source, pin).unwrap();
        assert_eq!(
            block,
            FormatBlock::Video(VideoFormat {
                frame_rate: 30.0,
                width: 640,
                height: 480,
            })
        );
    }

    #[test]
    fn remove_node_rejects_connected_or_attached_nodes() {
        let (mut driver, device) = video_driver();
        driver.create_graph().unwrap();
        let source = driver.add_source(&device, MediaKind::Video).unwrap();
        let renderer = driver.add_renderer().unwrap();
        driver
            .connect(source, OutputPin::Preview(MediaKind::Video), renderer)
            .unwrap();

        assert!(matches!(
            driver.remove_node(renderer),
            Err(CaptureError::Cleanup(_))
        ));
        driver.disconnect(source, renderer).unwrap();

        driver
            .attach_preview(renderer, &PreviewSurface::from_raw(7))
            .unwrap();
        assert!(matches!(
            driver.remove_node(renderer),
            Err(CaptureError::Cleanup(_))
        ));
        assert!(driver.preview_attached());
        driver.detach_preview(renderer);
        driver.remove_node(renderer).unwrap();
    }

    #[test]
    fn crossbar_and_mixer_state_round_trip() {
        let (mut driver, device) = video_driver();
        driver.create_graph().unwrap();
        let source = driver.add_source(&device, MediaKind::Video).unwrap();

        driver.route(source, 0, Some(2)).unwrap();
        assert_eq!(driver.routed_input(source, 0).unwrap(), Some(2));
        driver.route(source, 0, None).unwrap();
        assert_eq!(driver.routed_input(source, 0).unwrap(), None);

        assert!(!driver.mixer_enabled(source, 1).unwrap());
        driver.set_mixer_enabled(source, 1, true).unwrap();
        assert!(driver.mixer_enabled(source, 1).unwrap());
    }
}
