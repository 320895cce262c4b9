use std::path::Path;

use crate::graph::{MediaKind, NodeId, OutputPin};
use crate::models::capabilities::{AudioCapabilities, VideoCapabilities};
use crate::models::device::{DeviceReference, PreviewSurface};
use crate::models::error::CaptureError;
use crate::models::format::{ContainerFormat, FormatBlock, VideoFormat};
use crate::routing::PhysicalSourceInfo;
use crate::tap::TapSink;

/// Interface to the native pipeline backend.
///
/// The controller owns a driver and issues synchronous primitive operations
/// against it: node creation/removal, endpoint wiring, clock control,
/// format negotiation and connector routing. Node handles are only valid
/// between `create_graph` and `destroy_graph`.
///
/// Error contract:
/// - `connect` from a source capture pin of a device another session holds
///   fails with `DeviceInUse` (mapping the platform-specific busy code is
///   the driver's job);
/// - `connect` with a media kind the device cannot produce fails with
///   `ConnectionFailure`, which the branch renderer uses to fall back from
///   an interleaved to a split audio/video strategy;
/// - `get_format`/`set_format` fail with `ConnectionFailure` while the
///   endpoint is connected — callers de-render first;
/// - a failed `connect` must leave nothing behind in the native graph.
pub trait GraphDriver: Send {
    fn create_graph(&mut self) -> Result<(), CaptureError>;

    /// Tear down the native graph and every remaining resource. Idempotent
    /// and infallible; called on teardown paths that must not raise.
    fn destroy_graph(&mut self);

    // --- Node lifetime ---

    fn add_source(
        &mut self,
        device: &DeviceReference,
        kind: MediaKind,
    ) -> Result<NodeId, CaptureError>;

    fn add_compressor(
        &mut self,
        device: &DeviceReference,
        kind: MediaKind,
    ) -> Result<NodeId, CaptureError>;

    fn add_mux(&mut self, container: ContainerFormat) -> Result<NodeId, CaptureError>;

    fn add_file_sink(&mut self, path: &Path) -> Result<NodeId, CaptureError>;

    fn add_renderer(&mut self) -> Result<NodeId, CaptureError>;

    fn add_sample_tap(&mut self) -> Result<NodeId, CaptureError>;

    /// Remove a node whose connections are already gone.
    fn remove_node(&mut self, node: NodeId) -> Result<(), CaptureError>;

    // --- Wiring ---

    /// Whether `node` exposes the given output pin at all (used to resolve
    /// stream-configuration endpoints without attempting a connection).
    fn has_output_pin(&self, node: NodeId, pin: OutputPin) -> bool;

    fn connect(&mut self, from: NodeId, pin: OutputPin, to: NodeId) -> Result<(), CaptureError>;

    fn disconnect(&mut self, from: NodeId, to: NodeId) -> Result<(), CaptureError>;

    // --- Pipeline clock ---

    fn run(&mut self) -> Result<(), CaptureError>;

    fn pause(&mut self) -> Result<(), CaptureError>;

    /// Stop the pipeline clock. Safe in every state, infallible.
    fn stop_clock(&mut self);

    // --- Preview ---

    fn attach_preview(
        &mut self,
        renderer: NodeId,
        surface: &PreviewSurface,
    ) -> Result<(), CaptureError>;

    /// Release the borrowed preview surface. Infallible; a no-op when the
    /// renderer is not attached.
    fn detach_preview(&mut self, renderer: NodeId);

    fn set_tap_sink(&mut self, tap: NodeId, sink: TapSink) -> Result<(), CaptureError>;

    /// The video format currently negotiated on the connection feeding
    /// `node`, used to size the tap scratch buffer.
    fn connected_video_format(&self, node: NodeId) -> Result<VideoFormat, CaptureError>;

    // --- Format negotiation ---

    fn get_format(&mut self, node: NodeId, pin: OutputPin) -> Result<FormatBlock, CaptureError>;

    /// Commit a format block. Drivers may clamp fields to the nearest
    /// supported values; the block actually accepted is returned.
    fn set_format(
        &mut self,
        node: NodeId,
        pin: OutputPin,
        block: FormatBlock,
    ) -> Result<FormatBlock, CaptureError>;

    fn video_capabilities(&mut self, node: NodeId) -> Result<VideoCapabilities, CaptureError>;

    fn audio_capabilities(&mut self, node: NodeId) -> Result<AudioCapabilities, CaptureError>;

    // --- File sink ---

    fn set_sink_file(&mut self, sink: NodeId, path: &Path) -> Result<(), CaptureError>;

    // --- Connector routing ---

    fn physical_sources(
        &mut self,
        node: NodeId,
    ) -> Result<Vec<PhysicalSourceInfo>, CaptureError>;

    /// Route `input_pin` to `output_pin` on a crossbar device, or un-route
    /// the output when `input_pin` is `None`.
    fn route(
        &mut self,
        node: NodeId,
        output_pin: u32,
        input_pin: Option<u32>,
    ) -> Result<(), CaptureError>;

    fn routed_input(&mut self, node: NodeId, output_pin: u32)
        -> Result<Option<u32>, CaptureError>;

    fn set_mixer_enabled(
        &mut self,
        node: NodeId,
        pin: u32,
        enable: bool,
    ) -> Result<(), CaptureError>;

    fn mixer_enabled(&mut self, node: NodeId, pin: u32) -> Result<bool, CaptureError>;
}
