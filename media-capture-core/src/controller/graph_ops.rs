//! Graph creation, branch rendering, de-rendering and destruction.
//!
//! The graph moves through four states: `Null` (no graph), `Created`
//! (source and compressor nodes exist, nothing wired), `Rendered` (at
//! least one branch wired) and `Capturing` (clock running on a wired
//! capture branch). State only advances through these operations and only
//! retreats through `derender`/`destroy`.

use crate::graph::{MediaKind, NodeId, NodeRole, OutputPin};
use crate::models::error::CaptureError;
use crate::models::state::GraphState;
use crate::traits::graph_driver::GraphDriver;

use super::GraphController;

/// Nodes and connections added by one branch render, so a failure midway
/// can be unwound without leaving orphans in the graph.
#[derive(Default)]
struct RenderTracker {
    nodes: Vec<NodeId>,
    connections: Vec<(NodeId, NodeId)>,
}

impl<D: GraphDriver> GraphController<D> {
    /// Bring the graph to at least `Created`: a native graph exists and
    /// holds the selected source and compressor nodes, unconnected.
    /// Idempotent.
    pub(crate) fn ensure_created(&mut self) -> Result<(), CaptureError> {
        if self.state >= GraphState::Created {
            return Ok(());
        }

        self.driver.create_graph()?;

        if let Some(device) = self.video_device.clone() {
            let node = self.driver.add_source(&device, MediaKind::Video)?;
            self.topology.insert_node(node, NodeRole::VideoSource);
            self.video_source_node = Some(node);
        }
        if let Some(device) = self.audio_device.clone() {
            let node = self.driver.add_source(&device, MediaKind::Audio)?;
            self.topology.insert_node(node, NodeRole::AudioSource);
            self.audio_source_node = Some(node);
        }
        if let Some(device) = self.video_compressor.clone() {
            let node = self.driver.add_compressor(&device, MediaKind::Video)?;
            self.topology.insert_node(node, NodeRole::VideoCompressor);
            self.video_compressor_node = Some(node);
        }
        if let Some(device) = self.audio_compressor.clone() {
            let node = self.driver.add_compressor(&device, MediaKind::Audio)?;
            self.topology.insert_node(node, NodeRole::AudioCompressor);
            self.audio_compressor_node = Some(node);
        }

        // Resolve the endpoints format negotiation talks to. Interleaved
        // devices configure video through the interleaved pin.
        self.video_stream_config = self.video_source_node.and_then(|node| {
            let interleaved = OutputPin::Capture(MediaKind::Interleaved);
            if self.driver.has_output_pin(node, interleaved) {
                Some((node, interleaved))
            } else if self
                .driver
                .has_output_pin(node, OutputPin::Capture(MediaKind::Video))
            {
                Some((node, OutputPin::Capture(MediaKind::Video)))
            } else {
                None
            }
        });
        self.audio_stream_config = self.audio_source_node.and_then(|node| {
            let pin = OutputPin::Capture(MediaKind::Audio);
            self.driver.has_output_pin(node, pin).then_some((node, pin))
        });

        // Anything cached against the previous graph is stale now.
        self.video_caps = None;
        self.audio_caps = None;
        self.video_sources = None;
        self.audio_sources = None;

        log::debug!(
            "graph created: video={:?} audio={:?}",
            self.video_device.as_ref().map(|d| d.name.as_str()),
            self.audio_device.as_ref().map(|d| d.name.as_str()),
        );
        self.set_state(GraphState::Created);
        Ok(())
    }

    /// Wire every wanted-but-unwired branch and unwire what is no longer
    /// wanted. Leaves the clock stopped; callers decide whether to run it.
    pub(crate) fn render(&mut self) -> Result<(), CaptureError> {
        self.assert_stopped("render")?;
        self.driver.stop_clock();
        self.ensure_created()?;

        // Branches cannot be unwired individually, so an unwanted rendered
        // branch forces a full de-render first. An unwanted capture branch
        // is tolerated while no preview is wanted either; it does no harm
        // and saves a teardown.
        if (self.is_preview_rendered && !self.want_preview_rendered)
            || (self.is_capture_rendered
                && !self.want_capture_rendered
                && self.want_preview_rendered)
        {
            self.derender();
        }

        let mut rendered_something = false;
        if self.want_capture_rendered && !self.is_capture_rendered {
            self.render_capture_branch()?;
            self.is_capture_rendered = true;
            rendered_something = true;
        }
        if self.want_preview_rendered && !self.is_preview_rendered {
            self.render_preview_branch()?;
            self.is_preview_rendered = true;
            rendered_something = true;
        }

        if rendered_something {
            self.set_state(GraphState::Rendered);
        }
        Ok(())
    }

    /// Unwire both branches, release the downstream nodes and fall back to
    /// `Created`. Source and compressor nodes survive, compressors merely
    /// disconnected so their configuration is kept. Never raises.
    pub(crate) fn derender(&mut self) {
        self.driver.stop_clock();
        if let Some(renderer) = self.renderer_node {
            self.driver.detach_preview(renderer);
        }
        if self.state < GraphState::Rendered {
            return;
        }

        self.set_state(GraphState::Created);
        self.is_preview_rendered = false;
        self.is_capture_rendered = false;

        if let Some(source) = self.video_source_node {
            self.remove_downstream(source);
        }
        if let Some(source) = self.audio_source_node {
            self.remove_downstream(source);
        }

        self.mux_node = None;
        self.file_sink_node = None;
        self.renderer_node = None;
        self.tap_node = None;
        self.tap.disarm();
    }

    /// Release the whole graph and fall back to `Null`. Never raises;
    /// cleanup failures are logged and swallowed.
    pub(crate) fn destroy(&mut self) {
        self.derender();
        self.set_state(GraphState::Null);

        for node in self.topology.node_ids() {
            if let Err(err) = self.driver.remove_node(node) {
                log::warn!("releasing node {:?} failed: {err}", node);
            }
            if let Err(err) = self.topology.remove_node(node) {
                log::warn!("{err}");
            }
        }
        self.driver.destroy_graph();
        self.topology.clear();

        self.video_source_node = None;
        self.audio_source_node = None;
        self.video_compressor_node = None;
        self.audio_compressor_node = None;
        self.video_stream_config = None;
        self.audio_stream_config = None;
        self.video_caps = None;
        self.audio_caps = None;
        self.video_sources = None;
        self.audio_sources = None;
    }

    /// Run the clock for a live preview, but only when the preview branch
    /// alone is wired; a wired capture branch keeps the clock stopped (or
    /// paused, when cued) until `start`.
    pub(crate) fn start_preview_if_needed(&mut self) {
        if self.want_preview_rendered && self.is_preview_rendered && !self.is_capture_rendered {
            if let Err(err) = self.driver.run() {
                log::warn!("starting the preview clock failed: {err}");
            }
        }
    }

    // --- Branch renderers ---

    /// source -> [compressor] -> mux -> file sink, for each selected
    /// device. Failure unwinds every node and connection this call added.
    fn render_capture_branch(&mut self) -> Result<(), CaptureError> {
        let mut tracker = RenderTracker::default();
        match self.try_render_capture(&mut tracker) {
            Ok(()) => {
                log::debug!("capture branch rendered to {}", self.filename.display());
                Ok(())
            }
            Err(err) => {
                self.rollback(tracker);
                Err(err)
            }
        }
    }

    fn try_render_capture(&mut self, tracker: &mut RenderTracker) -> Result<(), CaptureError> {
        let mux = self.add_tracked(tracker, NodeRole::Mux, |c| {
            c.driver.add_mux(c.container)
        })?;
        self.mux_node = Some(mux);

        let sink = self.add_tracked(tracker, NodeRole::FileSink, |c| {
            let path = c.filename.clone();
            c.driver.add_file_sink(&path)
        })?;
        self.file_sink_node = Some(sink);
        self.connect_tracked(tracker, mux, OutputPin::Out, sink)?;

        if let Some(source) = self.video_source_node {
            let dest = self.video_compressor_node.unwrap_or(mux);
            self.connect_video_capture(tracker, source, dest)?;
            if let Some(compressor) = self.video_compressor_node {
                self.connect_tracked(tracker, compressor, OutputPin::Out, mux)?;
            }
        }
        if let Some(source) = self.audio_source_node {
            let dest = self.audio_compressor_node.unwrap_or(mux);
            self.connect_tracked(tracker, source, OutputPin::Capture(MediaKind::Audio), dest)?;
            if let Some(compressor) = self.audio_compressor_node {
                self.connect_tracked(tracker, compressor, OutputPin::Out, mux)?;
            }
        }
        Ok(())
    }

    /// Connect the video capture output, preferring the interleaved pin.
    /// A busy device aborts immediately; any other failure retries on the
    /// plain video pin.
    fn connect_video_capture(
        &mut self,
        tracker: &mut RenderTracker,
        source: NodeId,
        dest: NodeId,
    ) -> Result<(), CaptureError> {
        match self.connect_tracked(
            tracker,
            source,
            OutputPin::Capture(MediaKind::Interleaved),
            dest,
        ) {
            Ok(()) => Ok(()),
            Err(err @ CaptureError::DeviceInUse { .. }) => Err(err),
            Err(err) => {
                log::debug!("interleaved connect failed ({err}), retrying on the video pin");
                self.connect_tracked(tracker, source, OutputPin::Capture(MediaKind::Video), dest)
            }
        }
    }

    /// source -> [tap] -> renderer, attached to the preview surface.
    fn render_preview_branch(&mut self) -> Result<(), CaptureError> {
        let mut tracker = RenderTracker::default();
        match self.try_render_preview(&mut tracker) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.rollback(tracker);
                Err(err)
            }
        }
    }

    fn try_render_preview(&mut self, tracker: &mut RenderTracker) -> Result<(), CaptureError> {
        let source = self.video_source_node.ok_or_else(|| {
            CaptureError::UnsupportedCapability(
                "preview requires a video device".into(),
            )
        })?;

        let renderer =
            self.add_tracked(tracker, NodeRole::Renderer, |c| c.driver.add_renderer())?;
        self.renderer_node = Some(renderer);

        if self.allow_sample_tap {
            let tap =
                self.add_tracked(tracker, NodeRole::SampleTap, |c| c.driver.add_sample_tap())?;
            self.driver.set_tap_sink(tap, self.tap.sink())?;
            self.connect_tracked(tracker, source, OutputPin::Preview(MediaKind::Video), tap)?;
            self.connect_tracked(tracker, tap, OutputPin::Out, renderer)?;
            self.tap_node = Some(tap);
        } else {
            self.connect_tracked(
                tracker,
                source,
                OutputPin::Preview(MediaKind::Video),
                renderer,
            )?;
        }

        if let Some(surface) = self.preview_surface.clone() {
            self.driver.attach_preview(renderer, &surface)?;
        }
        Ok(())
    }

    fn add_tracked(
        &mut self,
        tracker: &mut RenderTracker,
        role: NodeRole,
        add: impl FnOnce(&mut Self) -> Result<NodeId, CaptureError>,
    ) -> Result<NodeId, CaptureError> {
        let node = add(self)?;
        self.topology.insert_node(node, role);
        tracker.nodes.push(node);
        Ok(node)
    }

    fn connect_tracked(
        &mut self,
        tracker: &mut RenderTracker,
        from: NodeId,
        pin: OutputPin,
        to: NodeId,
    ) -> Result<(), CaptureError> {
        self.driver.connect(from, pin, to)?;
        self.topology.connect(from, pin, to)?;
        tracker.connections.push((from, to));
        Ok(())
    }

    /// Unwind a failed branch render: drop the added connections in
    /// reverse, then the added nodes, and clear any handle pointing at
    /// them. Unwind failures are logged; the unwind keeps going.
    fn rollback(&mut self, tracker: RenderTracker) {
        for &(from, to) in tracker.connections.iter().rev() {
            if let Err(err) = self.driver.disconnect(from, to) {
                log::warn!("rollback disconnect {:?} -> {:?} failed: {err}", from, to);
            }
            self.topology.disconnect(from, to);
        }
        for &node in tracker.nodes.iter().rev() {
            if let Err(err) = self.driver.remove_node(node) {
                log::warn!("rollback removal of {:?} failed: {err}", node);
            }
            if let Err(err) = self.topology.remove_node(node) {
                log::warn!("{err}");
            }
            for handle in [
                &mut self.mux_node,
                &mut self.file_sink_node,
                &mut self.renderer_node,
                &mut self.tap_node,
            ] {
                if *handle == Some(node) {
                    *handle = None;
                }
            }
        }
    }

    /// Disconnect and remove everything downstream of `node`, depth first.
    /// Compressors are disconnected but kept. A node shared by several
    /// paths (the mux, fed by both streams) loses all of its connections
    /// before removal and is skipped when a later path reaches it again.
    fn remove_downstream(&mut self, node: NodeId) {
        for conn in self.topology.downstream(node) {
            if let Err(err) = self.driver.disconnect(conn.from, conn.to) {
                log::warn!("disconnect {:?} -> {:?} failed: {err}", conn.from, conn.to);
            }
            self.topology.disconnect(conn.from, conn.to);

            self.remove_downstream(conn.to);

            let keep = self
                .topology
                .role(conn.to)
                .map_or(true, NodeRole::is_compressor);
            if keep {
                continue;
            }
            for other in self.topology.connections_of(conn.to) {
                if let Err(err) = self.driver.disconnect(other.from, other.to) {
                    log::warn!(
                        "disconnect {:?} -> {:?} failed: {err}",
                        other.from,
                        other.to
                    );
                }
                self.topology.disconnect(other.from, other.to);
            }
            if let Err(err) = self.driver.remove_node(conn.to) {
                log::warn!("releasing node {:?} failed: {err}", conn.to);
            }
            if let Err(err) = self.topology.remove_node(conn.to) {
                log::warn!("{err}");
            }
        }
    }
}
