//! # media-capture-core
//!
//! Platform-agnostic audio/video capture pipeline orchestration.
//!
//! Builds and drives a capture graph over selected video and audio devices:
//! a capture branch (source → optional compressor → mux → file sink), a
//! preview branch (source → optional sample tap → renderer), format
//! negotiation, and physical-connector routing. Platform backends implement
//! the `GraphDriver` trait and plug into the generic `GraphController`.
//!
//! ## Architecture
//!
//! ```text
//! media-capture-core (this crate)
//! ├── traits/       ← GraphDriver, CaptureDelegate
//! ├── models/       ← CaptureError, GraphState, DeviceReference, formats, capabilities
//! ├── graph/        ← NodeId, NodeRole, OutputPin, Topology bookkeeping
//! ├── controller/   ← GraphController (generic lifecycle orchestrator)
//! ├── routing.rs    ← crossbar / mixer physical-source selection
//! └── tap.rs        ← single-frame sample tap
//! ```

pub mod controller;
pub mod graph;
pub mod models;
pub mod routing;
pub mod tap;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use controller::{GraphController, GraphDiagnostics, StreamTarget};
pub use graph::{Connection, MediaKind, NodeId, NodeRole, OutputPin, Topology};
pub use models::capabilities::{AudioCapabilities, VideoCapabilities};
pub use models::device::{DeviceReference, PreviewSurface};
pub use models::error::CaptureError;
pub use models::format::{
    AudioFormat, ContainerFormat, FormatBlock, FormatField, FormatValue, VideoFormat,
};
pub use models::state::GraphState;
pub use routing::{ConnectorKind, PhysicalSourceInfo, RelatedPins, SourceCollection};
pub use tap::{FrameCallback, SampleTap, TapSink};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::graph_driver::GraphDriver;
