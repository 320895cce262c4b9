//! Core-side bookkeeping of the live pipeline graph.
//!
//! The driver owns the native resources; `Topology` tracks which nodes and
//! connections currently exist so the controller can de-render recursively,
//! roll back failed branch renders, and uphold the structural invariants
//! (a connection only ever references present nodes, and a node is removed
//! only after all of its connections are gone).

pub mod topology;

pub use topology::{Connection, Topology};

/// Opaque handle to one pipeline node, issued by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// What a node is, within the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    VideoSource,
    AudioSource,
    VideoCompressor,
    AudioCompressor,
    Mux,
    FileSink,
    Renderer,
    SampleTap,
}

impl NodeRole {
    /// Compressors survive de-rendering (disconnected but kept) so their
    /// device-specific configuration is not lost.
    pub fn is_compressor(self) -> bool {
        matches!(self, Self::VideoCompressor | Self::AudioCompressor)
    }
}

/// Media carried over a connection, used to pick a connection strategy:
/// interleaved carries audio and video in one stream and is tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Interleaved,
    Video,
    Audio,
}

/// Addressable output endpoint of a node. Source devices expose categorized
/// capture and preview outputs; every other node has one plain output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPin {
    Capture(MediaKind),
    Preview(MediaKind),
    Out,
}
