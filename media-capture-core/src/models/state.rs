/// Lifecycle stage of the capture graph.
///
/// Transitions are monotonically increasing except for explicit teardown:
/// ```text
/// Null → Created → Rendered → Capturing
///   ↑        ↑         ↓          ↓
///   └────────┴── derender/destroy/stop
/// ```
/// The ordering of the variants is meaningful: `state >= Created` means the
/// graph and its device nodes exist, `state >= Rendered` means at least one
/// branch is fully connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GraphState {
    /// No graph exists at all.
    Null,
    /// Graph created and device/compressor nodes added, nothing connected.
    Created,
    /// At least one branch fully connected; stopped or merely previewing.
    Rendered,
    /// The capture branch is connected and the pipeline clock is running.
    Capturing,
}

impl GraphState {
    pub fn is_capturing(self) -> bool {
        matches!(self, Self::Capturing)
    }

    /// Stopped means "not capturing"; a previewing graph is still stopped.
    pub fn is_stopped(self) -> bool {
        !self.is_capturing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_order_follows_lifecycle() {
        assert!(GraphState::Null < GraphState::Created);
        assert!(GraphState::Created < GraphState::Rendered);
        assert!(GraphState::Rendered < GraphState::Capturing);
    }

    #[test]
    fn stopped_is_everything_but_capturing() {
        assert!(GraphState::Null.is_stopped());
        assert!(GraphState::Created.is_stopped());
        assert!(GraphState::Rendered.is_stopped());
        assert!(!GraphState::Capturing.is_stopped());
    }
}
