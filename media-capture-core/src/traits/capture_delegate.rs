use crate::models::state::GraphState;

/// Event delegate for graph lifecycle notifications.
///
/// Methods are called synchronously from the control thread; marshal to a
/// UI thread if needed.
pub trait CaptureDelegate: Send + Sync {
    /// Called whenever the graph state changes.
    fn on_state_changed(&self, state: GraphState);

    /// Called exactly once per capture session when a capture stops,
    /// manually or automatically. Not fired on `dispose`.
    fn on_capture_complete(&self);
}
