use std::collections::BTreeMap;

use super::{NodeId, NodeRole, OutputPin};
use crate::models::error::CaptureError;

/// One directed link between two node endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub from: NodeId,
    pub pin: OutputPin,
    pub to: NodeId,
}

/// Mirror of the nodes and connections currently alive in the driver graph.
#[derive(Debug, Default)]
pub struct Topology {
    nodes: BTreeMap<NodeId, NodeRole>,
    connections: Vec<Connection>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, id: NodeId, role: NodeRole) {
        self.nodes.insert(id, role);
    }

    pub fn role(&self, id: NodeId) -> Option<NodeRole> {
        self.nodes.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Record a connection. Both endpoints must already be present.
    pub fn connect(&mut self, from: NodeId, pin: OutputPin, to: NodeId) -> Result<(), CaptureError> {
        if !self.contains(from) || !self.contains(to) {
            return Err(CaptureError::ConnectionFailure(
                "connection references a node that is not in the graph".into(),
            ));
        }
        self.connections.push(Connection { from, pin, to });
        Ok(())
    }

    /// Drop the connection between two nodes, if one exists.
    pub fn disconnect(&mut self, from: NodeId, to: NodeId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| !(c.from == from && c.to == to));
        self.connections.len() != before
    }

    /// Remove a node. All of its connections must have been removed first.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), CaptureError> {
        if self.connections.iter().any(|c| c.from == id || c.to == id) {
            return Err(CaptureError::Cleanup(format!(
                "node {:?} still has connections",
                id
            )));
        }
        self.nodes.remove(&id);
        Ok(())
    }

    /// Connections leaving `id`, in insertion order.
    pub fn downstream(&self, id: NodeId) -> Vec<Connection> {
        self.connections.iter().filter(|c| c.from == id).copied().collect()
    }

    /// Every connection touching `id`, in either direction.
    pub fn connections_of(&self, id: NodeId) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|c| c.from == id || c.to == id)
            .copied()
            .collect()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MediaKind;

    fn n(raw: u64) -> NodeId {
        NodeId::from_raw(raw)
    }

    #[test]
    fn connect_requires_both_nodes() {
        let mut t = Topology::new();
        t.insert_node(n(1), NodeRole::VideoSource);
        assert!(t.connect(n(1), OutputPin::Out, n(2)).is_err());

        t.insert_node(n(2), NodeRole::Mux);
        assert!(t
            .connect(n(1), OutputPin::Capture(MediaKind::Video), n(2))
            .is_ok());
        assert_eq!(t.connection_count(), 1);
    }

    #[test]
    fn remove_node_rejects_connected_node() {
        let mut t = Topology::new();
        t.insert_node(n(1), NodeRole::VideoSource);
        t.insert_node(n(2), NodeRole::Renderer);
        t.connect(n(1), OutputPin::Preview(MediaKind::Video), n(2))
            .unwrap();

        assert!(t.remove_node(n(2)).is_err());
        assert!(t.disconnect(n(1), n(2)));
        assert!(t.remove_node(n(2)).is_ok());
        assert!(!t.contains(n(2)));
    }

    #[test]
    fn downstream_only_follows_outgoing_edges() {
        let mut t = Topology::new();
        t.insert_node(n(1), NodeRole::VideoSource);
        t.insert_node(n(2), NodeRole::VideoCompressor);
        t.insert_node(n(3), NodeRole::Mux);
        t.connect(n(1), OutputPin::Capture(MediaKind::Video), n(2))
            .unwrap();
        t.connect(n(2), OutputPin::Out, n(3)).unwrap();

        assert_eq!(t.downstream(n(2)).len(), 1);
        assert_eq!(t.downstream(n(3)).len(), 0);
        assert_eq!(t.connections_of(n(2)).len(), 2);
    }
}
