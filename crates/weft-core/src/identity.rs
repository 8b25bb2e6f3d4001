//! Identity types for nodes and sinks

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE: AtomicU64 = AtomicU64::new(1);
static NEXT_SINK: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a node (behaviour, stream, driver) at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Reserved id for events published by the embedding application
    pub const EXTERNAL: NodeId = NodeId(0);

    /// Create a node ID from a raw value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocate a fresh process-unique node ID
    pub fn next() -> Self {
        Self(NEXT_NODE.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Check if this is the external (driver) id
    pub fn is_external(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_external() {
            write!(f, "node:external")
        } else {
            write!(f, "node:{}", self.0)
        }
    }
}

/// Registration token returned by [`Source::add_sink`](crate::Source::add_sink)
///
/// Removing a sink requires the token it was registered under, so the same
/// sink may be registered on several streams independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

impl SinkId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SINK.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(format!("{}", id), "node:42");
        assert_eq!(format!("{}", NodeId::EXTERNAL), "node:external");
    }

    #[test]
    fn test_node_ids_are_unique() {
        let a = NodeId::next();
        let b = NodeId::next();
        assert_ne!(a, b);
        assert!(!a.is_external());
    }

    #[test]
    fn test_sink_ids_are_unique() {
        assert_ne!(SinkId::next(), SinkId::next());
    }
}
