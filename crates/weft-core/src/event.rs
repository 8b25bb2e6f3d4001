//! Lifecycle events exchanged between nodes
//!
//! Events travel beside the signal graph: spawning, death, redraw-set
//! membership and damage are announced here rather than through signals.
//! The payload is a closed set of kinds, each with a statically typed body.

use crate::behaviour::Task;
use crate::error::{Error, Result};
use crate::identity::NodeId;
use crate::time::{now, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How an event is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Delivery {
    /// Meant for every sink that can see it
    Broadcast,
    /// Meant for one specific recipient
    Targeted,
}

/// Discriminant of [`Payload`], useful for filtering and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    NodeCreated,
    Death,
    ForgetAll,
    AddDrawable,
    RemoveDrawable,
    Damage,
    SpawnRequest,
}

/// Parameters for an entity spawn request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnParams {
    /// Where the entity appears
    pub position: [f32; 2],
    /// Route the entity should follow, in order
    pub waypoints: Vec<[f32; 2]>,
}

impl SpawnParams {
    pub fn new(position: [f32; 2]) -> Self {
        Self {
            position,
            waypoints: Vec::new(),
        }
    }

    pub fn with_waypoint(mut self, point: [f32; 2]) -> Self {
        self.waypoints.push(point);
        self
    }
}

/// The body of an event
#[derive(Debug, Clone)]
pub enum Payload {
    /// A freshly built node that should be registered with a scheduler
    NodeCreated(Spawned),
    /// The source node has died; drop any reference to it
    Death,
    /// Drop every reference held on behalf of the source
    ForgetAll,
    /// Add the node to the redraw set
    AddDrawable(NodeId),
    /// Remove the node from the redraw set
    RemoveDrawable(NodeId),
    /// Apply damage
    Damage(f32),
    /// Ask a factory to spawn an entity
    SpawnRequest(SpawnParams),
}

impl Payload {
    /// Which kind of payload this is
    pub fn kind(&self) -> EventKind {
        match self {
            Payload::NodeCreated(_) => EventKind::NodeCreated,
            Payload::Death => EventKind::Death,
            Payload::ForgetAll => EventKind::ForgetAll,
            Payload::AddDrawable(_) => EventKind::AddDrawable,
            Payload::RemoveDrawable(_) => EventKind::RemoveDrawable,
            Payload::Damage(_) => EventKind::Damage,
            Payload::SpawnRequest(_) => EventKind::SpawnRequest,
        }
    }
}

/// One-shot slot carrying a newly created task to whoever registers it
///
/// Events are cloned during fan-out, so several sinks may see the same
/// `Spawned`; only the first [`take`](Spawned::take) gets the task.
#[derive(Clone)]
pub struct Spawned {
    id: NodeId,
    name: String,
    slot: Arc<Mutex<Option<Box<dyn Task>>>>,
}

impl Spawned {
    pub fn new(task: Box<dyn Task>) -> Self {
        Self {
            id: task.id(),
            name: task.name().to_string(),
            slot: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Id of the carried node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Name of the carried node
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Claim the task; fails if another consumer already did
    pub fn take(&self) -> Result<Box<dyn Task>> {
        self.slot.lock().take().ok_or(Error::SlotTaken)
    }

    /// Whether the task is still unclaimed
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl fmt::Debug for Spawned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawned")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// An immutable lifecycle event
#[derive(Debug, Clone)]
pub struct Event {
    source: NodeId,
    payload: Payload,
    delivery: Delivery,
    timestamp: Timestamp,
}

impl Event {
    /// Create an event with an explicit timestamp
    pub fn new(source: NodeId, payload: Payload, delivery: Delivery, timestamp: Timestamp) -> Self {
        Self {
            source,
            payload,
            delivery,
            timestamp,
        }
    }

    /// Create a broadcast event stamped now
    pub fn broadcast(source: NodeId, payload: Payload) -> Self {
        Self::new(source, payload, Delivery::Broadcast, now())
    }

    /// Create a targeted event stamped now
    pub fn targeted(source: NodeId, payload: Payload) -> Self {
        Self::new(source, payload, Delivery::Targeted, now())
    }

    /// Announce a new node so a scheduler sink can register it
    pub fn node_created(source: NodeId, task: Box<dyn Task>) -> Self {
        Self::targeted(source, Payload::NodeCreated(Spawned::new(task)))
    }

    /// Broadcast the death of `source`
    pub fn death(source: NodeId) -> Self {
        Self::broadcast(source, Payload::Death)
    }

    /// Send damage to a node
    pub fn damage(source: NodeId, amount: f32) -> Self {
        Self::targeted(source, Payload::Damage(amount))
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }
}
