//! The recurring-task contract and the standard behaviour node
//!
//! A [`Task`] is anything a scheduler can run: it has an identity, a readiness
//! test, and a run-to-completion step that says whether it wants another
//! generation. [`Behaviour`] is the standard node built from parts rather
//! than subclassing:
//!
//! - an owned output [`Signal`] (the only write handle for it)
//! - upstream dependencies, type-erased as [`Upstream`]
//! - an inbound [`Mailbox`] drained at the start of every run
//! - a [`Readiness`] policy and staleness tolerance
//! - a step closure holding the node's actual logic
//!
//! ```
//! use weft_core::{Behaviour, Continuation, Signal, Task};
//!
//! let source = Signal::with_timestamp(3i64, 1_000);
//! let input = source.reader();
//!
//! let mut doubler = Behaviour::builder("doubler", Signal::with_timestamp(0i64, 1_000))
//!     .depends_on(input.clone())
//!     .step(move |step| {
//!         step.write(input.read() * 2);
//!         Ok(Continuation::Continue)
//!     });
//!
//! assert!(doubler.is_ready());
//! assert_eq!(doubler.run().unwrap(), Continuation::Continue);
//! assert_eq!(doubler.reader().read(), 6);
//! ```

use crate::error::Result;
use crate::event::{Event, Payload};
use crate::identity::NodeId;
use crate::mailbox::Mailbox;
use crate::signal::{Signal, SignalReader, Upstream};
use crate::stream::Sink;
use crate::time::{Timestamp, DEFAULT_DELTA_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What a task wants after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Continuation {
    /// Resubmit for another generation
    Continue,
    /// Never run again
    Terminate,
}

impl Continuation {
    pub fn is_continue(&self) -> bool {
        matches!(self, Continuation::Continue)
    }
}

impl From<bool> for Continuation {
    fn from(keep_going: bool) -> Self {
        if keep_going {
            Continuation::Continue
        } else {
            Continuation::Terminate
        }
    }
}

/// A unit of recurring work a scheduler can execute
pub trait Task: Send {
    /// Node identity
    fn id(&self) -> NodeId;

    /// Human-readable name, used to group telemetry
    fn name(&self) -> &str;

    /// Whether running now would respect the task's dependencies
    fn is_ready(&self) -> bool;

    /// Run one generation to completion
    fn run(&mut self) -> Result<Continuation>;
}

/// Owned, type-erased task
pub type TaskBox = Box<dyn Task>;

/// How a behaviour decides it may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Readiness {
    /// Not ahead of any dependency by more than the tolerance
    #[default]
    Staleness,
    /// At least one event is waiting in the mailbox
    PendingEvents,
    /// `Staleness`, or any event waiting; lifecycle events such as a death
    /// notice are then never held back by an upstream that stopped updating
    StalenessOrEvents,
    /// Always runnable
    Always,
}

type StepFn<T> = Box<dyn FnMut(&mut Step<'_, T>) -> Result<Continuation> + Send>;

/// What a behaviour's step closure gets to work with during one run
pub struct Step<'a, T> {
    id: NodeId,
    name: &'a str,
    output: &'a mut Signal<T>,
    events: Vec<Event>,
}

impl<'a, T: Clone> Step<'a, T> {
    /// Id of the running node
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Events drained from the mailbox at the start of this run
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take ownership of the drained events
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Current value of this node's own output
    pub fn current(&self) -> T {
        self.output.read()
    }

    /// Timestamp of this node's own output
    pub fn timestamp(&self) -> Timestamp {
        self.output.timestamp()
    }

    /// Publish a new output stamped now
    pub fn write(&mut self, value: T) {
        self.output.write(value);
    }

    /// Publish a new output with an explicit timestamp
    pub fn write_at(&mut self, value: T, timestamp: Timestamp) {
        self.output.write_at(value, timestamp);
    }

    /// Send an event originating from this node
    pub fn emit(&self, sink: &dyn Sink, event: Event) {
        sink.handle_event(event);
    }

    /// Broadcast this node's death; call before returning `Terminate` when
    /// other nodes hold references to it
    pub fn announce_death(&self, sink: &dyn Sink) {
        sink.handle_event(Event::broadcast(self.id, Payload::Death));
    }
}

/// The standard recurring computation node
pub struct Behaviour<T> {
    id: NodeId,
    name: String,
    output: Signal<T>,
    dependencies: Vec<Arc<dyn Upstream>>,
    mailbox: Mailbox,
    delta_threshold: u64,
    readiness: Readiness,
    step: StepFn<T>,
}

impl<T: Clone + Send + Sync + 'static> Behaviour<T> {
    /// Start building a behaviour that owns `output`
    pub fn builder(name: impl Into<String>, output: Signal<T>) -> BehaviourBuilder<T> {
        BehaviourBuilder {
            id: None,
            name: name.into(),
            output,
            dependencies: Vec::new(),
            delta_threshold: DEFAULT_DELTA_THRESHOLD,
            readiness: Readiness::default(),
        }
    }

    /// Read-only view of this node's output
    pub fn reader(&self) -> SignalReader<T> {
        self.output.reader()
    }

    /// Sink that appends into this node's mailbox
    pub fn mailbox_sink(&self) -> Arc<dyn Sink> {
        Arc::new(self.mailbox.sink())
    }

    /// Number of events waiting for the next run
    pub fn pending_events(&self) -> usize {
        self.mailbox.len()
    }

    pub fn delta_threshold(&self) -> u64 {
        self.delta_threshold
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Staleness test against the declared dependencies
    ///
    /// Blocks only when this node has run ahead of an upstream by more than
    /// the tolerance; an upstream newer than this node is always fine.
    fn within_tolerance(&self) -> bool {
        let own = self.output.timestamp();
        self.dependencies
            .iter()
            .all(|dep| own.saturating_sub(dep.timestamp()) <= self.delta_threshold)
    }
}

impl<T: Clone + Send + Sync + 'static> Task for Behaviour<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        match self.readiness {
            Readiness::Staleness => self.within_tolerance(),
            Readiness::PendingEvents => !self.mailbox.is_empty(),
            Readiness::StalenessOrEvents => {
                !self.mailbox.is_empty() || self.within_tolerance()
            }
            Readiness::Always => true,
        }
    }

    fn run(&mut self) -> Result<Continuation> {
        let events = self.mailbox.drain();
        let Self {
            id,
            name,
            output,
            step,
            ..
        } = self;
        let mut ctx = Step {
            id: *id,
            name: name.as_str(),
            output,
            events,
        };
        step(&mut ctx)
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Behaviour<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behaviour")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("output", &self.output)
            .field("dependencies", &self.dependencies.len())
            .field("delta_threshold", &self.delta_threshold)
            .field("readiness", &self.readiness)
            .finish()
    }
}

/// Builder for [`Behaviour`]; finished by supplying the step closure
pub struct BehaviourBuilder<T> {
    id: Option<NodeId>,
    name: String,
    output: Signal<T>,
    dependencies: Vec<Arc<dyn Upstream>>,
    delta_threshold: u64,
    readiness: Readiness,
}

impl<T: Clone + Send + Sync + 'static> BehaviourBuilder<T> {
    /// Use a specific id instead of allocating one
    pub fn id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    /// Declare an upstream dependency
    pub fn depends_on(mut self, upstream: impl Upstream + 'static) -> Self {
        self.dependencies.push(Arc::new(upstream));
        self
    }

    /// Staleness tolerance in nanoseconds
    pub fn delta_threshold(mut self, nanos: u64) -> Self {
        self.delta_threshold = nanos;
        self
    }

    pub fn readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    /// Supply the node's logic and finish
    pub fn step<F>(self, step: F) -> Behaviour<T>
    where
        F: FnMut(&mut Step<'_, T>) -> Result<Continuation> + Send + 'static,
    {
        Behaviour {
            id: self.id.unwrap_or_else(NodeId::next),
            name: self.name,
            output: self.output,
            dependencies: self.dependencies,
            mailbox: Mailbox::new(),
            delta_threshold: self.delta_threshold,
            readiness: self.readiness,
            step: Box::new(step),
        }
    }
}
