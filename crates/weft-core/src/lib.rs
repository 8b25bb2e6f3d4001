//! Weft Core - Signals, events and the behaviour contract
//!
//! This crate provides the building blocks of the weft dataflow engine:
//! - Timestamped value cells (`Signal`, `SignalReader`)
//! - Lifecycle events and pub/sub plumbing (`Event`, `Sink`, `Source`, `Stream`)
//! - Per-node mailboxes (`Mailbox`)
//! - The recurring-task contract (`Task`) and the standard node (`Behaviour`)
//! - Write-only telemetry hooks (`TelemetrySink`)
//!
//! ## Dataflow vs. events
//!
//! Values flow along signals: every behaviour owns exactly one output signal
//! and reads the outputs of its dependencies. Lifecycle traffic (spawning,
//! death, damage, redraw membership) flows through streams into mailboxes and
//! is handled at the start of the recipient's next run.
//!
//! weft-core knows nothing about threads or scheduling; see `weft-hub` for the
//! worker pool that executes tasks.

pub mod behaviour;
mod error;
mod event;
mod identity;
mod mailbox;
pub mod signal;
mod stream;
pub mod telemetry;
pub mod time;

pub use behaviour::{Behaviour, BehaviourBuilder, Continuation, Readiness, Step, Task, TaskBox};
pub use error::{Error, Result};
pub use event::{Delivery, Event, EventKind, Payload, SpawnParams, Spawned};
pub use identity::{NodeId, SinkId};
pub use mailbox::{Mailbox, MailboxSink};
pub use signal::{Signal, SignalReader, Stamped, Upstream};
pub use stream::{Sink, Source, Stream};
pub use telemetry::{Counter, NoopTelemetry, TaskSample, TelemetrySink};
pub use time::{now, Stopwatch, Timestamp, DEFAULT_DELTA_THRESHOLD};
