//! Per-node inbound event queue
//!
//! Many producers, one consumer. Producers hold a [`MailboxSink`]; only the
//! owning node drains, and draining needs `&mut self`, so two drains can never
//! overlap.

use crate::event::Event;
use crate::stream::Sink;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;

/// Unbounded multi-producer / single-consumer event queue
pub struct Mailbox {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Mailbox {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Producer handle that appends into this mailbox
    pub fn sink(&self) -> MailboxSink {
        MailboxSink {
            tx: self.tx.clone(),
        }
    }

    /// Take every event queued so far
    ///
    /// Events posted while the drain is in progress wait for the next call.
    pub fn drain(&mut self) -> Vec<Event> {
        let pending = self.rx.len();
        self.rx.try_iter().take(pending).collect()
    }

    /// Number of events waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox").field("pending", &self.len()).finish()
    }
}

/// Producer end of a [`Mailbox`]
#[derive(Clone)]
pub struct MailboxSink {
    tx: Sender<Event>,
}

impl Sink for MailboxSink {
    fn handle_event(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::trace!("mailbox owner dropped, event discarded");
        }
    }
}

impl fmt::Debug for MailboxSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxSink").finish()
    }
}
