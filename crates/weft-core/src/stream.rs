//! Publish/subscribe plumbing: sinks, sources and fan-out streams

use crate::event::Event;
use crate::identity::{NodeId, SinkId};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Anything that accepts events
///
/// Implementations must not block: fan-out runs on the publisher's thread and
/// a slow sink stalls every publisher that reaches it.
pub trait Sink: Send + Sync {
    fn handle_event(&self, event: Event);
}

/// Anything that sinks can subscribe to
pub trait Source {
    /// Register a sink; the returned id removes it again
    fn add_sink(&self, sink: Arc<dyn Sink>) -> SinkId;

    /// Unregister a sink; returns false if it was not registered here
    fn remove_sink(&self, id: SinkId) -> bool;

    /// Deliver an event to every registered sink
    fn notify_sinks(&self, event: &Event);
}

/// A multi-sink relay
///
/// Publishing delivers a clone of the event to every sink registered at the
/// moment of publication, synchronously, with no queue of its own. Membership
/// may change concurrently with fan-out: delivery iterates a snapshot taken
/// under the read lock, and the lock is released before any sink runs, so a
/// sink may add or remove sinks (itself included) while handling an event.
pub struct Stream {
    id: NodeId,
    sinks: RwLock<Vec<(SinkId, Arc<dyn Sink>)>>,
}

impl Stream {
    /// Create an empty stream with a fresh node id
    pub fn new() -> Self {
        Self::with_id(NodeId::next())
    }

    pub fn with_id(id: NodeId) -> Self {
        Self {
            id,
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Identity used as the source of events this stream originates
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Publish an event to all current sinks
    pub fn publish(&self, event: Event) {
        self.notify_sinks(&event);
    }

    /// Number of registered sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Sink>> {
        self.sinks
            .read()
            .iter()
            .map(|(_, sink)| Arc::clone(sink))
            .collect()
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for Stream {
    fn add_sink(&self, sink: Arc<dyn Sink>) -> SinkId {
        let id = SinkId::next();
        self.sinks.write().push((id, sink));
        id
    }

    fn remove_sink(&self, id: SinkId) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|(sid, _)| *sid != id);
        sinks.len() != before
    }

    fn notify_sinks(&self, event: &Event) {
        let sinks = self.snapshot();
        tracing::trace!(
            stream = %self.id,
            kind = ?event.kind(),
            sinks = sinks.len(),
            "fan-out"
        );
        for sink in sinks {
            sink.handle_event(event.clone());
        }
    }
}

impl Sink for Stream {
    fn handle_event(&self, event: Event) {
        self.notify_sinks(&event);
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("sinks", &self.sink_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Payload};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventKind>>,
    }

    impl Sink for Recorder {
        fn handle_event(&self, event: Event) {
            self.seen.lock().push(event.kind());
        }
    }

    #[test]
    fn test_fan_out_to_all_sinks() {
        let stream = Stream::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        stream.add_sink(a.clone());
        stream.add_sink(b.clone());

        stream.publish(Event::death(NodeId::new(1)));

        assert_eq!(*a.seen.lock(), vec![EventKind::Death]);
        assert_eq!(*b.seen.lock(), vec![EventKind::Death]);
    }

    #[test]
    fn test_remove_sink() {
        let stream = Stream::new();
        let a = Arc::new(Recorder::default());
        let id = stream.add_sink(a.clone());
        assert_eq!(stream.sink_count(), 1);

        assert!(stream.remove_sink(id));
        assert!(!stream.remove_sink(id));
        assert!(stream.is_empty());

        stream.publish(Event::death(NodeId::new(1)));
        assert!(a.seen.lock().is_empty());
    }

    #[test]
    fn test_streams_chain() {
        let upstream = Stream::new();
        let downstream = Arc::new(Stream::new());
        let leaf = Arc::new(Recorder::default());
        downstream.add_sink(leaf.clone());
        upstream.add_sink(downstream);

        upstream.publish(Event::broadcast(NodeId::new(2), Payload::ForgetAll));
        assert_eq!(*leaf.seen.lock(), vec![EventKind::ForgetAll]);
    }

    struct SelfRemoving {
        stream: Arc<Stream>,
        id: Mutex<Option<SinkId>>,
        hits: Mutex<u32>,
    }

    impl Sink for SelfRemoving {
        fn handle_event(&self, _event: Event) {
            *self.hits.lock() += 1;
            if let Some(id) = self.id.lock().take() {
                self.stream.remove_sink(id);
            }
        }
    }

    #[test]
    fn test_sink_may_unsubscribe_during_fan_out() {
        let stream = Arc::new(Stream::new());
        let sink = Arc::new(SelfRemoving {
            stream: Arc::clone(&stream),
            id: Mutex::new(None),
            hits: Mutex::new(0),
        });
        let id = stream.add_sink(sink.clone());
        *sink.id.lock() = Some(id);

        stream.publish(Event::death(NodeId::new(1)));
        stream.publish(Event::death(NodeId::new(1)));

        assert_eq!(*sink.hits.lock(), 1);
        assert!(stream.is_empty());
    }

    #[test]
    fn test_concurrent_publish_and_membership() {
        let stream = Arc::new(Stream::new());
        let keeper = Arc::new(Recorder::default());
        stream.add_sink(keeper.clone());

        let churn = {
            let stream = Arc::clone(&stream);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let id = stream.add_sink(Arc::new(Recorder::default()));
                    stream.remove_sink(id);
                }
            })
        };
        for _ in 0..500 {
            stream.publish(Event::death(NodeId::new(9)));
        }
        churn.join().unwrap();

        assert_eq!(keeper.seen.lock().len(), 500);
        assert_eq!(stream.sink_count(), 1);
    }
}
