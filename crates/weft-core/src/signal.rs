//! Timestamped value cells - the dataflow edges between behaviours
//!
//! A [`Signal`] is the single write handle for a value; it is deliberately
//! not `Clone`, so exactly one owner can publish into it. Everyone else gets a
//! [`SignalReader`], which can read and inspect the timestamp but never write.
//!
//! Each write publishes a fresh immutable [`Stamped`] record. Readers take a
//! reference to the current record and copy out of it, so a reader racing a
//! writer sees either the old record or the new one, never a mix. The lock
//! only protects the pointer swap; values are cloned outside of it.
//!
//! Reading several signals is *not* atomic across them: two reads in one run
//! may observe different write generations.

use crate::time::{now, Timestamp};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A value together with the clock reading of the write that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    pub value: T,
    pub timestamp: Timestamp,
}

struct Cell<T> {
    current: RwLock<Arc<Stamped<T>>>,
}

impl<T> Cell<T> {
    fn load(&self) -> Arc<Stamped<T>> {
        Arc::clone(&self.current.read())
    }
}

/// The owned, write-capable end of a timestamped value cell
pub struct Signal<T> {
    cell: Arc<Cell<T>>,
}

impl<T: Clone> Signal<T> {
    /// Create a signal stamped with the current clock reading
    pub fn new(value: T) -> Self {
        Self::with_timestamp(value, now())
    }

    /// Create a signal with an explicit initial timestamp
    pub fn with_timestamp(value: T, timestamp: Timestamp) -> Self {
        Self {
            cell: Arc::new(Cell {
                current: RwLock::new(Arc::new(Stamped { value, timestamp })),
            }),
        }
    }

    /// Publish a new value stamped with the current clock reading
    pub fn write(&mut self, value: T) {
        self.write_at(value, now());
    }

    /// Publish a new value with an explicit timestamp
    ///
    /// Earlier timestamps than the previous write are accepted as-is.
    pub fn write_at(&mut self, value: T, timestamp: Timestamp) {
        let next = Arc::new(Stamped { value, timestamp });
        let previous = {
            let mut slot = self.cell.current.write();
            std::mem::replace(&mut *slot, next)
        };
        drop(previous);
    }

    /// Copy out the current value
    pub fn read(&self) -> T {
        self.cell.load().value.clone()
    }

    /// Timestamp of the last write
    pub fn timestamp(&self) -> Timestamp {
        self.cell.load().timestamp
    }

    /// Copy out value and timestamp from the same write
    pub fn snapshot(&self) -> Stamped<T> {
        (*self.cell.load()).clone()
    }

    /// Hand out a read-only view of this signal
    pub fn reader(&self) -> SignalReader<T> {
        SignalReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.cell.load();
        f.debug_struct("Signal")
            .field("value", &current.value)
            .field("timestamp", &current.timestamp)
            .finish()
    }
}

/// Read-only capability for a [`Signal`] owned by another node
pub struct SignalReader<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for SignalReader<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone> SignalReader<T> {
    /// Copy out the current value
    pub fn read(&self) -> T {
        self.cell.load().value.clone()
    }

    /// Timestamp of the last write
    pub fn timestamp(&self) -> Timestamp {
        self.cell.load().timestamp
    }

    /// Copy out value and timestamp from the same write
    pub fn snapshot(&self) -> Stamped<T> {
        (*self.cell.load()).clone()
    }

    /// Check whether two readers observe the same signal
    pub fn same_signal(&self, other: &SignalReader<T>) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for SignalReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.cell.load();
        f.debug_struct("SignalReader")
            .field("value", &current.value)
            .field("timestamp", &current.timestamp)
            .finish()
    }
}

/// Type-erased upstream dependency used by readiness checks
///
/// Lets a behaviour declare dependencies on signals of different value types.
pub trait Upstream: Send + Sync {
    /// Timestamp of the dependency's last write
    fn timestamp(&self) -> Timestamp;
}

impl<T: Clone + Send + Sync> Upstream for SignalReader<T> {
    fn timestamp(&self) -> Timestamp {
        SignalReader::timestamp(self)
    }
}
