//! Error types for weft-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// A task body reported a failure it could not recover from
    #[error("Task {task} faulted: {reason}")]
    TaskFault { task: String, reason: String },

    /// A task body panicked; the payload message is preserved when printable
    #[error("Task {task} panicked: {message}")]
    Panicked { task: String, message: String },

    /// A spawned-node slot was already claimed by another consumer
    #[error("Spawned node already taken")]
    SlotTaken,
}

impl Error {
    /// Build a fault for the named task
    pub fn fault(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::TaskFault {
            task: task.into(),
            reason: reason.into(),
        }
    }

    /// Build a panic error from a `catch_unwind` payload
    pub fn from_panic(task: impl Into<String>, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panicked {
            task: task.into(),
            message,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display() {
        let err = Error::fault("health", "negative damage");
        assert_eq!(err.to_string(), "Task health faulted: negative damage");
    }

    #[test]
    fn test_from_panic_payloads() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        let err = Error::from_panic("mover", boxed.as_ref());
        assert_eq!(err.to_string(), "Task mover panicked: boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("kaput"));
        let err = Error::from_panic("mover", boxed.as_ref());
        assert!(err.to_string().ends_with("kaput"));

        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        let err = Error::from_panic("mover", boxed.as_ref());
        assert!(err.to_string().contains("non-string"));
    }
}
