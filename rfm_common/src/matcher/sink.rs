//! Response sink trait and simulator error types.
//!
//! This module defines:
//! - `ResponseSink` trait - Where the simulator core pushes its events
//! - `SimError` enum - Error types for simulator lifecycle operations

use crate::config::ConfigError;
use crate::matcher::types::SimEvent;
use thiserror::Error;

/// Error types for simulator lifecycle operations.
///
/// Numeric degeneracies never surface here; they are absorbed by the
/// physics as sentinels and validity flags.
#[derive(Debug, Clone, Error)]
pub enum SimError {
    /// Simulator initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// State persistence error
    #[error("State persistence error: {0}")]
    PersistenceError(String),

    /// Motor index out of range
    #[error("Invalid motor index: {0}")]
    InvalidMotor(usize),

    /// Sink could not deliver an event
    #[error("Sink error: {0}")]
    SinkError(String),
}

/// Destination for everything the simulator core emits.
///
/// Injected into the core at construction. Implementations must not
/// call back into the core; a sink that needs to stop the auto-matching
/// loop does so through the loop's shared enable flag.
pub trait ResponseSink: Send {
    /// Deliver one event. Called from the scheduler thread, never concurrently.
    fn send(&mut self, event: &SimEvent);

    /// Flush buffered output. Called once on shutdown.
    fn flush(&mut self) -> Result<(), SimError> {
        Ok(())
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for Box<S> {
    fn send(&mut self, event: &SimEvent) {
        (**self).send(event);
    }

    fn flush(&mut self) -> Result<(), SimError> {
        (**self).flush()
    }
}
