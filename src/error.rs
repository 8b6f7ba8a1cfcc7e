//! Crate-level error type.
//!
//! Boundary errors (`InvalidStop`, `SameStop`) are returned to the caller of
//! the intake API and never touch simulation state. `InvariantViolation` is
//! reported by the lower-level building blocks (pool, stats, request
//! lifecycle); the dispatcher turns it into a fatal abort.

use thiserror::Error;

use crate::models::{RequestId, StopId};

/// Errors produced by the dispatch core and its configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A stop name or index that is not part of the configured topology.
    #[error("unknown stop '{0}'")]
    InvalidStop(String),
    /// Origin and destination are the same stop.
    #[error("origin and destination are the same stop ({0})")]
    SameStop(StopId),
    /// The stop sequence itself is malformed.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    /// Configuration could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A report was requested before the simulation reached its terminal state.
    #[error("simulation has not finished yet")]
    SimulationRunning,
    /// Internal state contradicts the dispatch contract.
    #[error("invariant violated for request {request:?}: {message}")]
    InvariantViolation {
        /// Request involved, if any.
        request: Option<RequestId>,
        /// What went wrong.
        message: String,
    },
}

impl DispatchError {
    pub(crate) fn invariant(request: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            request,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type DispatchResult<T> = Result<T, DispatchError>;
