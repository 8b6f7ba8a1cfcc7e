//! Input validation for the dispatch core.
//!
//! Two layers:
//! - [`check_request`] guards the submission boundary of a running
//!   dispatcher and fails fast with the matching [`DispatchError`].
//! - [`validate_stops`] and [`validate_requests`] check configuration and
//!   scenario files up front and report every problem at once:
//!   - Empty stop sequence or blank stop names
//!   - Duplicate stop names
//!   - Requests naming unknown stops
//!   - Requests whose origin equals their destination

use std::collections::HashSet;

use crate::error::{DispatchError, DispatchResult};
use crate::models::{RequestSpec, StopId, Topology};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// The stop sequence is empty.
    EmptyTopology,
    /// A stop has a blank name.
    EmptyStopName,
    /// Two stops share the same name.
    DuplicateStop,
    /// A request references a stop that doesn't exist.
    UnknownStop,
    /// A request starts and ends at the same stop.
    SameStop,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Joins a list of errors into one `InvalidConfig`.
pub fn into_config_error(errors: Vec<ValidationError>) -> DispatchError {
    let joined = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    DispatchError::InvalidConfig(joined)
}

/// Boundary check for a single submission.
pub fn check_request(topology: &Topology, origin: StopId, destination: StopId) -> DispatchResult<()> {
    topology.check(origin)?;
    topology.check(destination)?;
    if origin == destination {
        return Err(DispatchError::SameStop(origin));
    }
    Ok(())
}

/// Validates a stop sequence.
pub fn validate_stops(stops: &[String]) -> ValidationResult {
    let mut errors = Vec::new();

    if stops.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyTopology,
            "At least one stop is required",
        ));
    }

    let mut seen = HashSet::new();
    for (pos, name) in stops.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyStopName,
                format!("Stop at position {pos} has an empty name"),
            ));
        } else if !seen.insert(name.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateStop,
                format!("Duplicate stop name: {name}"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a batch of request specs against a topology.
pub fn validate_requests(topology: &Topology, requests: &[RequestSpec]) -> ValidationResult {
    let mut errors = Vec::new();

    for (i, spec) in requests.iter().enumerate() {
        for name in [&spec.origin, &spec.destination] {
            if topology.stop(name).is_err() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownStop,
                    format!("Request #{i} references unknown stop '{name}'"),
                ));
            }
        }
        if spec.origin == spec.destination {
            errors.push(ValidationError::new(
                ValidationErrorKind::SameStop,
                format!("Request #{i} starts and ends at '{}'", spec.origin),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
