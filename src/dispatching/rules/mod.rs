//! Built-in priority rules for ordinary requests.
//!
//! # Rules
//!
//! - **Distance-based**: `DestinationDistance` (default), `OriginDistance`
//! - **Arrival-based**: `SubmitOrder`
//!
//! # Score Convention
//! All rules return lower priorities for requests that should be served
//! first. Ties are broken by the pool (earlier submission, then id).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{DispatchContext, PriorityRule};
use crate::models::{Priority, Request};

/// Distance from the vehicle to the request's destination.
///
/// Measures how far the rider is from being dropped off, relative to where
/// the vehicle is now, not how close the pickup is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DestinationDistance;

impl PriorityRule for DestinationDistance {
    fn name(&self) -> &'static str {
        "DEST"
    }

    fn evaluate(&self, request: &Request, context: &DispatchContext<'_>) -> Priority {
        context.distance_to(request.destination)
    }

    fn description(&self) -> &'static str {
        "Distance from vehicle to destination"
    }
}

/// Distance from the vehicle to the request's pickup stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginDistance;

impl PriorityRule for OriginDistance {
    fn name(&self) -> &'static str {
        "ORIG"
    }

    fn evaluate(&self, request: &Request, context: &DispatchContext<'_>) -> Priority {
        context.distance_to(request.origin)
    }

    fn description(&self) -> &'static str {
        "Distance from vehicle to pickup"
    }
}

/// First come, first served.
///
/// The priority is the submit tick, so it never changes when the vehicle
/// moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitOrder;

impl PriorityRule for SubmitOrder {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn evaluate(&self, request: &Request, _context: &DispatchContext<'_>) -> Priority {
        Priority::try_from(request.submit_time).unwrap_or(Priority::MAX)
    }

    fn description(&self) -> &'static str {
        "First In First Out"
    }
}

/// Configuration-level selector for the built-in rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityRuleKind {
    #[default]
    DestinationDistance,
    OriginDistance,
    SubmitOrder,
}

impl PriorityRuleKind {
    /// Instantiates the selected rule.
    pub fn build(self) -> Arc<dyn PriorityRule> {
        match self {
            Self::DestinationDistance => Arc::new(DestinationDistance),
            Self::OriginDistance => Arc::new(OriginDistance),
            Self::SubmitOrder => Arc::new(SubmitOrder),
        }
    }
}
