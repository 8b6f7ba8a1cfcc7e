//! Priority rules and the pending request pool.
//!
//! Ordinary requests are ranked by a [`PriorityRule`] that is re-evaluated
//! every time the vehicle moves; emergencies bypass the rule and are served
//! from a LIFO stack.
//!
//! # Usage
//!
//! ```
//! use shuttle_dispatch::dispatching::{rules, DispatchContext, PendingPool, PriorityRule};
//! use shuttle_dispatch::models::{Request, RequestId, Topology};
//!
//! let topology = Topology::default();
//! let a = topology.stop("A").unwrap();
//! let c = topology.stop("C").unwrap();
//! let ctx = DispatchContext::new(&topology, a);
//!
//! let request = Request::ordinary(RequestId::new(0), a, c, 0);
//! let priority = rules::DestinationDistance.evaluate(&request, &ctx);
//!
//! let mut pool = PendingPool::new();
//! pool.submit_ordinary(request.with_priority(priority)).unwrap();
//! assert_eq!(pool.pop_ordinary().unwrap().priority, Some(2));
//! ```

mod context;
mod pool;
pub mod rules;

pub use context::DispatchContext;
pub use pool::{EmergencyStack, PendingPool};
pub use rules::PriorityRuleKind;

use crate::models::{Priority, Request};
use std::fmt::Debug;

/// A rule that assigns the dynamic priority of an ordinary request.
///
/// # Score Convention
/// **Lower priority value = served sooner.** The pool breaks ties by
/// earlier submission.
pub trait PriorityRule: Send + Sync + Debug {
    /// Rule name (e.g., "DEST", "FIFO").
    fn name(&self) -> &'static str;

    /// Evaluates the priority of a request given the vehicle's position.
    fn evaluate(&self, request: &Request, context: &DispatchContext<'_>) -> Priority;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}
