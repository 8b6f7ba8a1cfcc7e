//! Single-vehicle ride dispatch core.
//!
//! A vehicle serves ride requests over a fixed line of stops. Ordinary
//! requests are ranked by a dynamic priority recomputed after every move;
//! emergencies preempt ordinary service in strict last-in, first-out order.
//! The clock is a logical tick counter advanced by the dispatcher itself.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Topology`, `StopId`, `Request`, `Vehicle`
//! - **`dispatching`**: `PriorityRule` implementations and the `PendingPool`
//! - **`scheduler`**: The `Dispatcher` tick loop and `StatsAggregator`
//! - **`events`**: `EventSink` observers (`EventLog`, `TracingSink`)
//! - **`config`**: `DispatcherConfig` and JSON `Scenario` files
//! - **`generator`**: Seeded random request generation
//! - **`validation`**: Submission and configuration checks
//!
//! # Example
//!
//! ```
//! use shuttle_dispatch::events::{EventLog, SimEventKind};
//! use shuttle_dispatch::models::{RequestKind, Topology};
//! use shuttle_dispatch::scheduler::Dispatcher;
//!
//! let mut dispatcher = Dispatcher::new(Topology::default()).with_sink(EventLog::new());
//! dispatcher.submit_named("C", "A", 0, RequestKind::Ordinary).unwrap();
//! dispatcher.submit_named("B", "D", 1, RequestKind::Emergency).unwrap();
//!
//! let report = dispatcher.run();
//! assert_eq!(report.completed, 2);
//! assert!(dispatcher.sink().of_kind(SimEventKind::Preempted).count() >= 1);
//! ```

pub mod config;
pub mod dispatching;
pub mod error;
pub mod events;
pub mod generator;
pub mod models;
pub mod scheduler;
pub mod validation;

pub use error::{DispatchError, DispatchResult};
