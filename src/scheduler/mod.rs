//! The dispatcher state machine and trip statistics.
//!
//! `Dispatcher` drives the vehicle tick by tick: alight, admit, board,
//! decide (emergency preemption first, then ordinary priority), move,
//! reprioritize. Completed requests flow into `StatsAggregator`, which
//! feeds the final `SimulationReport`.

mod dispatcher;
mod stats;

pub use dispatcher::{Dispatcher, Snapshot, TickOutcome};
pub use stats::{SimulationReport, StatsAggregator, TripTotals};
