//! Dispatch context for priority rule evaluation.

use crate::models::{Priority, StopId, Topology};

/// Runtime state passed to priority rules.
///
/// Borrowed from the dispatcher for the duration of one evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    /// Stop sequence.
    pub topology: &'a Topology,
    /// Where the vehicle currently stands.
    pub vehicle_location: StopId,
}

impl<'a> DispatchContext<'a> {
    /// Creates a context for the vehicle at `vehicle_location`.
    pub fn new(topology: &'a Topology, vehicle_location: StopId) -> Self {
        Self {
            topology,
            vehicle_location,
        }
    }

    /// Distance from the vehicle to `stop` as a priority. Stops outside the
    /// topology rank last.
    pub fn distance_to(&self, stop: StopId) -> Priority {
        self.topology
            .distance(self.vehicle_location, stop)
            .map_or(Priority::MAX, |d| d as Priority)
    }
}
