//! Vehicle model.

use serde::{Deserialize, Serialize};

use super::{Request, RequestId, StopId};

/// The single vehicle: where it is and who rides it.
///
/// Capacity is unbounded. Only the dispatcher mutates a vehicle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vehicle {
    /// Current stop.
    pub location: StopId,
    /// Riders in boarding order.
    pub onboard: Vec<Request>,
    /// Stops travelled so far.
    pub distance_travelled: u64,
}

impl Vehicle {
    /// Creates an empty vehicle parked at `location`.
    pub fn at(location: StopId) -> Self {
        Self {
            location,
            onboard: Vec::new(),
            distance_travelled: 0,
        }
    }

    /// Moves to an adjacent stop.
    pub(crate) fn advance_to(&mut self, next: StopId) {
        self.distance_travelled += self.location.index().abs_diff(next.index()) as u64;
        self.location = next;
    }

    pub(crate) fn board(&mut self, request: Request) {
        self.onboard.push(request);
    }

    /// Removes and returns every rider whose destination is the current stop.
    pub(crate) fn take_arrivals(&mut self) -> Vec<Request> {
        let here = self.location;
        let (arriving, staying): (Vec<_>, Vec<_>) = std::mem::take(&mut self.onboard)
            .into_iter()
            .partition(|r| r.destination == here);
        self.onboard = staying;
        arriving
    }

    pub fn is_empty(&self) -> bool {
        self.onboard.is_empty()
    }

    pub fn rider(&self, id: RequestId) -> Option<&Request> {
        self.onboard.iter().find(|r| r.id == id)
    }

    /// Onboard emergencies, in boarding order.
    pub fn emergencies(&self) -> impl Iterator<Item = &Request> {
        self.onboard.iter().filter(|r| r.is_emergency())
    }

    /// Onboard ordinary riders.
    pub fn ordinary_riders(&self) -> impl Iterator<Item = &Request> {
        self.onboard.iter().filter(|r| !r.is_emergency())
    }
}
