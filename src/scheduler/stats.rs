//! Trip statistics.
//!
//! Accumulates completed requests and reports their averages.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Travel time | arrival - board |
//! | Wait time | board - submit |
//! | Turnaround | arrival - submit |
//!
//! Averages of an empty aggregate are `0.0`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{DispatchError, DispatchResult};
use crate::models::{Request, RequestId, RequestKind, Tick};

/// Running sums for one group of requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TripTotals {
    /// Completed requests.
    pub count: u64,
    /// Sum of travel times.
    pub travel: u64,
    /// Sum of wait times.
    pub wait: u64,
    /// Sum of turnaround times.
    pub turnaround: u64,
}

impl TripTotals {
    fn add(&mut self, travel: Tick, wait: Tick, turnaround: Tick) {
        self.count += 1;
        self.travel += travel;
        self.wait += wait;
        self.turnaround += turnaround;
    }

    fn mean(&self, sum: u64) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            sum as f64 / self.count as f64
        }
    }

    pub fn average_travel_time(&self) -> f64 {
        self.mean(self.travel)
    }

    pub fn average_wait_time(&self) -> f64 {
        self.mean(self.wait)
    }

    pub fn average_turnaround_time(&self) -> f64 {
        self.mean(self.turnaround)
    }
}

/// Collects completed trips.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    overall: TripTotals,
    ordinary: TripTotals,
    emergency: TripTotals,
    recorded: HashSet<RequestId>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed request.
    ///
    /// Fails if the request lacks a timestamp or was already recorded.
    pub fn record(&mut self, request: &Request) -> DispatchResult<()> {
        let (Some(travel), Some(wait), Some(turnaround)) = (
            request.travel_time(),
            request.wait_time(),
            request.turnaround_time(),
        ) else {
            return Err(DispatchError::invariant(
                Some(request.id),
                "recorded before completion",
            ));
        };
        if !self.recorded.insert(request.id) {
            return Err(DispatchError::invariant(
                Some(request.id),
                "recorded twice",
            ));
        }

        self.overall.add(travel, wait, turnaround);
        match request.kind {
            RequestKind::Ordinary => self.ordinary.add(travel, wait, turnaround),
            RequestKind::Emergency => self.emergency.add(travel, wait, turnaround),
        }
        Ok(())
    }

    /// Number of completed requests.
    pub fn count(&self) -> u64 {
        self.overall.count
    }

    /// Mean `arrival - board` over all completed requests, `0.0` if none.
    pub fn average_travel_time(&self) -> f64 {
        self.overall.average_travel_time()
    }

    /// Mean `board - submit`, `0.0` if none.
    pub fn average_wait_time(&self) -> f64 {
        self.overall.average_wait_time()
    }

    pub fn average_turnaround_time(&self) -> f64 {
        self.overall.average_turnaround_time()
    }

    pub fn overall(&self) -> TripTotals {
        self.overall
    }

    /// Totals restricted to one request kind.
    pub fn by_kind(&self, kind: RequestKind) -> TripTotals {
        match kind {
            RequestKind::Ordinary => self.ordinary,
            RequestKind::Emergency => self.emergency,
        }
    }
}

/// Summary of a finished simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Completed requests.
    pub completed: u64,
    /// Totals over all requests.
    pub overall: TripTotals,
    /// Totals over ordinary requests.
    pub ordinary: TripTotals,
    /// Totals over emergencies.
    pub emergency: TripTotals,
    /// Mean travel time over all requests.
    pub average_travel_time: f64,
    /// Mean wait time over all requests.
    pub average_wait_time: f64,
    /// Mean turnaround over all requests.
    pub average_turnaround_time: f64,
    /// Clock value at termination.
    pub final_tick: Tick,
    /// Stops travelled by the vehicle.
    pub distance_travelled: u64,
    /// Times an emergency took control of the vehicle.
    pub preemptions: u64,
}

impl SimulationReport {
    /// Builds a report from the aggregate and the dispatcher's counters.
    pub fn from_stats(
        stats: &StatsAggregator,
        final_tick: Tick,
        distance_travelled: u64,
        preemptions: u64,
    ) -> Self {
        Self {
            completed: stats.count(),
            overall: stats.overall(),
            ordinary: stats.by_kind(RequestKind::Ordinary),
            emergency: stats.by_kind(RequestKind::Emergency),
            average_travel_time: stats.average_travel_time(),
            average_wait_time: stats.average_wait_time(),
            average_turnaround_time: stats.average_turnaround_time(),
            final_tick,
            distance_travelled,
            preemptions,
        }
    }
}
