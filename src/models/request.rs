//! Ride request model.
//!
//! A request carries an immutable identity (origin, destination, submit
//! time) and the mutable scheduling state the dispatcher maintains for it:
//! dynamic priority, boarding time and arrival time.
//!
//! # Time Representation
//! All times are logical ticks of the dispatcher clock, starting at 0.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::StopId;
use crate::error::{DispatchError, DispatchResult};

/// Logical simulation time.
pub type Tick = u64;

/// Dynamic priority of an ordinary request (lower = served sooner).
pub type Priority = i64;

/// Identifier assigned by the dispatcher at submission, in submission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Queue discipline of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Dynamic-priority service.
    Ordinary,
    /// LIFO preemptive service.
    Emergency,
}

/// Lifecycle position of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    Onboard,
    Completed,
}

/// A ride request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Dispatcher-assigned identifier.
    pub id: RequestId,
    /// Ordinary or emergency.
    pub kind: RequestKind,
    /// Pickup stop.
    pub origin: StopId,
    /// Drop-off stop.
    pub destination: StopId,
    /// Tick at which the request becomes visible to the dispatcher.
    pub submit_time: Tick,
    /// Current priority. `None` for emergencies and before admission.
    pub priority: Option<Priority>,
    /// Order in which the request entered the pending pool.
    pub admission_seq: Option<u64>,
    /// Tick of boarding. Set once.
    pub board_time: Option<Tick>,
    /// Tick of arrival at the destination. Set once.
    pub arrival_time: Option<Tick>,
}

impl Request {
    /// Creates a pending request. Stops are not validated here; the
    /// dispatcher's intake does that.
    pub fn new(
        id: RequestId,
        kind: RequestKind,
        origin: StopId,
        destination: StopId,
        submit_time: Tick,
    ) -> Self {
        Self {
            id,
            kind,
            origin,
            destination,
            submit_time,
            priority: None,
            admission_seq: None,
            board_time: None,
            arrival_time: None,
        }
    }

    /// Shorthand for an ordinary request.
    pub fn ordinary(id: RequestId, origin: StopId, destination: StopId, submit_time: Tick) -> Self {
        Self::new(id, RequestKind::Ordinary, origin, destination, submit_time)
    }

    /// Shorthand for an emergency.
    pub fn emergency(id: RequestId, origin: StopId, destination: StopId, submit_time: Tick) -> Self {
        Self::new(id, RequestKind::Emergency, origin, destination, submit_time)
    }

    /// Sets the priority (builder form).
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[inline]
    pub fn is_emergency(&self) -> bool {
        self.kind == RequestKind::Emergency
    }

    /// Whether `submit_time` has been reached.
    #[inline]
    pub fn is_eligible(&self, now: Tick) -> bool {
        self.submit_time <= now
    }

    /// Derived lifecycle state.
    pub fn state(&self) -> RequestState {
        match (self.board_time, self.arrival_time) {
            (_, Some(_)) => RequestState::Completed,
            (Some(_), None) => RequestState::Onboard,
            (None, None) => RequestState::Pending,
        }
    }

    /// Records boarding at `now`. Fails if already boarded or not yet eligible.
    pub fn record_boarding(&mut self, now: Tick) -> DispatchResult<()> {
        if self.state() != RequestState::Pending {
            return Err(DispatchError::invariant(Some(self.id), "boarded twice"));
        }
        if !self.is_eligible(now) {
            return Err(DispatchError::invariant(
                Some(self.id),
                format!("boarded at {now} before submit time {}", self.submit_time),
            ));
        }
        self.board_time = Some(now);
        Ok(())
    }

    /// Records arrival at `now`. Fails unless onboard and `now >= board_time`.
    pub fn record_arrival(&mut self, now: Tick) -> DispatchResult<()> {
        let boarded = match (self.state(), self.board_time) {
            (RequestState::Onboard, Some(boarded)) => boarded,
            (RequestState::Completed, _) => {
                return Err(DispatchError::invariant(Some(self.id), "completed twice"))
            }
            _ => {
                return Err(DispatchError::invariant(
                    Some(self.id),
                    "alighted without boarding",
                ))
            }
        };
        if now < boarded {
            return Err(DispatchError::invariant(
                Some(self.id),
                format!("arrival {now} precedes boarding {boarded}"),
            ));
        }
        self.arrival_time = Some(now);
        Ok(())
    }

    /// `arrival - board`, once completed.
    pub fn travel_time(&self) -> Option<Tick> {
        Some(self.arrival_time? - self.board_time?)
    }

    /// `board - submit`, once boarded.
    pub fn wait_time(&self) -> Option<Tick> {
        Some(self.board_time? - self.submit_time)
    }

    /// `arrival - submit`, once completed.
    pub fn turnaround_time(&self) -> Option<Tick> {
        Some(self.arrival_time? - self.submit_time)
    }
}

/// Submission data for a request, before the dispatcher assigns an id.
///
/// This is what external collaborators (scenario files, the random
/// generator) hand to the intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    /// Origin stop name.
    pub origin: String,
    /// Destination stop name.
    pub destination: String,
    /// Submit tick.
    #[serde(default)]
    pub submit_time: Tick,
    /// Emergency flag.
    #[serde(default)]
    pub emergency: bool,
}

impl RequestSpec {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>, submit_time: Tick) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            submit_time,
            emergency: false,
        }
    }

    /// Marks the spec as an emergency.
    pub fn as_emergency(mut self) -> Self {
        self.emergency = true;
        self
    }

    pub fn kind(&self) -> RequestKind {
        if self.emergency {
            RequestKind::Emergency
        } else {
            RequestKind::Ordinary
        }
    }
}
