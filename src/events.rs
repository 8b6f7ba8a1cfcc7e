//! Simulation events and sinks.
//!
//! The dispatcher reports every state transition to an [`EventSink`]. Sinks
//! only observe: they receive shared references and have no way back into
//! the dispatcher.

use serde::{Deserialize, Serialize};

use crate::models::{RequestId, StopId, Tick, Topology};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimEventKind {
    /// The vehicle arrived at `stop` after a one-stop move.
    VehicleMoved,
    /// A request boarded at `stop`.
    Boarded,
    /// A request alighted at `stop`.
    Alighted,
    /// An emergency took control of the vehicle.
    Preempted,
    /// The clock jumped forward with nothing to do.
    ClockSkipped,
    /// Nothing left to serve.
    SimulationComplete,
}

/// A single observable state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    pub kind: SimEventKind,
    /// Clock value when the transition happened.
    pub tick: Tick,
    /// Stop involved (vehicle location).
    pub stop: StopId,
    /// Request involved, if any.
    pub request: Option<RequestId>,
}

impl SimEvent {
    pub fn new(kind: SimEventKind, tick: Tick, stop: StopId) -> Self {
        Self {
            kind,
            tick,
            stop,
            request: None,
        }
    }

    pub fn with_request(mut self, request: RequestId) -> Self {
        self.request = Some(request);
        self
    }
}

/// Observer of simulation events.
pub trait EventSink {
    fn on_event(&mut self, event: &SimEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn on_event(&mut self, event: &SimEvent) {
        (**self).on_event(event);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&mut self, _event: &SimEvent) {}
}

/// Records events in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    pub events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events of one kind, in order.
    pub fn of_kind(&self, kind: SimEventKind) -> impl Iterator<Item = &SimEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Events that concern `request`, in order.
    pub fn for_request(&self, request: RequestId) -> impl Iterator<Item = &SimEvent> {
        self.events
            .iter()
            .filter(move |e| e.request == Some(request))
    }

    /// Stops visited by the vehicle, one per move.
    pub fn route(&self) -> Vec<StopId> {
        self.of_kind(SimEventKind::VehicleMoved)
            .map(|e| e.stop)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventLog {
    fn on_event(&mut self, event: &SimEvent) {
        self.events.push(event.clone());
    }
}

/// Logs every event through `tracing` at INFO level.
#[derive(Debug, Clone)]
pub struct TracingSink {
    topology: Topology,
}

impl TracingSink {
    /// Stop names are resolved against `topology` for readable output.
    pub fn new(topology: Topology) -> Self {
        Self { topology }
    }
}

impl EventSink for TracingSink {
    fn on_event(&mut self, event: &SimEvent) {
        let stop = self.topology.label(event.stop);
        match event.request {
            Some(request) => tracing::info!(
                tick = event.tick,
                stop = %stop,
                request = %request,
                "{:?}",
                event.kind
            ),
            None => tracing::info!(tick = event.tick, stop = %stop, "{:?}", event.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        let r = RequestId::new(4);
        log.on_event(&SimEvent::new(SimEventKind::Boarded, 0, StopId::new(0)).with_request(r));
        log.on_event(&SimEvent::new(SimEventKind::VehicleMoved, 1, StopId::new(1)));
        log.on_event(&SimEvent::new(SimEventKind::VehicleMoved, 2, StopId::new(2)));
        log.on_event(&SimEvent::new(SimEventKind::Alighted, 2, StopId::new(2)).with_request(r));

        assert_eq!(log.len(), 4);
        assert_eq!(log.route(), vec![StopId::new(1), StopId::new(2)]);
        assert_eq!(log.for_request(r).count(), 2);
        assert_eq!(log.of_kind(SimEventKind::Preempted).count(), 0);
    }

    #[test]
    fn test_sink_through_mut_ref() {
        fn emit(mut sink: impl EventSink) {
            sink.on_event(&SimEvent::new(SimEventKind::SimulationComplete, 9, StopId::new(0)));
        }
        let mut log = EventLog::new();
        emit(&mut log);
        emit(NullSink);
        assert_eq!(log.events[0].kind, SimEventKind::SimulationComplete);
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let e = SimEvent::new(SimEventKind::ClockSkipped, 50, StopId::new(0));
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"clock_skipped\""));
    }
}
