//! Tick-driven single-vehicle dispatcher.
//!
//! # Algorithm
//!
//! Each tick runs, in this order:
//!
//! 1. Alight riders whose destination is the current stop.
//! 2. Admit intake requests whose submit time has been reached. Ordinary
//!    requests get their initial priority against the current location.
//! 3. Board every eligible pending request waiting at the current stop.
//! 4. If an emergency is active, the newest one (LIFO) controls the vehicle:
//!    toward its origin while pending, toward its destination once onboard.
//! 5. Otherwise serve ordinary work: keep driving the active rider, or pick
//!    the best onboard rider, or pop the minimum-priority pending request
//!    and go pick it up.
//! 6. With nothing to serve, jump the clock to the next submission.
//! 7. After a move, recompute the priorities of pending ordinary requests.
//!
//! The vehicle moves one stop per tick, so the clock advances by the
//! distance travelled.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::stats::{SimulationReport, StatsAggregator};
use crate::config::DispatcherConfig;
use crate::dispatching::{rules, DispatchContext, PendingPool, PriorityRule};
use crate::error::{DispatchError, DispatchResult};
use crate::events::{EventSink, NullSink, SimEvent, SimEventKind};
use crate::models::{
    Request, RequestId, RequestKind, RequestSpec, StopId, Tick, Topology, Vehicle,
};
use crate::validation;

/// Ordinary work the vehicle is currently committed to.
#[derive(Debug, Clone)]
enum OrdinaryTarget {
    /// Popped from the queue, not yet boarded: drive to its origin.
    Pickup(Request),
    /// Onboard: drive to its destination.
    Dropoff(RequestId),
}

/// Result of a single [`Dispatcher::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The vehicle moved one stop.
    Moved { from: StopId, to: StopId },
    /// Nothing was eligible; the clock jumped to the next submission.
    Skipped { from: Tick, to: Tick },
    /// Nothing was eligible; the clock advanced by one tick.
    Waited,
    /// Terminal state: nothing pending, nothing onboard.
    Finished,
}

/// Request counts by lifecycle position.
///
/// `intake + pending_ordinary + pending_emergency + onboard + completed`
/// always equals `submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub tick: Tick,
    pub location: StopId,
    /// Submitted but not yet admitted.
    pub intake: usize,
    /// Ordinary requests waiting for pickup, including the assigned pickup
    /// target. The target's priority is recomputed after every move like
    /// the rest of the queue.
    pub pending_ordinary: usize,
    pub pending_emergency: usize,
    pub onboard: usize,
    pub completed: usize,
    pub submitted: usize,
}

impl Snapshot {
    /// Whether every submitted request is accounted for exactly once.
    pub fn is_conserved(&self) -> bool {
        self.intake + self.pending_ordinary + self.pending_emergency + self.onboard + self.completed
            == self.submitted
    }
}

/// Single-vehicle dispatcher.
///
/// Owns the clock, the vehicle, the intake, the pending pool and the
/// statistics of one simulation run.
///
/// # Example
///
/// ```
/// use shuttle_dispatch::models::{RequestKind, Topology};
/// use shuttle_dispatch::scheduler::Dispatcher;
///
/// let mut dispatcher = Dispatcher::new(Topology::default());
/// dispatcher.submit_named("A", "C", 0, RequestKind::Ordinary).unwrap();
/// dispatcher.submit_named("B", "D", 0, RequestKind::Ordinary).unwrap();
///
/// let report = dispatcher.run();
/// assert_eq!(report.completed, 2);
/// assert_eq!(dispatcher.average_travel_time().unwrap(), 2.0);
/// ```
pub struct Dispatcher<S = NullSink> {
    topology: Topology,
    rule: Arc<dyn PriorityRule>,
    time_skip: bool,
    clock: Tick,
    vehicle: Vehicle,
    intake: Vec<Request>,
    pool: PendingPool,
    target: Option<OrdinaryTarget>,
    /// Emergency in control and its admission sequence number.
    controlling: Option<(RequestId, u64)>,
    completed: Vec<Request>,
    stats: StatsAggregator,
    sink: S,
    next_id: u64,
    preemptions: u64,
    finished: bool,
}

impl Dispatcher<NullSink> {
    /// Creates a dispatcher with the vehicle parked at the first stop,
    /// destination-distance priorities and time skipping enabled.
    pub fn new(topology: Topology) -> Self {
        let start = topology.first();
        Self {
            topology,
            rule: Arc::new(rules::DestinationDistance),
            time_skip: true,
            clock: 0,
            vehicle: Vehicle::at(start),
            intake: Vec::new(),
            pool: PendingPool::new(),
            target: None,
            controlling: None,
            completed: Vec::new(),
            stats: StatsAggregator::new(),
            sink: NullSink,
            next_id: 0,
            preemptions: 0,
            finished: false,
        }
    }

    /// Creates a dispatcher from a validated configuration.
    pub fn from_config(config: &DispatcherConfig) -> DispatchResult<Self> {
        let topology = config.topology()?;
        Ok(Self::new(topology)
            .with_shared_rule(config.priority_rule.build())
            .with_time_skip(config.time_skip))
    }
}

impl<S: EventSink> Dispatcher<S> {
    /// Replaces the event sink.
    pub fn with_sink<T: EventSink>(self, sink: T) -> Dispatcher<T> {
        Dispatcher {
            topology: self.topology,
            rule: self.rule,
            time_skip: self.time_skip,
            clock: self.clock,
            vehicle: self.vehicle,
            intake: self.intake,
            pool: self.pool,
            target: self.target,
            controlling: self.controlling,
            completed: self.completed,
            stats: self.stats,
            sink,
            next_id: self.next_id,
            preemptions: self.preemptions,
            finished: self.finished,
        }
    }

    /// Sets the priority rule for ordinary requests.
    pub fn with_priority_rule<R: PriorityRule + 'static>(self, rule: R) -> Self {
        self.with_shared_rule(Arc::new(rule))
    }

    /// Sets an already shared priority rule.
    pub fn with_shared_rule(mut self, rule: Arc<dyn PriorityRule>) -> Self {
        self.rule = rule;
        self
    }

    /// Enables or disables jumping the clock over idle stretches.
    pub fn with_time_skip(mut self, enabled: bool) -> Self {
        self.time_skip = enabled;
        self
    }

    // ======================== Intake ========================

    /// Submits a request.
    ///
    /// Rejects unknown stops (`InvalidStop`) and `origin == destination`
    /// (`SameStop`). Rejected requests never reach the pool and do not
    /// consume an id.
    pub fn submit(
        &mut self,
        origin: StopId,
        destination: StopId,
        submit_time: Tick,
        kind: RequestKind,
    ) -> DispatchResult<RequestId> {
        if let Err(err) = validation::check_request(&self.topology, origin, destination) {
            warn!(%origin, %destination, submit_time, error = %err, "request rejected");
            return Err(err);
        }

        let id = RequestId::new(self.next_id);
        self.next_id += 1;
        self.intake
            .push(Request::new(id, kind, origin, destination, submit_time));
        self.finished = false;

        debug!(
            request = %id,
            ?kind,
            origin = %self.topology.label(origin),
            destination = %self.topology.label(destination),
            submit_time,
            "request submitted"
        );
        Ok(id)
    }

    /// Submits a request by stop names.
    pub fn submit_named(
        &mut self,
        origin: &str,
        destination: &str,
        submit_time: Tick,
        kind: RequestKind,
    ) -> DispatchResult<RequestId> {
        let resolved = self
            .topology
            .stop(origin)
            .and_then(|o| Ok((o, self.topology.stop(destination)?)));
        match resolved {
            Ok((o, d)) => self.submit(o, d, submit_time, kind),
            Err(err) => {
                warn!(origin, destination, submit_time, error = %err, "request rejected");
                Err(err)
            }
        }
    }

    /// Submits a request described by a [`RequestSpec`].
    pub fn submit_spec(&mut self, spec: &RequestSpec) -> DispatchResult<RequestId> {
        self.submit_named(&spec.origin, &spec.destination, spec.submit_time, spec.kind())
    }

    // ======================== Simulation ========================

    /// Runs one tick of the state machine.
    pub fn step(&mut self) -> TickOutcome {
        if self.finished {
            return TickOutcome::Finished;
        }

        self.alight();
        self.admit();
        self.board();

        if self.is_drained() {
            self.finished = true;
            self.controlling = None;
            let here = self.vehicle.location;
            self.emit(SimEvent::new(SimEventKind::SimulationComplete, self.clock, here));
            info!(
                tick = self.clock,
                completed = self.completed.len(),
                average_travel_time = self.stats.average_travel_time(),
                "simulation complete"
            );
            return TickOutcome::Finished;
        }

        let target = match self.emergency_target() {
            Some(stop) => Some(stop),
            None => self.ordinary_target(),
        };

        match target {
            Some(stop) => self.move_towards(stop),
            None => self.idle(),
        }
    }

    /// Steps until the terminal state and returns the report.
    pub fn run(&mut self) -> SimulationReport {
        while self.step() != TickOutcome::Finished {}
        self.build_report()
    }

    /// Runs and hands back the sink together with the report.
    pub fn finish(mut self) -> (SimulationReport, S) {
        let report = self.run();
        (report, self.sink)
    }

    // ======================== Reports ========================

    /// Mean travel time of completed requests. Only available once finished.
    pub fn average_travel_time(&self) -> DispatchResult<f64> {
        if self.finished {
            Ok(self.stats.average_travel_time())
        } else {
            Err(DispatchError::SimulationRunning)
        }
    }

    /// Full report. Only available once finished.
    pub fn report(&self) -> DispatchResult<SimulationReport> {
        if self.finished {
            Ok(self.build_report())
        } else {
            Err(DispatchError::SimulationRunning)
        }
    }

    /// Request counts by lifecycle position.
    pub fn snapshot(&self) -> Snapshot {
        let assigned = usize::from(matches!(self.target, Some(OrdinaryTarget::Pickup(_))));
        Snapshot {
            tick: self.clock,
            location: self.vehicle.location,
            intake: self.intake.len(),
            pending_ordinary: self.pool.ordinary_len() + assigned,
            pending_emergency: self.pool.emergency_len(),
            onboard: self.vehicle.onboard.len(),
            completed: self.completed.len(),
            submitted: self.next_id as usize,
        }
    }

    // ======================== Accessors ========================

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn clock(&self) -> Tick {
        self.clock
    }

    pub fn location(&self) -> StopId {
        self.vehicle.location
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    pub fn pool(&self) -> &PendingPool {
        &self.pool
    }

    pub fn completed(&self) -> &[Request] {
        &self.completed
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn priority_rule(&self) -> &dyn PriorityRule {
        self.rule.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Looks a request up wherever it currently is.
    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.intake
            .iter()
            .chain(self.pool.ordinary())
            .chain(self.pool.emergencies().iter())
            .chain(self.vehicle.onboard.iter())
            .chain(self.completed.iter())
            .chain(match &self.target {
                Some(OrdinaryTarget::Pickup(r)) => Some(r),
                _ => None,
            })
            .find(|r| r.id == id)
    }

    // ======================== Tick phases ========================

    fn alight(&mut self) {
        let now = self.clock;
        let here = self.vehicle.location;

        for mut request in self.vehicle.take_arrivals() {
            let arrived = request.record_arrival(now);
            self.expect(arrived);
            let recorded = self.stats.record(&request);
            self.expect(recorded);

            if matches!(self.target, Some(OrdinaryTarget::Dropoff(id)) if id == request.id) {
                self.target = None;
            }

            debug!(
                tick = now,
                request = %request.id,
                stop = %self.topology.label(here),
                travel_time = request.travel_time(),
                "alighted"
            );
            self.emit(SimEvent::new(SimEventKind::Alighted, now, here).with_request(request.id));
            self.completed.push(request);
        }
    }

    fn admit(&mut self) {
        let now = self.clock;
        if !self.intake.iter().any(|r| r.is_eligible(now)) {
            return;
        }

        let (mut ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.intake)
            .into_iter()
            .partition(|r| r.is_eligible(now));
        self.intake = waiting;
        ready.sort_by_key(|r| (r.submit_time, r.id));

        let context = DispatchContext::new(&self.topology, self.vehicle.location);
        for mut request in ready {
            let id = request.id;
            let admitted = match request.kind {
                RequestKind::Ordinary => {
                    let priority = self.rule.evaluate(&request, &context);
                    request.priority = Some(priority);
                    self.pool.submit_ordinary(request)
                }
                RequestKind::Emergency => self.pool.submit_emergency(request),
            };
            self.expect(admitted);
            debug!(tick = now, request = %id, "admitted");
        }
    }

    fn board(&mut self) {
        let now = self.clock;
        let here = self.vehicle.location;

        let mut boarding = self.pool.take_boardable(here, now);
        let pickup_here = matches!(
            &self.target,
            Some(OrdinaryTarget::Pickup(r)) if r.origin == here && r.is_eligible(now)
        );
        if pickup_here {
            if let Some(OrdinaryTarget::Pickup(request)) = self.target.take() {
                self.target = Some(OrdinaryTarget::Dropoff(request.id));
                boarding.push(request);
            }
        }

        for mut request in boarding {
            let boarded = request.record_boarding(now);
            self.expect(boarded);
            debug!(
                tick = now,
                request = %request.id,
                kind = ?request.kind,
                stop = %self.topology.label(here),
                "boarded"
            );
            self.emit(SimEvent::new(SimEventKind::Boarded, now, here).with_request(request.id));
            self.vehicle.board(request);
        }
    }

    /// Stop the newest active emergency wants to reach, if any.
    fn emergency_target(&mut self) -> Option<StopId> {
        let pending = self
            .pool
            .peek_emergency(self.clock)
            .map(|e| (e.admission_seq.unwrap_or(0), e.id, e.origin));
        let riding = self
            .vehicle
            .emergencies()
            .max_by_key(|e| e.admission_seq)
            .map(|e| (e.admission_seq.unwrap_or(0), e.id, e.destination));

        let (seq, id, stop) = match (pending, riding) {
            (Some(p), Some(r)) => {
                if p.0 > r.0 {
                    p
                } else {
                    r
                }
            }
            (Some(p), None) => p,
            (None, Some(r)) => r,
            (None, None) => {
                self.controlling = None;
                return None;
            }
        };

        if self.controlling.map(|(held, _)| held) != Some(id) {
            // A resumed older emergency or an idle vehicle is not a preemption.
            let preempts = match self.controlling {
                Some((_, held_seq)) => seq > held_seq,
                None => self.has_ordinary_work(),
            };
            self.controlling = Some((id, seq));
            debug!(tick = self.clock, request = %id, preempts, "emergency takes control");
            if preempts {
                self.preemptions += 1;
                let here = self.vehicle.location;
                self.emit(SimEvent::new(SimEventKind::Preempted, self.clock, here).with_request(id));
            }
        }
        Some(stop)
    }

    /// Stop the current ordinary work wants to reach, if any.
    fn ordinary_target(&mut self) -> Option<StopId> {
        if self.target.is_none() {
            self.target = self.next_ordinary_target();
            // Already standing at the new pickup: board now, not next tick.
            self.board();
        }

        match &self.target {
            Some(OrdinaryTarget::Pickup(request)) => Some(request.origin),
            Some(OrdinaryTarget::Dropoff(id)) => {
                let id = *id;
                match self.vehicle.rider(id) {
                    Some(rider) => Some(rider.destination),
                    None => self.abort(&DispatchError::invariant(
                        Some(id),
                        "drop-off target is not onboard",
                    )),
                }
            }
            None => None,
        }
    }

    fn next_ordinary_target(&mut self) -> Option<OrdinaryTarget> {
        let context = DispatchContext::new(&self.topology, self.vehicle.location);
        let best_rider = self
            .vehicle
            .ordinary_riders()
            .min_by_key(|r| (self.rule.evaluate(r, &context), r.submit_time, r.id))
            .map(|r| r.id);

        if let Some(id) = best_rider {
            return Some(OrdinaryTarget::Dropoff(id));
        }
        let next = self.pool.pop_ordinary()?;
        debug!(
            tick = self.clock,
            request = %next.id,
            priority = next.priority,
            "assigned pickup"
        );
        Some(OrdinaryTarget::Pickup(next))
    }

    fn move_towards(&mut self, target: StopId) -> TickOutcome {
        let from = self.vehicle.location;
        let step = self.topology.neighbor(from, target);
        let to = self.expect(step);
        if to == from {
            self.abort(&DispatchError::invariant(
                None,
                format!("asked to move toward the current stop {from}"),
            ));
        }

        self.vehicle.advance_to(to);
        self.clock += from.index().abs_diff(to.index()) as Tick;
        debug!(
            tick = self.clock,
            from = %self.topology.label(from),
            to = %self.topology.label(to),
            "vehicle moved"
        );
        self.emit(SimEvent::new(SimEventKind::VehicleMoved, self.clock, to));
        self.reprioritize();
        TickOutcome::Moved { from, to }
    }

    fn idle(&mut self) -> TickOutcome {
        let now = self.clock;
        let Some(next) = self.intake.iter().map(|r| r.submit_time).min() else {
            self.abort(&DispatchError::invariant(
                None,
                "idle with an empty intake but not drained",
            ));
        };

        if self.time_skip && next > now {
            self.clock = next;
            debug!(from = now, to = next, "clock skipped");
            let here = self.vehicle.location;
            self.emit(SimEvent::new(SimEventKind::ClockSkipped, next, here));
            TickOutcome::Skipped { from: now, to: next }
        } else {
            self.clock += 1;
            TickOutcome::Waited
        }
    }

    fn reprioritize(&mut self) {
        let context = DispatchContext::new(&self.topology, self.vehicle.location);
        self.pool.reprioritize(self.rule.as_ref(), &context);
        if let Some(OrdinaryTarget::Pickup(request)) = &mut self.target {
            request.priority = Some(self.rule.evaluate(request, &context));
        }
    }

    // ======================== Helpers ========================

    /// Ordinary service an emergency would interrupt.
    fn has_ordinary_work(&self) -> bool {
        self.target.is_some()
            || self.pool.ordinary_len() > 0
            || self.vehicle.ordinary_riders().next().is_some()
    }

    fn is_drained(&self) -> bool {
        self.intake.is_empty() && self.pool.is_empty() && self.target.is_none() && self.vehicle.is_empty()
    }

    fn emit(&mut self, event: SimEvent) {
        self.sink.on_event(&event);
    }

    fn build_report(&self) -> SimulationReport {
        SimulationReport::from_stats(
            &self.stats,
            self.clock,
            self.vehicle.distance_travelled,
            self.preemptions,
        )
    }

    fn expect<T>(&self, result: DispatchResult<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => self.abort(&err),
        }
    }

    /// Logs the full state and aborts the simulation.
    fn abort(&self, err: &DispatchError) -> ! {
        let dump = format!(
            "{:#?}\ntarget: {:#?}\nvehicle: {:#?}\npool: {:#?}\nintake: {:#?}",
            self.snapshot(),
            self.target,
            self.vehicle,
            self.pool,
            self.intake
        );
        error!(error = %err, state = %dump, "dispatcher invariant violated");
        panic!("dispatcher invariant violated: {err}\n{dump}");
    }
}

impl<S> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("rule", &self.rule.name())
            .field("clock", &self.clock)
            .field("location", &self.vehicle.location)
            .field("intake", &self.intake.len())
            .field("pending", &self.pool.len())
            .field("onboard", &self.vehicle.onboard.len())
            .field("completed", &self.completed.len())
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::rules::{DestinationDistance, SubmitOrder};
    use crate::events::EventLog;
    use crate::generator::{GeneratorConfig, RequestGenerator};

    fn line() -> Dispatcher<EventLog> {
        Dispatcher::new(Topology::default()).with_sink(EventLog::new())
    }

    fn ordinary<S: EventSink>(d: &mut Dispatcher<S>, from: &str, to: &str, at: Tick) -> RequestId {
        d.submit_named(from, to, at, RequestKind::Ordinary).unwrap()
    }

    fn emergency<S: EventSink>(d: &mut Dispatcher<S>, from: &str, to: &str, at: Tick) -> RequestId {
        d.submit_named(from, to, at, RequestKind::Emergency).unwrap()
    }

    fn arrival<S: EventSink>(d: &Dispatcher<S>, id: RequestId) -> Tick {
        d.request(id).and_then(|r| r.arrival_time).unwrap()
    }

    fn preempted(d: &Dispatcher<EventLog>) -> Vec<(Tick, Option<RequestId>)> {
        d.sink()
            .of_kind(SimEventKind::Preempted)
            .map(|e| (e.tick, e.request))
            .collect()
    }

    fn names<S: EventSink>(d: &Dispatcher<S>, stops: &[StopId]) -> Vec<String> {
        stops.iter().map(|&s| d.topology().label(s)).collect()
    }

    #[test]
    fn test_two_ordinary_reference_run() {
        let mut d = line();
        let ac = ordinary(&mut d, "A", "C", 0);
        let bd = ordinary(&mut d, "B", "D", 0);

        let report = d.run();

        let first = d.request(ac).unwrap();
        assert_eq!((first.board_time, first.arrival_time), (Some(0), Some(2)));
        let second = d.request(bd).unwrap();
        assert_eq!((second.board_time, second.arrival_time), (Some(1), Some(3)));

        assert_eq!(report.completed, 2);
        assert_eq!(report.final_tick, 3);
        assert_eq!(report.distance_travelled, 3);
        assert_eq!(d.average_travel_time().unwrap(), 2.0);
        assert!((report.average_wait_time - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_reference_run_event_order() {
        let mut d = line();
        let ac = ordinary(&mut d, "A", "C", 0);
        let bd = ordinary(&mut d, "B", "D", 0);
        let (_, log) = d.finish();

        let observed: Vec<(SimEventKind, Tick, usize, Option<RequestId>)> = log
            .events
            .iter()
            .map(|e| (e.kind, e.tick, e.stop.index(), e.request))
            .collect();
        assert_eq!(
            observed,
            vec![
                (SimEventKind::Boarded, 0, 0, Some(ac)),
                (SimEventKind::VehicleMoved, 1, 1, None),
                (SimEventKind::Boarded, 1, 1, Some(bd)),
                (SimEventKind::VehicleMoved, 2, 2, None),
                (SimEventKind::Alighted, 2, 2, Some(ac)),
                (SimEventKind::VehicleMoved, 3, 3, None),
                (SimEventKind::Alighted, 3, 3, Some(bd)),
                (SimEventKind::SimulationComplete, 3, 3, None),
            ]
        );
    }

    #[test]
    fn test_priorities_track_every_move() {
        let mut d = line();
        ordinary(&mut d, "D", "A", 0);
        ordinary(&mut d, "C", "B", 0);
        ordinary(&mut d, "B", "D", 2);
        ordinary(&mut d, "D", "C", 3);
        ordinary(&mut d, "A", "C", 4);

        let mut moves = 0;
        loop {
            match d.step() {
                TickOutcome::Finished => break,
                TickOutcome::Moved { to, .. } => {
                    moves += 1;
                    for r in d.pool().ordinary() {
                        let expected = to.index().abs_diff(r.destination.index()) as i64;
                        assert_eq!(r.priority, Some(expected), "request {}", r.id);
                    }
                }
                _ => {}
            }
        }
        assert!(moves > 0);
        assert_eq!(d.completed().len(), 5);
    }

    #[test]
    fn test_lifo_emergencies() {
        let mut d = line();
        let e1 = emergency(&mut d, "C", "D", 1);
        let e2 = emergency(&mut d, "C", "A", 2);

        let report = d.run();

        // Both board at C on tick 3; the newer one is driven home first.
        assert_eq!(d.request(e1).unwrap().board_time, Some(3));
        assert_eq!(d.request(e2).unwrap().board_time, Some(3));
        assert_eq!(arrival(&d, e2), 5);
        assert_eq!(arrival(&d, e1), 8);
        assert_eq!(
            names(&d, &d.sink().route()),
            vec!["B", "C", "B", "A", "B", "C", "D"]
        );
        // E1 takes an idle vehicle; only E2 interrupts anything.
        assert_eq!(preempted(&d), vec![(2, Some(e2))]);
        assert_eq!(report.preemptions, 1);
    }

    #[test]
    fn test_newer_emergency_preempts_onboard_one() {
        let mut d = line();
        let old = emergency(&mut d, "B", "D", 1);
        let new = emergency(&mut d, "C", "A", 2);

        let report = d.run();

        assert_eq!(d.request(old).unwrap().board_time, Some(2));
        assert_eq!(arrival(&d, new), 5);
        assert_eq!(arrival(&d, old), 8);
        // Handing control back to the older emergency at tick 5 is a resume.
        assert_eq!(preempted(&d), vec![(2, Some(new))]);
        assert_eq!(report.preemptions, 1);
    }

    #[test]
    fn test_stream_of_emergencies_starves_oldest() {
        let mut d = Dispatcher::new(Topology::new(["A", "B", "C", "D", "E"]).unwrap())
            .with_sink(EventLog::new());
        let oldest = emergency(&mut d, "B", "A", 1);
        let e1 = emergency(&mut d, "C", "D", 2);
        let e2 = emergency(&mut d, "D", "E", 3);
        let e3 = emergency(&mut d, "E", "C", 5);

        let report = d.run();

        assert_eq!(d.request(oldest).unwrap().board_time, Some(2));
        assert_eq!(arrival(&d, e1), 4);
        assert_eq!(arrival(&d, e2), 5);
        assert_eq!(arrival(&d, e3), 7);
        assert_eq!(arrival(&d, oldest), 9);
        assert!(d
            .completed()
            .iter()
            .all(|r| r.arrival_time <= Some(arrival(&d, oldest))));
        assert_eq!(
            preempted(&d),
            vec![(2, Some(e1)), (3, Some(e2)), (5, Some(e3))]
        );
        assert_eq!(report.preemptions, 3);
    }

    #[test]
    fn test_lone_emergency_is_not_a_preemption() {
        let mut d = line();
        let only = emergency(&mut d, "B", "C", 1);

        let report = d.run();

        assert_eq!(arrival(&d, only), 3);
        assert!(preempted(&d).is_empty());
        assert_eq!(report.preemptions, 0);
    }

    #[test]
    fn test_assigned_pickup_priority_follows_vehicle() {
        let mut d = line();
        let far = ordinary(&mut d, "D", "A", 0);

        d.step();
        d.step();

        assert_eq!(d.location(), d.topology().stop("C").unwrap());
        assert_eq!(d.snapshot().pending_ordinary, 1);
        assert_eq!(d.request(far).unwrap().priority, Some(2));
    }

    #[test]
    fn test_emergency_interrupts_ordinary_trip() {
        let mut d = line();
        let rider = ordinary(&mut d, "A", "D", 0);
        let urgent = emergency(&mut d, "C", "A", 1);

        let report = d.run();

        assert_eq!(d.request(urgent).unwrap().board_time, Some(2));
        assert_eq!(arrival(&d, urgent), 4);
        assert_eq!(arrival(&d, rider), 7);
        assert_eq!(
            names(&d, &d.sink().route()),
            vec!["B", "C", "B", "A", "B", "C", "D"]
        );
        assert_eq!(report.preemptions, 1);
        assert_eq!(report.emergency.count, 1);
        assert!((report.emergency.average_travel_time() - 2.0).abs() < 1e-10);
        assert!((report.ordinary.average_travel_time() - 7.0).abs() < 1e-10);
    }

    #[test]
    fn test_destination_rule_order() {
        let mut d = Dispatcher::new(Topology::default()).with_priority_rule(DestinationDistance);
        let dc = ordinary(&mut d, "D", "C", 0);
        let ba = ordinary(&mut d, "B", "A", 0);
        d.run();
        assert_eq!(arrival(&d, ba), 2);
        assert_eq!(arrival(&d, dc), 6);
    }

    #[test]
    fn test_submit_order_rule() {
        let mut d = Dispatcher::new(Topology::default()).with_priority_rule(SubmitOrder);
        let dc = ordinary(&mut d, "D", "C", 0);
        let ba = ordinary(&mut d, "B", "A", 0);
        d.run();
        // B→A is picked up on the way to D and dropped last.
        assert_eq!(d.request(ba).unwrap().board_time, Some(1));
        assert_eq!(arrival(&d, dc), 4);
        assert_eq!(arrival(&d, ba), 6);
    }

    #[test]
    fn test_idle_skip_lands_exactly() {
        let mut d = line();
        let late = ordinary(&mut d, "A", "B", 50);

        assert_eq!(d.step(), TickOutcome::Skipped { from: 0, to: 50 });
        assert_eq!(d.clock(), 50);

        d.run();
        assert_eq!(d.request(late).unwrap().board_time, Some(50));
        assert_eq!(arrival(&d, late), 51);
        assert_eq!(d.sink().of_kind(SimEventKind::ClockSkipped).count(), 1);
    }

    #[test]
    fn test_idle_skip_after_service() {
        let mut d = line();
        ordinary(&mut d, "A", "B", 0);
        let later = ordinary(&mut d, "C", "D", 5);

        assert!(matches!(d.step(), TickOutcome::Moved { .. }));
        assert_eq!(d.step(), TickOutcome::Skipped { from: 1, to: 5 });
        d.run();
        assert_eq!(d.request(later).unwrap().board_time, Some(6));
        assert_eq!(arrival(&d, later), 7);
    }

    #[test]
    fn test_without_time_skip_ticks_one_by_one() {
        let mut d = line().with_time_skip(false);
        ordinary(&mut d, "A", "B", 3);

        for expected in 1..=3 {
            assert_eq!(d.step(), TickOutcome::Waited);
            assert_eq!(d.clock(), expected);
        }
        assert!(matches!(d.step(), TickOutcome::Moved { .. }));
    }

    #[test]
    fn test_rejections_leave_state_untouched() {
        let mut d = line();
        assert!(matches!(
            d.submit_named("A", "A", 0, RequestKind::Ordinary),
            Err(DispatchError::SameStop(_))
        ));
        assert!(matches!(
            d.submit_named("A", "Z", 0, RequestKind::Emergency),
            Err(DispatchError::InvalidStop(_))
        ));
        assert!(matches!(
            d.submit(StopId::new(0), StopId::new(8), 0, RequestKind::Ordinary),
            Err(DispatchError::InvalidStop(_))
        ));

        let snapshot = d.snapshot();
        assert_eq!(snapshot.submitted, 0);
        assert_eq!(snapshot.intake, 0);
        assert!(d.pool().is_empty());

        // Rejections do not consume ids.
        let id = ordinary(&mut d, "A", "B", 0);
        assert_eq!(id, RequestId::new(0));
    }

    #[test]
    fn test_report_only_after_finish() {
        let mut d = line();
        ordinary(&mut d, "A", "B", 0);
        assert_eq!(d.average_travel_time(), Err(DispatchError::SimulationRunning));
        assert!(d.report().is_err());
        d.run();
        assert!(d.is_finished());
        assert_eq!(d.report().unwrap().completed, 1);
    }

    #[test]
    fn test_empty_dispatcher_finishes_immediately() {
        let mut d = line();
        assert_eq!(d.step(), TickOutcome::Finished);
        assert_eq!(d.average_travel_time().unwrap(), 0.0);
        assert_eq!(d.sink().len(), 1);
        // Finished is sticky and emitted once.
        assert_eq!(d.step(), TickOutcome::Finished);
        assert_eq!(d.sink().len(), 1);
    }

    #[test]
    fn test_submission_after_finish_resumes() {
        let mut d = line();
        ordinary(&mut d, "A", "B", 0);
        d.run();
        let again = ordinary(&mut d, "B", "C", 0);
        assert!(!d.is_finished());
        d.run();
        assert_eq!(d.completed().len(), 2);
        assert_eq!(arrival(&d, again), 2);
    }

    #[test]
    fn test_conservation_and_single_completion() {
        let topology = Topology::new(["A", "B", "C", "D", "E", "F"]).unwrap();
        let config = GeneratorConfig {
            count: 60,
            horizon: 40,
            emergency_rate: 0.25,
            seed: 2024,
        };
        let specs = RequestGenerator::new(&topology, config).unwrap().generate();

        let mut d = Dispatcher::new(topology.clone()).with_sink(EventLog::new());
        for spec in &specs {
            d.submit_spec(spec).unwrap();
        }

        loop {
            assert!(d.snapshot().is_conserved(), "{:?}", d.snapshot());
            if d.step() == TickOutcome::Finished {
                break;
            }
        }

        assert_eq!(d.completed().len(), specs.len());
        for r in d.completed() {
            let (board, arrive) = (r.board_time.unwrap(), r.arrival_time.unwrap());
            assert!(r.submit_time <= board && board <= arrive);
            let boarded = d
                .sink()
                .for_request(r.id)
                .filter(|e| e.kind == SimEventKind::Boarded)
                .count();
            let alighted = d
                .sink()
                .for_request(r.id)
                .filter(|e| e.kind == SimEventKind::Alighted)
                .count();
            assert_eq!((boarded, alighted), (1, 1));
        }
        assert_eq!(d.stats().count(), specs.len() as u64);
    }

    #[test]
    fn test_deterministic_replay() {
        let topology = Topology::default();
        let specs = RequestGenerator::new(&topology, GeneratorConfig::default())
            .unwrap()
            .generate();
        let run = || {
            let mut d = Dispatcher::new(Topology::default());
            for spec in &specs {
                d.submit_spec(spec).unwrap();
            }
            d.run()
        };
        assert_eq!(run(), run());
    }

    #[test]
    #[should_panic(expected = "dispatcher invariant violated")]
    fn test_corrupted_state_aborts() {
        let mut d = line();
        ordinary(&mut d, "C", "D", 9);
        d.target = Some(OrdinaryTarget::Dropoff(RequestId::new(99)));
        d.step();
    }
}
