//! Pending request pool.
//!
//! Holds admitted requests that have not boarded yet, in two disjoint
//! collections:
//!
//! - an ordinary min-queue keyed by `(priority, submit_time, id)`, rebuilt
//!   whenever priorities change;
//! - an emergency stack served strictly last-in, first-out.
//!
//! # Complexity
//! Push/pop are O(log n). `reprioritize` and `take_boardable` rebuild the
//! heap in O(n), which is fine for a handful of stops and riders.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{DispatchContext, PriorityRule};
use crate::error::{DispatchError, DispatchResult};
use crate::models::{Priority, Request, RequestId, StopId, Tick};

/// Heap entry ordered so that `BinaryHeap` pops the minimum key.
#[derive(Debug, Clone)]
struct Queued(Request);

impl Queued {
    fn key(&self) -> (Priority, Tick, RequestId) {
        (
            self.0.priority.unwrap_or(Priority::MAX),
            self.0.submit_time,
            self.0.id,
        )
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// LIFO stack of pending emergencies.
#[derive(Debug, Clone, Default)]
pub struct EmergencyStack {
    items: Vec<Request>,
}

impl EmergencyStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: Request) {
        self.items.push(request);
    }

    pub fn peek(&self) -> Option<&Request> {
        self.items.last()
    }

    pub fn pop(&mut self) -> Option<Request> {
        self.items.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.items.iter()
    }

    /// Removes every entry matching `pred`, preserving the order of the rest.
    fn extract_where(&mut self, mut pred: impl FnMut(&Request) -> bool) -> Vec<Request> {
        let (taken, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.items).into_iter().partition(|r| pred(r));
        self.items = kept;
        taken
    }
}

/// Requests admitted by the dispatcher but not yet onboard.
#[derive(Debug, Clone, Default)]
pub struct PendingPool {
    ordinary: BinaryHeap<Queued>,
    emergencies: EmergencyStack,
    next_seq: u64,
}

impl PendingPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an ordinary request. Its priority must already be set.
    pub fn submit_ordinary(&mut self, mut request: Request) -> DispatchResult<()> {
        if request.is_emergency() {
            return Err(DispatchError::invariant(
                Some(request.id),
                "emergency submitted to the ordinary queue",
            ));
        }
        if request.priority.is_none() {
            return Err(DispatchError::invariant(
                Some(request.id),
                "ordinary request queued without a priority",
            ));
        }
        request.admission_seq = Some(self.take_seq());
        self.ordinary.push(Queued(request));
        Ok(())
    }

    /// Pushes an emergency onto the stack.
    pub fn submit_emergency(&mut self, mut request: Request) -> DispatchResult<()> {
        if !request.is_emergency() {
            return Err(DispatchError::invariant(
                Some(request.id),
                "ordinary request pushed onto the emergency stack",
            ));
        }
        request.priority = None;
        request.admission_seq = Some(self.take_seq());
        self.emergencies.push(request);
        Ok(())
    }

    /// Top of the emergency stack, if it is eligible at `now`.
    pub fn peek_emergency(&self, now: Tick) -> Option<&Request> {
        self.emergencies.peek().filter(|e| e.is_eligible(now))
    }

    /// Pops the top emergency, if it is eligible at `now`.
    pub fn pop_emergency(&mut self, now: Tick) -> Option<Request> {
        self.peek_emergency(now)?;
        self.emergencies.pop()
    }

    /// Minimum ordinary request under the current priorities.
    pub fn peek_ordinary(&self) -> Option<&Request> {
        self.ordinary.peek().map(|q| &q.0)
    }

    /// Extracts the minimum ordinary request under the current priorities.
    pub fn pop_ordinary(&mut self) -> Option<Request> {
        self.ordinary.pop().map(|q| q.0)
    }

    /// Recomputes every ordinary priority with `rule` and rebuilds the queue.
    pub fn reprioritize(&mut self, rule: &dyn PriorityRule, context: &DispatchContext<'_>) {
        let mut entries = std::mem::take(&mut self.ordinary).into_vec();
        for entry in &mut entries {
            entry.0.priority = Some(rule.evaluate(&entry.0, context));
        }
        self.ordinary = BinaryHeap::from(entries);
    }

    /// Whether any ordinary request is eligible at `now`.
    pub fn has_eligible(&self, now: Tick) -> bool {
        self.ordinary.iter().any(|q| q.0.is_eligible(now))
    }

    /// Removes every eligible request whose origin is `stop`.
    ///
    /// Emergencies come first (bottom to top), then ordinary requests in
    /// queue order.
    pub fn take_boardable(&mut self, stop: StopId, now: Tick) -> Vec<Request> {
        let boardable = |r: &Request| r.origin == stop && r.is_eligible(now);

        let mut taken = self.emergencies.extract_where(boardable);

        if self.ordinary.iter().any(|q| boardable(&q.0)) {
            let (mut hits, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.ordinary)
                .into_vec()
                .into_iter()
                .partition(|q| boardable(&q.0));
            hits.sort_by(|a, b| b.cmp(a));
            self.ordinary = BinaryHeap::from(kept);
            taken.extend(hits.into_iter().map(|q| q.0));
        }

        taken
    }

    /// Pending ordinary requests in service order.
    pub fn ordinary_in_order(&self) -> Vec<&Request> {
        let mut entries: Vec<&Queued> = self.ordinary.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|q| &q.0).collect()
    }

    /// Pending ordinary requests, unordered.
    pub fn ordinary(&self) -> impl Iterator<Item = &Request> {
        self.ordinary.iter().map(|q| &q.0)
    }

    /// The emergency stack.
    pub fn emergencies(&self) -> &EmergencyStack {
        &self.emergencies
    }

    pub fn ordinary_len(&self) -> usize {
        self.ordinary.len()
    }

    pub fn emergency_len(&self) -> usize {
        self.emergencies.len()
    }

    pub fn len(&self) -> usize {
        self.ordinary_len() + self.emergency_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinary.is_empty() && self.emergencies.is_empty()
    }

    /// Whether `id` is pending in either collection.
    pub fn contains(&self, id: RequestId) -> bool {
        self.ordinary.iter().any(|q| q.0.id == id) || self.emergencies.iter().any(|r| r.id == id)
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::rules::DestinationDistance;
    use crate::models::Topology;

    fn ordinary(id: u64, origin: usize, destination: usize, submit: u64, priority: i64) -> Request {
        Request::ordinary(
            RequestId::new(id),
            StopId::new(origin),
            StopId::new(destination),
            submit,
        )
        .with_priority(priority)
    }

    fn emergency(id: u64, origin: usize, destination: usize, submit: u64) -> Request {
        Request::emergency(
            RequestId::new(id),
            StopId::new(origin),
            StopId::new(destination),
            submit,
        )
    }

    #[test]
    fn test_pop_ordinary_min_priority() {
        let mut pool = PendingPool::new();
        pool.submit_ordinary(ordinary(0, 0, 3, 0, 3)).unwrap();
        pool.submit_ordinary(ordinary(1, 0, 1, 0, 1)).unwrap();
        pool.submit_ordinary(ordinary(2, 0, 2, 0, 2)).unwrap();

        let order: Vec<u64> = std::iter::from_fn(|| pool.pop_ordinary())
            .map(|r| r.id.get())
            .collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_tie_broken_by_submit_time_then_id() {
        let mut pool = PendingPool::new();
        pool.submit_ordinary(ordinary(5, 0, 2, 4, 2)).unwrap();
        pool.submit_ordinary(ordinary(3, 0, 2, 1, 2)).unwrap();
        pool.submit_ordinary(ordinary(1, 0, 2, 4, 2)).unwrap();

        let order: Vec<u64> = pool.ordinary_in_order().iter().map(|r| r.id.get()).collect();
        assert_eq!(order, vec![3, 1, 5]);
        assert_eq!(pool.pop_ordinary().unwrap().id, RequestId::new(3));
    }

    #[test]
    fn test_ordinary_requires_priority() {
        let mut pool = PendingPool::new();
        let unprioritized = Request::ordinary(RequestId::new(0), StopId::new(0), StopId::new(1), 0);
        assert!(matches!(
            pool.submit_ordinary(unprioritized),
            Err(DispatchError::InvariantViolation { .. })
        ));
        assert!(pool.submit_ordinary(emergency(1, 0, 1, 0)).is_err());
        assert!(pool.submit_emergency(ordinary(2, 0, 1, 0, 1)).is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_emergency_lifo() {
        let mut pool = PendingPool::new();
        pool.submit_emergency(emergency(0, 0, 1, 1)).unwrap();
        pool.submit_emergency(emergency(1, 0, 2, 2)).unwrap();

        assert_eq!(pool.pop_emergency(5).unwrap().id, RequestId::new(1));
        assert_eq!(pool.pop_emergency(5).unwrap().id, RequestId::new(0));
        assert!(pool.pop_emergency(5).is_none());
    }

    #[test]
    fn test_emergency_hidden_before_submit_time() {
        let mut pool = PendingPool::new();
        pool.submit_emergency(emergency(0, 0, 1, 10)).unwrap();
        assert!(pool.peek_emergency(9).is_none());
        assert!(pool.pop_emergency(9).is_none());
        assert_eq!(pool.emergency_len(), 1);
        assert_eq!(pool.peek_emergency(10).unwrap().id, RequestId::new(0));
    }

    #[test]
    fn test_reprioritize_reorders() {
        let topology = Topology::default();
        let mut pool = PendingPool::new();
        // Priorities as seen from A.
        pool.submit_ordinary(ordinary(0, 0, 1, 0, 1)).unwrap();
        pool.submit_ordinary(ordinary(1, 0, 3, 0, 3)).unwrap();

        let at_d = DispatchContext::new(&topology, StopId::new(3));
        pool.reprioritize(&DestinationDistance, &at_d);

        for r in pool.ordinary() {
            assert_eq!(r.priority, Some(r.destination.index().abs_diff(3) as i64));
        }
        assert_eq!(pool.peek_ordinary().unwrap().id, RequestId::new(1));
    }

    #[test]
    fn test_has_eligible() {
        let mut pool = PendingPool::new();
        assert!(!pool.has_eligible(0));
        pool.submit_ordinary(ordinary(0, 0, 1, 4, 1)).unwrap();
        assert!(!pool.has_eligible(3));
        assert!(pool.has_eligible(4));
    }

    #[test]
    fn test_take_boardable() {
        let mut pool = PendingPool::new();
        pool.submit_ordinary(ordinary(0, 1, 3, 0, 2)).unwrap();
        pool.submit_ordinary(ordinary(1, 0, 3, 0, 3)).unwrap();
        pool.submit_ordinary(ordinary(2, 1, 2, 0, 1)).unwrap();
        pool.submit_ordinary(ordinary(3, 1, 2, 9, 1)).unwrap();
        pool.submit_emergency(emergency(4, 1, 0, 0)).unwrap();
        pool.submit_emergency(emergency(5, 2, 0, 0)).unwrap();

        let taken: Vec<u64> = pool
            .take_boardable(StopId::new(1), 5)
            .iter()
            .map(|r| r.id.get())
            .collect();
        assert_eq!(taken, vec![4, 2, 0]);
        assert_eq!(pool.ordinary_len(), 2);
        assert_eq!(pool.emergency_len(), 1);
        assert!(pool.contains(RequestId::new(3)));
        assert!(!pool.contains(RequestId::new(0)));
        assert_eq!(pool.peek_ordinary().unwrap().id, RequestId::new(3));
    }

    #[test]
    fn test_admission_sequence() {
        let mut pool = PendingPool::new();
        pool.submit_emergency(emergency(0, 0, 1, 0)).unwrap();
        pool.submit_ordinary(ordinary(1, 0, 1, 0, 1)).unwrap();
        pool.submit_emergency(emergency(2, 0, 1, 0)).unwrap();
        let seqs: Vec<_> = pool.emergencies().iter().map(|r| r.admission_seq).collect();
        assert_eq!(seqs, vec![Some(0), Some(2)]);
        assert_eq!(pool.peek_ordinary().unwrap().admission_seq, Some(1));
    }
}
