//! Delay scheduling.
//!
//! Every parked token becomes a ticket in a single min-heap ordered by its
//! resume instant, with a sequence number keeping tickets that share an
//! instant in FIFO order. Cancelled tickets are dropped from the ticket map
//! and their heap entries are discarded lazily when they surface.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tokio::time::Instant;

use ruleflow_domain::error::ValidationError;
use ruleflow_domain::graph::{DelayData, NodeIndex};
use ruleflow_domain::id::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scheduled {
    resume_at: Instant,
    sequence: u64,
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: earliest instant first, then oldest sequence
        other
            .resume_at
            .cmp(&self.resume_at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug)]
struct DelayTicket<C> {
    run_id: RunId,
    node: NodeIndex,
    continuation: C,
}

/// Min-heap of parked continuations keyed by `(run, delay node)`.
#[derive(Debug)]
pub struct DelayScheduler<C> {
    heap: BinaryHeap<Scheduled>,
    tickets: HashMap<u64, DelayTicket<C>>,
    next_sequence: u64,
}

impl<C> Default for DelayScheduler<C> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            tickets: HashMap::new(),
            next_sequence: 0,
        }
    }
}

impl<C> DelayScheduler<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `continuation` until `now + delay`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for an unknown unit, a non-positive or
    /// non-finite duration, or a resume instant the clock cannot represent.
    /// Nothing is scheduled in that case.
    pub fn schedule(
        &mut self,
        run_id: RunId,
        node: NodeIndex,
        continuation: C,
        delay: &DelayData,
        now: Instant,
    ) -> Result<Instant, ValidationError> {
        let duration = delay.to_duration()?;
        let resume_at =
            now.checked_add(duration)
                .ok_or_else(|| ValidationError::DurationOverflow {
                    value: delay.duration,
                    unit: delay.unit.clone(),
                })?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Scheduled {
            resume_at,
            sequence,
        });
        self.tickets.insert(
            sequence,
            DelayTicket {
                run_id,
                node,
                continuation,
            },
        );
        Ok(resume_at)
    }

    /// Drop the tickets parked at `node` for `run_id`. Idempotent.
    pub fn cancel(&mut self, run_id: RunId, node: NodeIndex) -> usize {
        self.remove_where(|ticket| ticket.run_id == run_id && ticket.node == node)
    }

    /// Drop every ticket of `run_id`.
    pub fn cancel_run(&mut self, run_id: RunId) -> usize {
        self.remove_where(|ticket| ticket.run_id == run_id)
    }

    fn remove_where(&mut self, predicate: impl Fn(&DelayTicket<C>) -> bool) -> usize {
        let before = self.tickets.len();
        self.tickets.retain(|_, ticket| !predicate(ticket));
        before - self.tickets.len()
    }

    /// Remove and return, in resume order, every continuation due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Vec<C> {
        let mut due = Vec::new();
        while let Some(next) = self.heap.peek() {
            if next.resume_at > now {
                break;
            }
            let sequence = next.sequence;
            self.heap.pop();
            if let Some(ticket) = self.tickets.remove(&sequence) {
                due.push(ticket.continuation);
            }
        }
        due
    }

    /// Earliest resume instant still pending.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(next) = self.heap.peek() {
            if self.tickets.contains_key(&next.sequence) {
                return Some(next.resume_at);
            }
            self.heap.pop();
        }
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn delay(duration: f64, unit: &str) -> DelayData {
        DelayData {
            duration,
            unit: unit.to_string(),
        }
    }

    #[test]
    fn should_resume_five_seconds_later() {
        let mut scheduler = DelayScheduler::new();
        let now = Instant::now();

        let resume_at = scheduler
            .schedule(RunId::new(), NodeIndex::new(1), "a", &delay(5.0, "seconds"), now)
            .unwrap();

        assert_eq!(resume_at, now + Duration::from_secs(5));
        assert!(scheduler.pop_due(now + Duration::from_secs(4)).is_empty());
        assert_eq!(scheduler.pop_due(now + Duration::from_secs(5)), vec!["a"]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn should_convert_minutes_and_hours() {
        let mut scheduler = DelayScheduler::new();
        let now = Instant::now();
        let run = RunId::new();

        let minutes = scheduler
            .schedule(run, NodeIndex::new(1), 1, &delay(2.0, "minutes"), now)
            .unwrap();
        let hours = scheduler
            .schedule(run, NodeIndex::new(2), 2, &delay(0.5, "h"), now)
            .unwrap();

        assert_eq!(minutes, now + Duration::from_secs(120));
        assert_eq!(hours, now + Duration::from_secs(1800));
    }

    #[test]
    fn should_reject_zero_duration_without_scheduling() {
        let mut scheduler = DelayScheduler::new();

        let result = scheduler.schedule(
            RunId::new(),
            NodeIndex::new(1),
            "a",
            &delay(0.0, "seconds"),
            Instant::now(),
        );

        assert_eq!(
            result,
            Err(ValidationError::NonPositiveDuration { value: 0.0 })
        );
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn should_reject_unknown_unit() {
        let mut scheduler = DelayScheduler::new();

        let result = scheduler.schedule(
            RunId::new(),
            NodeIndex::new(1),
            "a",
            &delay(3.0, "fortnights"),
            Instant::now(),
        );

        assert!(matches!(
            result,
            Err(ValidationError::UnknownTimeUnit { .. })
        ));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn should_pop_in_resume_order_and_fifo_within_same_instant() {
        let mut scheduler = DelayScheduler::new();
        let now = Instant::now();
        let run = RunId::new();

        scheduler
            .schedule(run, NodeIndex::new(1), "late", &delay(10.0, "s"), now)
            .unwrap();
        scheduler
            .schedule(run, NodeIndex::new(2), "first", &delay(3.0, "s"), now)
            .unwrap();
        scheduler
            .schedule(run, NodeIndex::new(3), "second", &delay(3.0, "s"), now)
            .unwrap();

        assert_eq!(
            scheduler.next_deadline(),
            Some(now + Duration::from_secs(3))
        );
        assert_eq!(
            scheduler.pop_due(now + Duration::from_secs(60)),
            vec!["first", "second", "late"]
        );
    }

    #[test]
    fn should_cancel_idempotently() {
        let mut scheduler = DelayScheduler::new();
        let now = Instant::now();
        let run = RunId::new();

        scheduler
            .schedule(run, NodeIndex::new(1), "a", &delay(1.0, "s"), now)
            .unwrap();

        assert_eq!(scheduler.cancel(run, NodeIndex::new(1)), 1);
        assert_eq!(scheduler.cancel(run, NodeIndex::new(1)), 0);
        assert_eq!(scheduler.next_deadline(), None);
        assert!(scheduler.pop_due(now + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn should_cancel_only_the_given_run() {
        let mut scheduler = DelayScheduler::new();
        let now = Instant::now();
        let kept = RunId::new();
        let dropped = RunId::new();

        scheduler
            .schedule(kept, NodeIndex::new(1), "kept", &delay(1.0, "s"), now)
            .unwrap();
        scheduler
            .schedule(dropped, NodeIndex::new(1), "x", &delay(1.0, "s"), now)
            .unwrap();
        scheduler
            .schedule(dropped, NodeIndex::new(2), "y", &delay(2.0, "s"), now)
            .unwrap();

        assert_eq!(scheduler.cancel_run(dropped), 2);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(
            scheduler.pop_due(now + Duration::from_secs(5)),
            vec!["kept"]
        );
    }

    #[test]
    fn should_fire_overdue_tickets() {
        let mut scheduler = DelayScheduler::new();
        let now = Instant::now();

        scheduler
            .schedule(RunId::new(), NodeIndex::new(1), "a", &delay(1.0, "s"), now)
            .unwrap();

        assert_eq!(
            scheduler.pop_due(now + Duration::from_secs(3600)),
            vec!["a"]
        );
    }
}
