use crate::time::SimTime;
use core::cmp::Reverse;
use std::{
    collections::{BinaryHeap, HashMap},
    fmt,
    time::Duration,
};

/// Handle of an event registered with the [`Scheduler`].
///
/// Identifiers are never reused during the lifetime of a scheduler, so
/// a stale handle can be cancelled or queried safely: it is simply no
/// longer pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    /// ID 0 is never given to an event
    const ZERO: Self = Self(0);

    #[must_use = "function does not modify the current value"]
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Virtual-time event queue.
///
/// The scheduler owns the simulation clock. Events are popped in
/// non-decreasing time order and, for events due at the same instant, in
/// the order they were scheduled. Popping an event advances the clock to
/// the event's due time.
///
/// The scheduler only stores the events' payload (`E`). It is up to the
/// caller to dispatch the popped payload to whatever component it
/// addresses; this way no scheduled entry ever holds on to the component
/// itself.
///
/// ```
/// # use pacesim_core::{Scheduler, SimTime};
/// # use std::time::Duration;
/// let mut scheduler = Scheduler::new();
/// let late = scheduler.schedule_after(Duration::from_secs(2), "late");
/// scheduler.schedule_after(Duration::from_secs(1), "early");
///
/// assert!(scheduler.cancel(late));
/// assert_eq!(scheduler.pop(), Some((SimTime::from_secs(1), "early")));
/// assert_eq!(scheduler.pop(), None);
/// assert_eq!(scheduler.now(), SimTime::from_secs(1));
/// ```
pub struct Scheduler<E> {
    now: SimTime,

    /// the last issued identifier
    last_id: EventId,

    queue: BinaryHeap<Reverse<Entry>>,

    /// payload of the events that are still pending
    ///
    /// an entry of the `queue` that is not in this map has been cancelled
    pending: HashMap<EventId, E>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    at: SimTime,
    // identifiers are monotonic, ordering on them gives FIFO tie-breaks
    id: EventId,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            last_id: EventId::ZERO,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    /// current virtual time
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// number of pending (not cancelled, not yet executed) events
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedule `event` to be due `delay` after the current time.
    pub fn schedule_after(&mut self, delay: Duration, event: E) -> EventId {
        self.schedule_at(self.now + delay, event)
    }

    /// Schedule `event` to be due at `at`.
    ///
    /// The clock never goes backward: an instant in the past is treated
    /// as now.
    pub fn schedule_at(&mut self, at: SimTime, event: E) -> EventId {
        let at = at.max(self.now);
        let id = self.last_id.next();
        self.last_id = id;

        self.queue.push(Reverse(Entry { at, id }));
        let collision = self.pending.insert(id, event);

        debug_assert!(
            collision.is_none(),
            "Collision of EventId (here: {id}) shouldn't be possible"
        );

        id
    }

    /// Cancel a pending event.
    ///
    /// Returns `false` if the event was already executed, already
    /// cancelled or unknown. None of these are errors.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.pending.remove(&id).is_some()
    }

    #[inline]
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Due time of the next pending event.
    pub fn next_time(&mut self) -> Option<SimTime> {
        self.discard_cancelled();
        self.queue.peek().map(|Reverse(entry)| entry.at)
    }

    /// Remove the next pending event and advance the clock to its due time.
    pub fn pop(&mut self) -> Option<(SimTime, E)> {
        while let Some(Reverse(entry)) = self.queue.pop() {
            if let Some(event) = self.pending.remove(&entry.id) {
                self.now = entry.at;
                return Some((entry.at, event));
            }
        }
        None
    }

    /// Advance the clock to `time` without executing anything.
    ///
    /// Used to settle the clock at the end of a bounded run.
    pub fn advance_to(&mut self, time: SimTime) {
        self.now = self.now.max(time);
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(entry)) = self.queue.peek() {
            if self.pending.contains_key(&entry.id) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        let mut s = Scheduler::<()>::new();

        assert!(s.is_empty());
        assert_eq!(s.len(), 0);
        assert!(s.pop().is_none());
        assert!(s.next_time().is_none());
        assert_eq!(s.now(), SimTime::ZERO);
    }

    #[test]
    fn pops_in_time_order() {
        let mut s = Scheduler::new();
        s.schedule_after(Duration::from_millis(30), 3);
        s.schedule_after(Duration::from_millis(10), 1);
        s.schedule_after(Duration::from_millis(20), 2);

        assert_eq!(s.len(), 3);
        assert_eq!(s.next_time(), Some(SimTime::from_millis(10)));

        let order: Vec<_> = std::iter::from_fn(|| s.pop()).map(|(_, e)| e).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(s.now(), SimTime::from_millis(30));
    }

    #[test]
    fn ties_run_first_scheduled_first() {
        let mut s = Scheduler::new();
        for i in 0..10 {
            s.schedule_at(SimTime::from_secs(1), i);
        }

        let order: Vec<_> = std::iter::from_fn(|| s.pop()).map(|(_, e)| e).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn delay_is_relative_to_now() {
        let mut s = Scheduler::new();
        s.schedule_at(SimTime::from_secs(1), "first");
        assert_eq!(s.pop(), Some((SimTime::from_secs(1), "first")));

        s.schedule_after(Duration::from_millis(500), "second");
        assert_eq!(s.pop(), Some((SimTime::from_millis(1_500), "second")));
    }

    #[test]
    fn past_instants_are_clamped_to_now() {
        let mut s = Scheduler::new();
        s.schedule_at(SimTime::from_secs(2), ());
        s.pop();

        s.schedule_at(SimTime::from_secs(1), ());
        assert_eq!(s.next_time(), Some(SimTime::from_secs(2)));
    }

    #[test]
    fn cancelled_events_never_fire() {
        let mut s = Scheduler::new();
        let a = s.schedule_after(Duration::from_millis(1), "a");
        let b = s.schedule_after(Duration::from_millis(2), "b");

        assert!(s.is_pending(a));
        assert!(s.cancel(a));
        assert!(!s.is_pending(a));
        assert_eq!(s.len(), 1);
        assert_eq!(s.next_time(), Some(SimTime::from_millis(2)));

        assert_eq!(s.pop(), Some((SimTime::from_millis(2), "b")));
        assert!(!s.is_pending(b));
        assert!(s.pop().is_none());
    }

    #[test]
    fn double_cancel_is_a_no_op() {
        let mut s = Scheduler::new();
        let id = s.schedule_after(Duration::from_millis(1), ());

        assert!(s.cancel(id));
        assert!(!s.cancel(id));
        assert!(s.is_empty());
    }

    #[test]
    fn cancelling_an_executed_event_is_a_no_op() {
        let mut s = Scheduler::new();
        let id = s.schedule_after(Duration::from_millis(1), ());
        s.pop();

        assert!(!s.cancel(id));
    }

    #[test]
    fn identifiers_are_unique() {
        let mut s = Scheduler::new();
        let a = s.schedule_after(Duration::ZERO, ());
        s.cancel(a);
        let b = s.schedule_after(Duration::ZERO, ());

        assert_ne!(a, b);
        assert_ne!(a, EventId::ZERO);
    }

    #[test]
    fn advance_to_never_goes_backward() {
        let mut s = Scheduler::<()>::new();
        s.advance_to(SimTime::from_secs(5));
        s.advance_to(SimTime::from_secs(3));
        assert_eq!(s.now(), SimTime::from_secs(5));
    }
}
