//! `Scheduler` implementations.
//!
//! `TokioScheduler` runs each timer as a tokio sleep task that posts its
//! `TimerId` to a channel when it fires; the owner of the receiving end feeds
//! those ids back into the engine. `ManualScheduler` keeps a virtual clock that
//! only moves when told to.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::trace;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::slideshow::{Scheduler, TimerId};

/// Timers backed by tokio tasks.
///
/// Ids come from a counter shared by every fork, so a message from a timer
/// of a torn-down engine can never match the id a newer engine is waiting for.
#[derive(Debug)]
pub struct TokioScheduler {
    next_id: Arc<AtomicU64>,
    fired_tx: mpsc::UnboundedSender<TimerId>,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    /// Creates a scheduler and the receiver its fired timers are delivered on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let scheduler = Self { next_id: Arc::new(AtomicU64::new(1)), fired_tx, tasks: HashMap::new() };
        (scheduler, fired_rx)
    }

    /// A new scheduler delivering to the same receiver, with no timers of its own.
    pub fn fork(&self) -> Self {
        Self { next_id: Arc::clone(&self.next_id), fired_tx: self.fired_tx.clone(), tasks: HashMap::new() }
    }

    /// Timers scheduled by this instance that have neither fired nor been cancelled.
    pub fn outstanding(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&mut self, delay: Duration) -> TimerId {
        self.tasks.retain(|_, task| !task.is_finished());
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone only when the player has shut down
            let _ = tx.send(id);
        });
        self.tasks.insert(id, task);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.tasks.remove(&id) {
            trace!("Aborting timer task {:?}", id);
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

/// A scheduler on a virtual clock, advanced explicitly.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_id: u64,
    /// Due time per outstanding timer.
    timers: BTreeMap<TimerId, Duration>,
}

impl ManualScheduler {
    /// Virtual time elapsed so far.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of outstanding timers.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// The earliest outstanding timer and its due time. Ties go to the earlier-scheduled timer.
    pub fn next_due(&self) -> Option<(TimerId, Duration)> {
        self.timers.iter().min_by_key(|(id, due)| (**due, **id)).map(|(id, due)| (*id, *due))
    }

    /// Moves the clock to the earliest due timer and fires it.
    pub fn advance_to_next(&mut self) -> Option<TimerId> {
        let (id, due) = self.next_due()?;
        self.timers.remove(&id);
        self.now = self.now.max(due);
        Some(id)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.insert(id, self.now.saturating_add(delay));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_scheduler_fires_in_due_order() {
        let mut scheduler = ManualScheduler::default();
        let late = scheduler.schedule_once(Duration::from_secs(5));
        let early = scheduler.schedule_once(Duration::from_secs(2));
        assert_eq!(scheduler.advance_to_next(), Some(early));
        assert_eq!(scheduler.now(), Duration::from_secs(2));
        assert_eq!(scheduler.advance_to_next(), Some(late));
        assert_eq!(scheduler.now(), Duration::from_secs(5));
        assert_eq!(scheduler.advance_to_next(), None);
    }

    #[test]
    fn manual_scheduler_cancel_removes_timer() {
        let mut scheduler = ManualScheduler::default();
        let id = scheduler.schedule_once(Duration::from_secs(1));
        scheduler.cancel(id);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.advance_to_next(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_delivers_fired_ids() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        let id = scheduler.schedule_once(Duration::from_secs(3));
        assert_eq!(fired.recv().await, Some(id));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_cancel_prevents_delivery() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        let cancelled = scheduler.schedule_once(Duration::from_secs(1));
        let kept = scheduler.schedule_once(Duration::from_secs(2));
        scheduler.cancel(cancelled);
        assert_eq!(fired.recv().await, Some(kept));
    }

    #[tokio::test]
    async fn forks_never_reuse_ids() {
        let (mut first, _fired) = TokioScheduler::new();
        let mut second = first.fork();
        let a = first.schedule_once(Duration::from_secs(60));
        let b = second.schedule_once(Duration::from_secs(60));
        assert_ne!(a, b);
        assert_eq!(first.outstanding(), 1);
        assert_eq!(second.outstanding(), 1);
    }
}
