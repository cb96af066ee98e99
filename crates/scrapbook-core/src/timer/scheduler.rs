//! Repeating and one-shot timers delivered as messages.
//!
//! A scheduled timer does not run a callback itself; when it fires it sends a
//! [`TimerFired`] carrying its kind and id to whoever owns the session, so
//! firings are processed on the same logical thread as API commands.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

/// Which session timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Per-minute accrual tick.
    Tick,
    /// Work session elapsed; time to think.
    WorkSession,
    /// Thinking break elapsed.
    BreakEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Message sent when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub id: TimerId,
}

/// Handle to a scheduled timer. Dropping the handle does not cancel it.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    cancelled: Arc<AtomicBool>,
    task: Option<tokio::task::AbortHandle>,
}

impl TimerHandle {
    pub fn new(id: TimerId, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            id,
            cancelled,
            task: None,
        }
    }

    pub fn with_task(mut self, task: tokio::task::AbortHandle) -> Self {
        self.task = Some(task);
        self
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel the timer. Safe to call on a timer that already fired.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Source of session timers.
pub trait Scheduler: Send {
    fn schedule_repeating(&self, period: Duration, kind: TimerKind) -> TimerHandle;
    fn schedule_once(&self, delay: Duration, kind: TimerKind) -> TimerHandle;
}

/// Cancel and clear a stored handle. Clearing an empty slot is a no-op.
pub fn cancel_slot(slot: &mut Option<TimerHandle>) {
    if let Some(handle) = slot.take() {
        handle.cancel();
    }
}

/// Scheduler backed by tokio tasks. Must be used inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerFired>,
    next_id: Arc<AtomicU64>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Create a scheduler together with the receiving end of its firings.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn allocate(&self) -> (TimerId, Arc<AtomicBool>) {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        (id, Arc::new(AtomicBool::new(false)))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, period: Duration, kind: TimerKind) -> TimerHandle {
        let (id, cancelled) = self.allocate();
        let tx = self.tx.clone();
        let flag = cancelled.clone();
        let period = period.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if flag.load(Ordering::SeqCst) || tx.send(TimerFired { kind, id }).is_err() {
                    break;
                }
            }
        });
        TimerHandle::new(id, cancelled).with_task(task.abort_handle())
    }

    fn schedule_once(&self, delay: Duration, kind: TimerKind) -> TimerHandle {
        let (id, cancelled) = self.allocate();
        let tx = self.tx.clone();
        let flag = cancelled.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                let _ = tx.send(TimerFired { kind, id });
            }
        });
        TimerHandle::new(id, cancelled).with_task(task.abort_handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeating_timer_fires_every_period() {
        let (scheduler, mut rx) = TokioScheduler::channel();
        let handle = scheduler.schedule_repeating(Duration::from_secs(60), TimerKind::Tick);

        tokio::time::sleep(Duration::from_secs(181)).await;
        let mut fired = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            fired.push(msg);
        }
        assert_eq!(fired.len(), 3);
        assert!(fired.iter().all(|f| f.kind == TimerKind::Tick && f.id == handle.id()));
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_stops_firing() {
        let (scheduler, mut rx) = TokioScheduler::channel();
        let handle = scheduler.schedule_repeating(Duration::from_secs(60), TimerKind::WorkSession);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(rx.try_recv().is_ok());
        handle.cancel();
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(rx.try_recv().is_err());
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn once_timer_fires_once() {
        let (scheduler, mut rx) = TokioScheduler::channel();
        let handle = scheduler.schedule_once(Duration::from_secs(480), TimerKind::BreakEnd);

        tokio::time::sleep(Duration::from_secs(479)).await;
        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            rx.try_recv().unwrap(),
            TimerFired {
                kind: TimerKind::BreakEnd,
                id: handle.id()
            }
        );
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_unique() {
        let (scheduler, _rx) = TokioScheduler::channel();
        let a = scheduler.schedule_once(Duration::from_secs(1), TimerKind::BreakEnd);
        let b = scheduler.schedule_once(Duration::from_secs(1), TimerKind::BreakEnd);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn cancel_slot_is_idempotent() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut slot = Some(TimerHandle::new(TimerId(7), flag.clone()));
        cancel_slot(&mut slot);
        assert!(slot.is_none());
        assert!(flag.load(Ordering::SeqCst));
        cancel_slot(&mut slot);
        assert!(slot.is_none());
    }
}
