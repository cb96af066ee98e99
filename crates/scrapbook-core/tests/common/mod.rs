//! Shared helpers for session integration tests.

#![allow(dead_code)]

use serde_json::Value;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scrapbook_core::notify::{NoticeSink, Notifier};
use scrapbook_core::timer::{Scheduler, TimerFired, TimerHandle, TimerId, TimerKind};
use scrapbook_core::{Collaborators, MemorySettingsStore, MemoryVault, Session, Settings};

#[derive(Debug, Clone)]
pub struct Scheduled {
    pub kind: TimerKind,
    pub id: TimerId,
    pub after: Duration,
    pub repeating: bool,
    pub handle_cancelled: Arc<AtomicBool>,
}

impl Scheduled {
    pub fn is_cancelled(&self) -> bool {
        self.handle_cancelled
            .load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Scheduler that records timers and lets the test fire them by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    entries: Arc<Mutex<Vec<Scheduled>>>,
}

impl ManualScheduler {
    fn push(&self, after: Duration, kind: TimerKind, repeating: bool) -> TimerHandle {
        let mut entries = self.entries.lock().unwrap();
        let id = TimerId(entries.len() as u64 + 1);
        let cancelled = Arc::new(AtomicBool::new(false));
        entries.push(Scheduled {
            kind,
            id,
            after,
            repeating,
            handle_cancelled: cancelled.clone(),
        });
        TimerHandle::new(id, cancelled)
    }

    pub fn entries(&self) -> Vec<Scheduled> {
        self.entries.lock().unwrap().clone()
    }

    /// Latest live timer of `kind`.
    pub fn live(&self, kind: TimerKind) -> Option<Scheduled> {
        self.entries()
            .into_iter()
            .rev()
            .find(|e| e.kind == kind && !e.is_cancelled())
    }

    /// Firing message for the latest live timer of `kind`.
    pub fn fire(&self, kind: TimerKind) -> TimerFired {
        let entry = self
            .live(kind)
            .unwrap_or_else(|| panic!("no live {kind:?} timer"));
        TimerFired { kind, id: entry.id }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, kind: TimerKind) -> TimerHandle {
        self.push(period, kind, true)
    }

    fn schedule_once(&self, delay: Duration, kind: TimerKind) -> TimerHandle {
        self.push(delay, kind, false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    posts: Arc<Mutex<Vec<(String, Value)>>>,
}

impl RecordingNotifier {
    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<(String, Value)> {
        self.posts().pop()
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.posts().iter().filter(|(e, _)| e == endpoint).count()
    }

    pub fn clear(&self) {
        self.posts.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, endpoint: &str, payload: Value) {
        self.posts
            .lock()
            .unwrap()
            .push((endpoint.to_string(), payload));
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotices {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotices {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl NoticeSink for RecordingNotices {
    fn notice(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// A session over an in-memory vault with every collaborator observable.
pub struct Harness {
    pub session: Session,
    pub vault: Arc<MemoryVault>,
    pub settings: Arc<MemorySettingsStore>,
    pub scheduler: ManualScheduler,
    pub notifier: RecordingNotifier,
    pub notices: RecordingNotices,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(MemoryVault::new(), Settings::default())
    }

    pub fn with(vault: MemoryVault, settings: Settings) -> Self {
        let vault = Arc::new(vault);
        let settings = Arc::new(MemorySettingsStore::new(settings));
        let scheduler = ManualScheduler::default();
        let notifier = RecordingNotifier::default();
        let notices = RecordingNotices::default();
        let session = Session::new(Collaborators {
            documents: vault.clone(),
            attachments: vault.clone(),
            settings_store: Box::new(settings.clone()),
            scheduler: Box::new(scheduler.clone()),
            notifier: Box::new(notifier.clone()),
            notices: Box::new(notices.clone()),
        })
        .unwrap();
        Self {
            session,
            vault,
            settings,
            scheduler,
            notifier,
            notices,
        }
    }

    pub fn fire(&mut self, kind: TimerKind) {
        let fired = self.scheduler.fire(kind);
        self.session.on_timer(fired).unwrap();
    }

    pub fn tick(&mut self, times: usize) {
        for _ in 0..times {
            self.fire(TimerKind::Tick);
        }
    }

    pub fn document(&self) -> String {
        self.vault.document("questions.md").unwrap_or_default()
    }
}
