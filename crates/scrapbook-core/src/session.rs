//! The single logical thread of mutation.
//!
//! A [`Session`] owns the settings, the queue, the timer engine and every
//! timer slot. Callers (the gateway and the service actor) hand it one
//! command or one timer firing at a time.

use base64::Engine as _;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

use crate::duration::Minutes;
use crate::error::{CoreError, Result, ValidationError};
use crate::events::Event;
use crate::notify::{NoticeSink, Notifier};
use crate::question::{DocumentationRequest, NewQuestion, Question};
use crate::queue::{Mutation, QueueStore};
use crate::storage::vault::validate_id;
use crate::storage::{AttachmentStore, DocumentStore, Settings, SettingsStore};
use crate::timer::{
    cancel_slot, is_overtime, Activation, Scheduler, TimerEngine, TimerFired, TimerHandle,
    TimerKind, TimerState, TICK_PERIOD,
};

/// Everything a session talks to.
pub struct Collaborators {
    pub documents: Arc<dyn DocumentStore>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub settings_store: Box<dyn SettingsStore>,
    pub scheduler: Box<dyn Scheduler>,
    pub notifier: Box<dyn Notifier>,
    pub notices: Box<dyn NoticeSink>,
}

pub struct Session {
    settings: Settings,
    settings_store: Box<dyn SettingsStore>,
    queue: QueueStore,
    engine: TimerEngine,
    documents: Arc<dyn DocumentStore>,
    attachments: Arc<dyn AttachmentStore>,
    scheduler: Box<dyn Scheduler>,
    notifier: Box<dyn Notifier>,
    notices: Box<dyn NoticeSink>,
    tick: Option<TimerHandle>,
    work_session: Option<TimerHandle>,
    break_end: Option<TimerHandle>,
}

impl Session {
    /// Load settings and bind the queue document they name.
    ///
    /// # Errors
    /// Fails when the settings cannot be loaded or name an unusable
    /// questions file.
    pub fn new(collaborators: Collaborators) -> Result<Self> {
        let Collaborators {
            documents,
            attachments,
            settings_store,
            scheduler,
            notifier,
            notices,
        } = collaborators;
        let settings = settings_store.load()?;
        settings.validate()?;
        validate_id(&settings.questions_file)?;
        let queue = QueueStore::new(documents.clone(), settings.questions_file.clone());
        Ok(Self {
            settings,
            settings_store,
            queue,
            engine: TimerEngine::new(),
            documents,
            attachments,
            scheduler,
            notifier,
            notices,
            tick: None,
            work_session: None,
            break_end: None,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn timer_state(&self) -> TimerState {
        self.engine.state()
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// The active question with the live counter as its time spent.
    pub fn current_question(&self) -> Result<Option<Question>> {
        Ok(self.queue.current_question()?.map(|mut q| {
            q.time_spent = self.settings.time_spent;
            q
        }))
    }

    pub fn list_files(&self) -> Result<Vec<String>> {
        self.documents.list()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Restore timers from persisted state.
    pub fn start(&mut self) -> Result<()> {
        if self.settings.on_break {
            match self.engine.resume_break(&mut self.settings) {
                Some(length) => {
                    tracing::info!(%length, "resuming thinking break");
                    self.schedule_break_end(length);
                }
                None => tracing::info!("resuming manual break"),
            }
            return Ok(());
        }
        if self.queue.current_question()?.is_some() {
            self.queue.capture_start(Utc::now())?;
            self.engine.activate(&mut self.settings, Activation::Resume);
            self.restart_tick();
            self.ensure_work_session();
            tracing::info!(time_spent = %self.settings.time_spent, "resumed active question");
        }
        Ok(())
    }

    /// Cancel every timer and persist settings.
    pub fn shutdown(&mut self) -> Result<()> {
        self.cancel_all();
        self.engine.stop();
        self.save_settings()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn add_question(&mut self, request: NewQuestion, move_to_active: bool) -> Result<()> {
        let mutation = self
            .queue
            .add_question(request, move_to_active, self.settings.time_spent)?;
        self.apply(mutation)
    }

    /// Complete the active question and move on to the next one.
    ///
    /// With no active question this only announces that fact.
    pub fn complete_current_question(&mut self) -> Result<()> {
        let Some(completion) = self.queue.complete_current(self.settings.time_spent)? else {
            self.emit(Event::NoActiveQuestion);
            return Ok(());
        };
        cancel_slot(&mut self.tick);
        self.engine.stop();
        self.settings.time_spent = Minutes::ZERO;
        // The document is already committed, so the next question is set up
        // before a settings failure is reported.
        let saved = self.save_settings();
        tracing::info!(
            title = %completion.completed.title,
            time_spent = %completion.completed.time_spent,
            "question completed"
        );
        self.emit(Event::QuestionCompleted {
            title: completion.completed.title,
            time_spent: completion.completed.time_spent,
        });
        self.apply(completion.mutation)?;
        saved
    }

    pub fn start_break(&mut self) -> Result<()> {
        self.engine.start_break(&mut self.settings);
        self.save_settings()?;
        self.cancel_all();
        tracing::info!("break started");
        self.emit(Event::BreakStarted);
        Ok(())
    }

    pub fn end_break(&mut self) -> Result<()> {
        let active = self.queue.current_question()?;
        self.engine.end_break(&mut self.settings, active.is_some());
        self.save_settings()?;
        cancel_slot(&mut self.break_end);
        cancel_slot(&mut self.work_session);
        self.restart_tick();
        self.ensure_work_session();
        tracing::info!("break ended");
        self.emit(Event::BreakEnded {
            title: active.map(|q| q.title),
        });
        Ok(())
    }

    /// Append text (and optionally an image) to a vault document.
    ///
    /// # Errors
    /// Validation errors for bad targets or image data, `NotFound` for a
    /// missing external image, storage errors otherwise.
    pub fn add_documentation(&mut self, request: DocumentationRequest) -> Result<()> {
        let target = match request.target_file.as_deref().map(str::trim) {
            Some(target) if !target.is_empty() => target.to_string(),
            _ => match self.queue.current_question()? {
                Some(active) => format!("{}.md", active.title),
                None => format!("{}.md", self.settings.generic_doc_filename),
            },
        };
        validate_id(&target)?;

        let mut content = String::new();
        if let Some(embedded) = self.store_image(&request)? {
            content.push_str(&format!("![[{embedded}]]\n\n"));
        }
        content.push_str(&request.text);

        if self.documents.exists(&target) {
            let existing = self.documents.read(&target)?;
            self.documents
                .write(&target, &format!("{existing}\n\n{content}"))?;
        } else {
            self.documents.create(&target, &content)?;
        }
        tracing::info!(document = %target, "documentation added");
        Ok(())
    }

    /// Handle a timer firing. Firings from cancelled or replaced timers are
    /// ignored.
    pub fn on_timer(&mut self, fired: TimerFired) -> Result<()> {
        let slot = match fired.kind {
            TimerKind::Tick => &self.tick,
            TimerKind::WorkSession => &self.work_session,
            TimerKind::BreakEnd => &self.break_end,
        };
        if slot.as_ref().map(TimerHandle::id) != Some(fired.id) {
            tracing::debug!(kind = ?fired.kind, id = fired.id.0, "ignoring stale timer");
            return Ok(());
        }
        match fired.kind {
            TimerKind::Tick => self.on_tick(),
            TimerKind::WorkSession => self.on_work_session(),
            TimerKind::BreakEnd => {
                self.break_end = None;
                self.on_break_end()
            }
        }
    }

    // ── Timer handlers ───────────────────────────────────────────────

    fn on_tick(&mut self) -> Result<()> {
        let Some(active) = self.queue.current_question()? else {
            return Ok(());
        };
        let Some(total) = self.engine.tick(&mut self.settings) else {
            return Ok(());
        };
        self.save_settings()?;

        if let Some(wall) = active.wall_minutes_since_start(Utc::now()) {
            if wall < total.get() {
                tracing::debug!(
                    title = %active.title,
                    live = total.get(),
                    wall,
                    "live counter ahead of wall clock"
                );
            }
        }
        if let Some(estimate) = active.estimated_time {
            if is_overtime(estimate, self.settings.over_time, total) {
                self.emit(Event::OvertimeAlert {
                    title: active.title,
                    estimated_time: estimate,
                    actual_time: total,
                });
            }
        }
        Ok(())
    }

    fn on_work_session(&mut self) -> Result<()> {
        let Some(length) = self.engine.begin_thinking(&mut self.settings) else {
            return Ok(());
        };
        self.save_settings()?;
        tracing::info!(minutes = length.get(), "thinking mode started");
        self.emit(Event::ThinkingModeStarted {
            question: Question::thinking_mode(length),
        });
        self.schedule_break_end(length);
        Ok(())
    }

    fn on_break_end(&mut self) -> Result<()> {
        let active = self.queue.current_question()?;
        self.engine
            .finish_thinking(&mut self.settings, active.is_some());
        self.save_settings()?;
        if active.is_some() {
            if self.tick.is_none() {
                self.restart_tick();
            }
            self.ensure_work_session();
        } else {
            cancel_slot(&mut self.tick);
            cancel_slot(&mut self.work_session);
        }
        tracing::info!("thinking mode finished");
        self.emit(Event::ThinkingModeEnded { question: active });
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    /// React to the outcome of a queue write.
    fn apply(&mut self, mutation: Mutation) -> Result<()> {
        match mutation.active {
            Some(active) if mutation.changed => self.on_change_question(active),
            Some(_) => Ok(()),
            None => {
                cancel_slot(&mut self.tick);
                cancel_slot(&mut self.work_session);
                self.engine.stop();
                self.emit(Event::NoActiveQuestion);
                Ok(())
            }
        }
    }

    fn on_change_question(&mut self, question: Question) -> Result<()> {
        self.engine
            .activate(&mut self.settings, Activation::Fresh(question.time_spent));
        let saved = self.save_settings();
        let stamped = match question.start_time {
            Some(_) => Ok(()),
            None => self.queue.capture_start(Utc::now()).map(drop),
        };
        self.restart_tick();
        self.ensure_work_session();
        tracing::info!(title = %question.title, "active question changed");
        self.emit(Event::QuestionChanged {
            title: question.title,
        });
        saved.and(stamped)
    }

    fn emit(&self, event: Event) {
        if let Some((endpoint, payload)) = event.webhook() {
            self.notifier.notify(endpoint, payload);
        }
        if let Some(message) = event.notice() {
            self.notices.notice(&message);
        }
    }

    fn save_settings(&self) -> Result<()> {
        self.settings_store.save(&self.settings)
    }

    fn restart_tick(&mut self) {
        cancel_slot(&mut self.tick);
        self.tick = Some(
            self.scheduler
                .schedule_repeating(TICK_PERIOD, TimerKind::Tick),
        );
    }

    fn ensure_work_session(&mut self) {
        if self.work_session.is_none() {
            self.work_session = Some(self.scheduler.schedule_repeating(
                self.settings.working_time.to_std(),
                TimerKind::WorkSession,
            ));
        }
    }

    fn schedule_break_end(&mut self, length: Minutes) {
        cancel_slot(&mut self.break_end);
        self.break_end = Some(
            self.scheduler
                .schedule_once(length.to_std(), TimerKind::BreakEnd),
        );
    }

    fn cancel_all(&mut self) {
        cancel_slot(&mut self.tick);
        cancel_slot(&mut self.work_session);
        cancel_slot(&mut self.break_end);
    }

    /// Save the request's image into the attachments folder and return the
    /// path to embed.
    fn store_image(&self, request: &DocumentationRequest) -> Result<Option<String>> {
        let folder = self.settings.attachments_folder.trim_end_matches('/');
        let (name, bytes) = match (&request.image_data, &request.image_filename) {
            (Some(data), name) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(data.trim())
                    .map_err(|e| ValidationError::InvalidValue {
                        field: "imageData".into(),
                        message: e.to_string(),
                    })?;
                let name = match name.as_deref().map(str::trim) {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => format!("{}.png", content_hash(&bytes)),
                };
                (name, bytes)
            }
            (None, Some(source)) => {
                let bytes = std::fs::read(source).map_err(|e| CoreError::storage(source, e))?;
                let hash = content_hash(&bytes);
                let name = match Path::new(source).extension().and_then(|e| e.to_str()) {
                    Some(ext) => format!("{hash}.{ext}"),
                    None => hash,
                };
                (name, bytes)
            }
            (None, None) => return Ok(None),
        };

        let path = format!("{folder}/{name}");
        validate_id(&path)?;
        if self.attachments.binary_exists(&path) && request.image_data.is_none() {
            tracing::debug!(path = %path, "attachment already present");
        } else {
            self.attachments.create_folder(folder)?;
            self.attachments.write_binary(&path, &bytes)?;
        }
        Ok(Some(path))
    }
}

fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use crate::storage::{MemorySettingsStore, MemoryVault};
    use crate::timer::TimerId;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default, Clone)]
    struct Recorder {
        scheduled: Arc<Mutex<Vec<(TimerKind, TimerId, Duration)>>>,
        posts: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    }

    impl Scheduler for Recorder {
        fn schedule_repeating(&self, period: Duration, kind: TimerKind) -> TimerHandle {
            let mut scheduled = self.scheduled.lock().unwrap();
            let id = TimerId(scheduled.len() as u64 + 1);
            scheduled.push((kind, id, period));
            TimerHandle::new(id, Arc::new(AtomicBool::new(false)))
        }

        fn schedule_once(&self, delay: Duration, kind: TimerKind) -> TimerHandle {
            self.schedule_repeating(delay, kind)
        }
    }

    impl Notifier for Recorder {
        fn notify(&self, endpoint: &str, payload: serde_json::Value) {
            self.posts
                .lock()
                .unwrap()
                .push((endpoint.to_string(), payload));
        }
    }

    impl Recorder {
        fn last_id(&self, kind: TimerKind) -> TimerId {
            self.scheduled
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(k, _, _)| *k == kind)
                .map(|(_, id, _)| *id)
                .unwrap()
        }
    }

    fn session(vault: Arc<MemoryVault>, recorder: &Recorder) -> Session {
        Session::new(Collaborators {
            documents: vault.clone(),
            attachments: vault,
            settings_store: Box::new(MemorySettingsStore::default()),
            scheduler: Box::new(recorder.clone()),
            notifier: Box::new(recorder.clone()),
            notices: Box::new(crate::notify::LogNotices),
        })
        .unwrap()
    }

    #[test]
    fn first_question_becomes_active_and_starts_timers() {
        let vault = Arc::new(MemoryVault::new());
        let recorder = Recorder::default();
        let mut session = session(vault, &recorder);

        session.add_question(NewQuestion::new("Fix bug"), false).unwrap();
        let active = session.current_question().unwrap().unwrap();
        assert_eq!(active.title, "Fix bug");
        assert!(active.start_time.is_some());
        assert_eq!(session.timer_state(), TimerState::Running);

        let kinds: Vec<TimerKind> = recorder
            .scheduled
            .lock()
            .unwrap()
            .iter()
            .map(|(k, _, _)| *k)
            .collect();
        assert_eq!(kinds, vec![TimerKind::Tick, TimerKind::WorkSession]);
        let posts = recorder.posts.lock().unwrap();
        assert_eq!(posts[0].0, "/current-question");
        assert_eq!(posts[0].1["question"]["title"], "Fix bug");
    }

    #[derive(Clone, Default)]
    struct FlakySettings {
        failing: Arc<AtomicBool>,
    }

    impl SettingsStore for FlakySettings {
        fn load(&self) -> Result<Settings> {
            Ok(Settings::default())
        }

        fn save(&self, _settings: &Settings) -> Result<()> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(CoreError::Custom("disk full".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn failed_settings_save_still_sets_up_next_question() {
        let vault = Arc::new(MemoryVault::new());
        let recorder = Recorder::default();
        let store = FlakySettings::default();
        let mut session = Session::new(Collaborators {
            documents: vault.clone(),
            attachments: vault,
            settings_store: Box::new(store.clone()),
            scheduler: Box::new(recorder.clone()),
            notifier: Box::new(recorder.clone()),
            notices: Box::new(crate::notify::LogNotices),
        })
        .unwrap();
        session.add_question(NewQuestion::new("A"), false).unwrap();
        session.add_question(NewQuestion::new("B"), false).unwrap();
        let first_tick = recorder.last_id(TimerKind::Tick);

        store.failing.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(session.complete_current_question().is_err());

        assert_eq!(session.current_question().unwrap().unwrap().title, "B");
        assert_eq!(session.timer_state(), TimerState::Running);
        assert_ne!(recorder.last_id(TimerKind::Tick), first_tick);
        let posts = recorder.posts.lock().unwrap();
        let (endpoint, payload) = posts.last().unwrap();
        assert_eq!(endpoint, "/current-question");
        assert_eq!(payload["question"]["title"], "B");
    }

    #[test]
    fn stale_tick_is_ignored() {
        let vault = Arc::new(MemoryVault::new());
        let recorder = Recorder::default();
        let mut session = session(vault, &recorder);
        session.add_question(NewQuestion::new("A"), false).unwrap();
        let first = recorder.last_id(TimerKind::Tick);
        session.add_question(NewQuestion::new("B"), true).unwrap();

        session
            .on_timer(TimerFired {
                kind: TimerKind::Tick,
                id: first,
            })
            .unwrap();
        assert_eq!(session.settings().time_spent, Minutes::ZERO);

        let current = recorder.last_id(TimerKind::Tick);
        session
            .on_timer(TimerFired {
                kind: TimerKind::Tick,
                id: current,
            })
            .unwrap();
        assert_eq!(session.settings().time_spent, Minutes(1));
    }

    #[test]
    fn documentation_defaults_to_active_title() {
        let vault = Arc::new(MemoryVault::new());
        let recorder = Recorder::default();
        let mut session = session(vault.clone(), &recorder);
        session.add_question(NewQuestion::new("Fix bug"), false).unwrap();

        session
            .add_documentation(DocumentationRequest {
                text: "first".into(),
                ..Default::default()
            })
            .unwrap();
        session
            .add_documentation(DocumentationRequest {
                text: "second".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(vault.document("Fix bug.md").as_deref(), Some("first\n\nsecond"));
    }

    #[test]
    fn documentation_without_active_uses_generic_file() {
        let vault = Arc::new(MemoryVault::new());
        let recorder = Recorder::default();
        let mut session = session(vault.clone(), &recorder);
        session
            .add_documentation(DocumentationRequest {
                text: "note".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(vault.document("scrapbook.md").as_deref(), Some("note"));
    }

    #[test]
    fn documentation_embeds_base64_image() {
        let vault = Arc::new(MemoryVault::new());
        let recorder = Recorder::default();
        let mut session = session(vault.clone(), &recorder);
        let data = base64::engine::general_purpose::STANDARD.encode(b"png-bytes");
        session
            .add_documentation(DocumentationRequest {
                target_file: Some("notes.md".into()),
                text: "look".into(),
                image_filename: Some("shot.png".into()),
                image_data: Some(data),
            })
            .unwrap();
        assert_eq!(
            vault.document("notes.md").as_deref(),
            Some("![[attachments/shot.png]]\n\nlook")
        );
        assert_eq!(vault.binary("attachments/shot.png").as_deref(), Some(&b"png-bytes"[..]));
        assert!(vault.has_folder("attachments"));
    }

    #[test]
    fn documentation_copies_external_image_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("capture.jpg");
        std::fs::write(&source, b"jpeg").unwrap();

        let vault = Arc::new(MemoryVault::new());
        let recorder = Recorder::default();
        let mut session = session(vault.clone(), &recorder);
        session
            .add_documentation(DocumentationRequest {
                target_file: Some("notes.md".into()),
                text: "see".into(),
                image_filename: Some(source.to_string_lossy().into_owned()),
                image_data: None,
            })
            .unwrap();
        let expected = format!("attachments/{}.jpg", content_hash(b"jpeg"));
        assert_eq!(vault.binary(&expected).as_deref(), Some(&b"jpeg"[..]));
        assert_eq!(
            vault.document("notes.md").unwrap(),
            format!("![[{expected}]]\n\nsee")
        );
    }

    #[test]
    fn documentation_rejects_escaping_target_and_missing_image() {
        let vault = Arc::new(MemoryVault::new());
        let recorder = Recorder::default();
        let mut session = session(vault, &recorder);
        let err = session
            .add_documentation(DocumentationRequest {
                target_file: Some("../outside.md".into()),
                text: "x".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::InvalidPath(_))));

        let err = session
            .add_documentation(DocumentationRequest {
                target_file: Some("notes.md".into()),
                text: "x".into(),
                image_filename: Some("/definitely/not/here.png".into()),
                image_data: None,
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
