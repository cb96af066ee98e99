//! Queue membership and promotion.
//!
//! The queue document is the only persisted copy of the queue. Every query
//! re-reads it, and every mutation renders the whole document, writes it and
//! reads it back once to find out whether the active question changed.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::codec::{self, QueueDocument};
use crate::duration::Minutes;
use crate::error::{Result, ValidationError};
use crate::question::{NewQuestion, Question};
use crate::storage::DocumentStore;

/// Result of a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// Active title before the write.
    pub previous: Option<String>,
    /// Active question as read back after the write.
    pub active: Option<Question>,
    /// True when the active title differs from `previous`.
    pub changed: bool,
}

/// Outcome of completing the active question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub completed: Question,
    pub mutation: Mutation,
}

pub struct QueueStore {
    documents: Arc<dyn DocumentStore>,
    document_id: String,
}

impl QueueStore {
    pub fn new(documents: Arc<dyn DocumentStore>, document_id: impl Into<String>) -> Self {
        Self {
            documents,
            document_id: document_id.into(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Read and parse the queue, creating an empty document if none exists.
    ///
    /// # Errors
    /// Propagates document store failures.
    pub fn snapshot(&self) -> Result<QueueDocument> {
        if !self.documents.exists(&self.document_id) {
            tracing::info!(document = %self.document_id, "questions file not found, creating it");
            self.documents.create(&self.document_id, &codec::skeleton())?;
        }
        let text = self.documents.read(&self.document_id)?;
        Ok(codec::parse(&text))
    }

    pub fn current_question(&self) -> Result<Option<Question>> {
        Ok(self.snapshot()?.active)
    }

    pub fn pending(&self) -> Result<Vec<Question>> {
        Ok(self.snapshot()?.pending)
    }

    pub fn completed(&self) -> Result<Vec<Question>> {
        Ok(self.snapshot()?.completed)
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Add a question to the queue.
    ///
    /// The currently active question keeps its place (or is demoted to the
    /// front of pending when `move_to_active` is set) with `live` recorded as
    /// its time spent.
    ///
    /// # Errors
    /// Returns a validation error for unusable or duplicate titles and
    /// propagates storage failures.
    pub fn add_question(
        &self,
        request: NewQuestion,
        move_to_active: bool,
        live: Minutes,
    ) -> Result<Mutation> {
        let question = request.into_question()?;
        let mut doc = self.snapshot()?;

        let duplicate = doc
            .active
            .iter()
            .chain(doc.pending.iter())
            .any(|q| !q.completed && q.title == question.title);
        if duplicate {
            return Err(ValidationError::DuplicateTitle(question.title).into());
        }

        let current = doc.active.take().map(|mut q| {
            q.time_spent = live;
            q
        });
        if move_to_active {
            if let Some(previous) = current {
                doc.pending.insert(0, previous);
            }
            doc.active = Some(question);
        } else {
            doc.active = current;
            doc.pending.push(question);
        }
        self.commit(doc)
    }

    /// Complete the active question, promoting the next one.
    ///
    /// Returns `None` when there is no active question.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub fn complete_current(&self, live: Minutes) -> Result<Option<Completion>> {
        let mut doc = self.snapshot()?;
        let Some(mut current) = doc.active.take() else {
            return Ok(None);
        };
        current.time_spent = live;
        current.completed = true;
        doc.active = take_next(&mut doc.pending);
        doc.completed.push(current.clone());
        let mutation = self.commit(doc)?;
        Ok(Some(Completion {
            completed: current,
            mutation,
        }))
    }

    /// Record when the active question started, if not yet recorded.
    ///
    /// Returns the active question as stored afterwards.
    pub fn capture_start(&self, at: DateTime<Utc>) -> Result<Option<Question>> {
        let mut doc = self.snapshot()?;
        match doc.active.as_mut() {
            Some(active) if active.start_time.is_none() => {
                active.start_time = Some(at);
                Ok(self.commit(doc)?.active)
            }
            _ => Ok(doc.active),
        }
    }

    /// Normalize, render, write and re-read the document.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub fn commit(&self, doc: QueueDocument) -> Result<Mutation> {
        let previous = self.current_question()?.map(|q| q.title);
        let doc = normalize(doc);
        self.documents
            .write(&self.document_id, &codec::render(&doc))?;

        let active = self.current_question()?;
        let changed = active.as_ref().map(|q| q.title.as_str()) != previous.as_deref();
        Ok(Mutation {
            previous,
            active,
            changed,
        })
    }
}

/// Pop the highest-importance question, earliest first among equals.
fn take_next(pending: &mut Vec<Question>) -> Option<Question> {
    let index = pending
        .iter()
        .enumerate()
        .fold(None::<(usize, &Question)>, |best, (i, q)| match best {
            Some((_, b)) if b.importance >= q.importance => best,
            _ => Some((i, q)),
        })
        .map(|(i, _)| i)?;
    Some(pending.remove(index))
}

/// Move hand-checked questions to Completed and fill an empty Active slot.
fn normalize(mut doc: QueueDocument) -> QueueDocument {
    let mut finished: Vec<Question> = Vec::new();
    if doc.active.as_ref().is_some_and(|q| q.completed) {
        finished.extend(doc.active.take());
    }
    let (done, open): (Vec<Question>, Vec<Question>) =
        doc.pending.into_iter().partition(|q| q.completed);
    finished.extend(done);
    doc.pending = open;

    for question in doc.completed.iter_mut() {
        question.completed = true;
    }
    doc.completed.extend(finished);

    if doc.active.is_none() {
        doc.active = take_next(&mut doc.pending);
    }
    doc
}
