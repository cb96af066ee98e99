use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::duration::Minutes;
use crate::question::{Importance, Question};

/// Webhook endpoint announcing what the user should be looking at.
pub const CURRENT_QUESTION_ENDPOINT: &str = "/current-question";
/// Webhook endpoint for overtime alerts.
pub const OVERTIME_ALERT_ENDPOINT: &str = "/overtime-alert";

pub const NO_ACTIVE_QUESTION: &str = "No active question";
pub const ON_A_BREAK: &str = "on a break!";

/// Every user-visible state change in the session produces an Event.
/// The notifier turns events into webhooks; the notice sink shows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A different question became active.
    QuestionChanged { title: String },
    /// The queue has no active question.
    NoActiveQuestion,
    QuestionCompleted { title: String, time_spent: Minutes },
    /// Live time passed `estimate * overTime`. Raised on every tick past it.
    OvertimeAlert {
        title: String,
        estimated_time: Minutes,
        actual_time: Minutes,
    },
    /// Work session over; carries the thinking-mode pseudo-question.
    ThinkingModeStarted { question: Question },
    /// Thinking break over; re-announces the active question if any.
    ThinkingModeEnded { question: Option<Question> },
    /// Manual break started.
    BreakStarted,
    /// Manual break ended.
    BreakEnded { title: Option<String> },
}

fn question_payload(title: &str, importance: Option<Importance>, estimate: Option<Minutes>) -> Value {
    let mut question = json!({ "title": title });
    if let Some(importance) = importance {
        question["importance"] = json!(importance);
    }
    if let Some(estimate) = estimate {
        question["estimatedTime"] = json!(estimate);
    }
    json!({ "question": question })
}

impl Event {
    /// Webhook endpoint and JSON body for this event, if it is pushed.
    pub fn webhook(&self) -> Option<(&'static str, Value)> {
        match self {
            Event::QuestionChanged { title } => {
                Some((CURRENT_QUESTION_ENDPOINT, question_payload(title, None, None)))
            }
            Event::NoActiveQuestion => Some((
                CURRENT_QUESTION_ENDPOINT,
                question_payload(NO_ACTIVE_QUESTION, None, None),
            )),
            Event::QuestionCompleted { .. } => None,
            Event::OvertimeAlert {
                title,
                estimated_time,
                actual_time,
            } => Some((
                OVERTIME_ALERT_ENDPOINT,
                json!({
                    "question": title,
                    "estimatedTime": estimated_time,
                    "actualTime": actual_time,
                    "overBy": actual_time.get().saturating_sub(estimated_time.get()),
                }),
            )),
            Event::ThinkingModeStarted { question } => Some((
                CURRENT_QUESTION_ENDPOINT,
                question_payload(&question.title, Some(question.importance), question.estimated_time),
            )),
            Event::ThinkingModeEnded { question } => question.as_ref().map(|q| {
                (
                    CURRENT_QUESTION_ENDPOINT,
                    question_payload(&q.title, Some(q.importance), q.estimated_time),
                )
            }),
            Event::BreakStarted => Some((
                CURRENT_QUESTION_ENDPOINT,
                question_payload(ON_A_BREAK, Some(Importance::High), None),
            )),
            Event::BreakEnded { title } => Some((
                CURRENT_QUESTION_ENDPOINT,
                question_payload(title.as_deref().unwrap_or(NO_ACTIVE_QUESTION), None, None),
            )),
        }
    }

    /// User-facing notice for this event, if any.
    pub fn notice(&self) -> Option<String> {
        match self {
            Event::QuestionChanged { title } => Some(format!("Started: {title}")),
            Event::NoActiveQuestion => Some(NO_ACTIVE_QUESTION.to_string()),
            Event::QuestionCompleted { title, time_spent } => {
                Some(format!("Question completed: {title} ({time_spent})"))
            }
            Event::OvertimeAlert { .. } => None,
            Event::ThinkingModeStarted { question } => Some(format!(
                "Thinking mode! Take {} minutes to reflect.",
                question.estimated_time.unwrap_or_default().get()
            )),
            Event::ThinkingModeEnded { .. } => Some("Thinking mode complete. Back to work!".into()),
            Event::BreakStarted => Some("Break started".into()),
            Event::BreakEnded { .. } => Some("Break ended".into()),
        }
    }
}
