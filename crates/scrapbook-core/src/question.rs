//! Question entities and inbound request types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::duration::Minutes;
use crate::error::ValidationError;

/// Title of the synthetic question announced while in thinking mode.
pub const THINKING_MODE_TITLE: &str = "Thinking mode!";

/// Question importance. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Importance {
    #[default]
    Low,
    Medium,
    High,
}

impl Importance {
    pub fn as_str(self) -> &'static str {
        match self {
            Importance::Low => "Low",
            Importance::Medium => "Medium",
            Importance::High => "High",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Importance::High),
            "medium" => Ok(Importance::Medium),
            "low" => Ok(Importance::Low),
            other => Err(ValidationError::InvalidValue {
                field: "importance".into(),
                message: format!("unknown importance '{other}'"),
            }),
        }
    }
}

/// A single entry of the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub title: String,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<Minutes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_spent: Minutes,
    #[serde(default)]
    pub completed: bool,
}

impl Question {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            importance: Importance::Low,
            estimated_time: None,
            start_time: None,
            time_spent: Minutes::ZERO,
            completed: false,
        }
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_estimate(mut self, estimate: Minutes) -> Self {
        self.estimated_time = (!estimate.is_zero()).then_some(estimate);
        self
    }

    pub fn with_time_spent(mut self, spent: Minutes) -> Self {
        self.time_spent = spent;
        self
    }

    /// The pseudo-question shown to the frontend during a thinking break.
    pub fn thinking_mode(thinking_time: Minutes) -> Self {
        Question::new(THINKING_MODE_TITLE)
            .with_importance(Importance::High)
            .with_estimate(thinking_time)
    }

    /// Whole minutes of wall time since `start_time`, if started.
    pub fn wall_minutes_since_start(&self, now: DateTime<Utc>) -> Option<u64> {
        let start = self.start_time?;
        let elapsed = now.signed_duration_since(start).num_minutes();
        Some(elapsed.max(0) as u64)
    }
}

/// Body of `/api/question/add` and `/api/question/add-and-move`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub title: String,
    #[serde(default)]
    pub importance: Option<Importance>,
    #[serde(default)]
    pub estimated_time: Option<u64>,
}

impl NewQuestion {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            importance: None,
            estimated_time: None,
        }
    }

    pub fn importance(mut self, importance: Importance) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn estimated(mut self, minutes: u64) -> Self {
        self.estimated_time = Some(minutes);
        self
    }

    /// Build the queue entry, rejecting titles the document cannot hold.
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyTitle`] for blank titles and
    /// [`ValidationError::InvalidTitle`] for titles containing a line break or
    /// the `**` delimiter, or that start or end with `*`.
    pub fn into_question(self) -> Result<Question, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if title.contains('\n') || title.contains('\r') {
            return Err(ValidationError::InvalidTitle {
                title: title.to_string(),
                message: "must be a single line".into(),
            });
        }
        if title.contains("**") {
            return Err(ValidationError::InvalidTitle {
                title: title.to_string(),
                message: "must not contain '**'".into(),
            });
        }
        if title.starts_with('*') || title.ends_with('*') {
            return Err(ValidationError::InvalidTitle {
                title: title.to_string(),
                message: "must not start or end with '*'".into(),
            });
        }
        Ok(Question::new(title)
            .with_importance(self.importance.unwrap_or_default())
            .with_estimate(Minutes(self.estimated_time.unwrap_or(0))))
    }
}

/// Body of `/api/docs/add`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationRequest {
    #[serde(default)]
    pub target_file: Option<String>,
    pub text: String,
    /// External image path to copy into the attachments folder, or the file
    /// name for `image_data` when that is present.
    #[serde(default)]
    pub image_filename: Option<String>,
    /// Base64-encoded image bytes.
    #[serde(default)]
    pub image_data: Option<String>,
}
