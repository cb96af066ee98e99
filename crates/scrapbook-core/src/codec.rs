//! Markdown codec for the questions document.
//!
//! ```text
//! # Questions Queue
//!
//! ## Active
//! - [ ] **Current Question**
//!   - Importance: High
//!   - Estimated: 2h
//!   - Started: 2025-06-19 10:30
//!   - Time Spent: 1h 23m
//!
//! ## Pending
//! - [ ] **Next Question** (Importance: Medium, Estimated: 1h)
//!
//! ## Completed
//! - [x] **Previous Question** (Importance: Low, Time Spent: 45m)
//! ```
//!
//! Parsing is lenient: unknown sections, unknown keys and unparseable values
//! are skipped so hand edits never make the document unreadable.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::duration::Minutes;
use crate::question::{Importance, Question};

const DOCUMENT_TITLE: &str = "# Questions Queue";
const STARTED_FORMAT: &str = "%Y-%m-%d %H:%M";

/// The three sections of the queue document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueDocument {
    pub active: Option<Question>,
    pub pending: Vec<Question>,
    pub completed: Vec<Question>,
}

impl QueueDocument {
    pub fn active_title(&self) -> Option<&str> {
        self.active.as_ref().map(|q| q.title.as_str())
    }

    /// Pending questions in rendering order: importance descending, ties in
    /// document order.
    pub fn sorted_pending(&self) -> Vec<&Question> {
        let mut pending: Vec<&Question> = self.pending.iter().collect();
        pending.sort_by(|a, b| b.importance.cmp(&a.importance));
        pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Active,
    Pending,
    Completed,
}

impl Section {
    fn from_heading(heading: &str) -> Option<Self> {
        let heading = heading.trim();
        if heading.starts_with("Active") {
            Some(Section::Active)
        } else if heading.starts_with("Pending") {
            Some(Section::Pending)
        } else if heading.starts_with("Completed") {
            Some(Section::Completed)
        } else {
            None
        }
    }
}

/// Parse the document text into its sections.
///
/// Only the first question of the Active section becomes active; any further
/// questions found there are returned at the front of `pending`.
pub fn parse(text: &str) -> QueueDocument {
    let mut section: Option<Section> = None;
    let mut active: Vec<Question> = Vec::new();
    let mut pending: Vec<Question> = Vec::new();
    let mut completed: Vec<Question> = Vec::new();
    // Whether the most recent line opened a question that later field lines
    // may attach to.
    let mut attached = false;

    for raw in text.lines() {
        let line = raw.trim();
        if let Some((level, heading)) = heading(line) {
            attached = false;
            // `##` opens a section, `#` closes it, deeper headings are content.
            match level {
                1 => section = None,
                2 => section = Section::from_heading(heading),
                _ => {}
            }
            continue;
        }
        let Some(current) = section else {
            continue;
        };
        let bucket = match current {
            Section::Active => &mut active,
            Section::Pending => &mut pending,
            Section::Completed => &mut completed,
        };

        if let Some(rest) = line.strip_prefix("- [") {
            attached = false;
            let completed_flag = rest.starts_with('x') || rest.starts_with('X');
            let Some((title, tail)) = extract_title(rest) else {
                continue;
            };
            let mut question = Question::new(title);
            question.completed = completed_flag;
            apply_fields(&mut question, tail);
            bucket.push(question);
            attached = true;
        } else if attached && !line.is_empty() {
            if let Some(question) = bucket.last_mut() {
                apply_fields(question, line);
            }
        }
    }

    let mut active = active.into_iter();
    let first = active.next();
    let mut spill: Vec<Question> = active.collect();
    spill.extend(pending);
    QueueDocument {
        active: first,
        pending: spill,
        completed,
    }
}

/// Split an ATX heading into its level and text. A `#` run glued to a word,
/// such as a `#tag`, is not a heading.
fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 {
        return None;
    }
    let rest = &line[level..];
    match rest.chars().next() {
        None => Some((level, rest)),
        Some(c) if c.is_whitespace() => Some((level, rest)),
        Some(_) => None,
    }
}

fn extract_title(line: &str) -> Option<(&str, &str)> {
    let (_, after_open) = line.split_once("**")?;
    let (title, tail) = after_open.split_once("**")?;
    Some((title, tail))
}

fn apply_fields(question: &mut Question, text: &str) {
    let text = text.trim();
    let text = text.strip_prefix("- ").unwrap_or(text);
    for piece in text.split(", ") {
        let piece = piece.trim().replace(['(', ')'], "");
        let Some((key, value)) = piece.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Importance" => {
                if let Ok(importance) = value.parse::<Importance>() {
                    question.importance = importance;
                }
            }
            "Estimated" => {
                let estimate = Minutes::parse(value);
                question.estimated_time = (!estimate.is_zero()).then_some(estimate);
            }
            "Started" => {
                if let Some(at) = parse_started(value) {
                    question.start_time = Some(at);
                }
            }
            "Time Spent" => question.time_spent = Minutes::parse(value),
            _ => {}
        }
    }
}

fn parse_started(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    [STARTED_FORMAT, "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn format_started(at: &DateTime<Utc>) -> String {
    at.format(STARTED_FORMAT).to_string()
}

fn inline_fields(question: &Question) -> Vec<String> {
    let mut fields = vec![format!("Importance: {}", question.importance)];
    if let Some(estimate) = question.estimated_time.filter(|e| !e.is_zero()) {
        fields.push(format!("Estimated: {estimate}"));
    }
    if let Some(started) = &question.start_time {
        fields.push(format!("Started: {}", format_started(started)));
    }
    if !question.time_spent.is_zero() {
        fields.push(format!("Time Spent: {}", question.time_spent));
    }
    fields
}

fn render_inline(content: &mut String, checkbox: &str, question: &Question) {
    content.push_str(&format!("- {checkbox} **{}**", question.title));
    let fields = inline_fields(question);
    if !fields.is_empty() {
        content.push_str(&format!(" ({})", fields.join(", ")));
    }
    content.push('\n');
}

/// Render the document. Pending questions are sorted by importance.
pub fn render(doc: &QueueDocument) -> String {
    let mut content = format!("{DOCUMENT_TITLE}\n\n## Active\n");

    if let Some(active) = &doc.active {
        content.push_str(&format!("- [ ] **{}**\n", active.title));
        for field in inline_fields(active) {
            content.push_str(&format!("  - {field}\n"));
        }
        content.push('\n');
    }

    content.push_str("## Pending\n");
    for question in doc.sorted_pending() {
        render_inline(&mut content, "[ ]", question);
    }

    content.push_str("\n## Completed\n");
    for question in &doc.completed {
        render_inline(&mut content, "[x]", question);
    }

    content
}

/// The empty document written when the queue file does not exist yet.
pub fn skeleton() -> String {
    render(&QueueDocument::default())
}
