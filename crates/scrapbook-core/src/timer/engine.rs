//! Session timer state machine.
//!
//! The engine owns no clock and no threads. The session feeds it timer
//! firings from a [`Scheduler`](super::Scheduler) and it updates the live
//! counter and break flag held in [`Settings`].
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> OnBreak
//!   ^        |           |
//!   +--------+-----------+   (completion, shutdown, break end without a question)
//! ```

use crate::duration::Minutes;
use crate::storage::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    OnBreak,
}

/// How an activation treats the live counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// A question just became active: start counting from its recorded time.
    Fresh(Minutes),
    /// Continue counting from the current live value.
    Resume,
}

/// Core timer engine.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    state: TimerState,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerEngine {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TimerState::Idle
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start timing the active question.
    pub fn activate(&mut self, settings: &mut Settings, activation: Activation) {
        if let Activation::Fresh(recorded) = activation {
            settings.time_spent = recorded;
        }
        self.state = if settings.on_break {
            TimerState::OnBreak
        } else {
            TimerState::Running
        };
    }

    /// Per-minute accrual. Returns the new live total when a minute was added.
    pub fn tick(&mut self, settings: &mut Settings) -> Option<Minutes> {
        if self.state != TimerState::Running || settings.on_break {
            return None;
        }
        settings.time_spent += Minutes(1);
        Some(settings.time_spent)
    }

    /// Work session elapsed. Returns the break length when thinking mode
    /// begins; `None` when already on a break.
    pub fn begin_thinking(&mut self, settings: &mut Settings) -> Option<Minutes> {
        if settings.on_break {
            return None;
        }
        settings.on_break = true;
        settings.timed_break = true;
        self.state = TimerState::OnBreak;
        Some(settings.thinking_time)
    }

    /// Thinking break elapsed.
    pub fn finish_thinking(&mut self, settings: &mut Settings, has_active: bool) {
        settings.on_break = false;
        settings.timed_break = false;
        self.state = if has_active {
            TimerState::Running
        } else {
            TimerState::Idle
        };
    }

    /// Manual break start.
    pub fn start_break(&mut self, settings: &mut Settings) {
        settings.on_break = true;
        settings.timed_break = false;
        self.state = TimerState::OnBreak;
    }

    /// Manual break end. The live counter is left untouched.
    pub fn end_break(&mut self, settings: &mut Settings, has_active: bool) {
        settings.on_break = false;
        settings.timed_break = false;
        self.state = if has_active {
            TimerState::Running
        } else {
            TimerState::Idle
        };
    }

    /// Restore a break that was in progress when the process stopped.
    /// Returns the break length when the break ends on its own.
    pub fn resume_break(&mut self, settings: &mut Settings) -> Option<Minutes> {
        settings.on_break = true;
        self.state = TimerState::OnBreak;
        settings.timed_break.then_some(settings.thinking_time)
    }

    pub fn stop(&mut self) {
        self.state = TimerState::Idle;
    }
}

/// Whether `spent` exceeds `estimate * multiplier`.
pub fn is_overtime(estimate: Minutes, multiplier: f64, spent: Minutes) -> bool {
    spent.get() as f64 > estimate.get() as f64 * multiplier
}
