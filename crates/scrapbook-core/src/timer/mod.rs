mod engine;
mod scheduler;

pub use engine::{is_overtime, Activation, TimerEngine, TimerState};
pub use scheduler::{
    cancel_slot, Scheduler, TimerFired, TimerHandle, TimerId, TimerKind, TokioScheduler,
};

use std::time::Duration;

/// Accrual tick period.
pub const TICK_PERIOD: Duration = Duration::from_secs(60);
