//! Whole-minute durations and the compact `1h 30m` syntax used in the queue
//! document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// A duration in whole minutes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Minutes(pub u64);

impl Minutes {
    pub const ZERO: Minutes = Minutes(0);

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Wall-clock length of this many minutes.
    pub fn to_std(self) -> std::time::Duration {
        std::time::Duration::from_secs(self.0.saturating_mul(60))
    }

    /// Parse the compact duration syntax.
    ///
    /// Accepts an optional `<N>h` token and an optional `<N>m` token in either
    /// order, summed to minutes. Only the first token of each unit counts and
    /// anything else is ignored, so `"45m/1h"` is 105 and `""` is 0.
    pub fn parse(text: &str) -> Minutes {
        let mut hours: Option<u64> = None;
        let mut minutes: Option<u64> = None;
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if !bytes[i].is_ascii_digit() {
                i += 1;
                continue;
            }
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let Ok(value) = text[start..i].parse::<u64>() else {
                continue;
            };
            match bytes.get(i) {
                Some(b'h') if hours.is_none() => hours = Some(value),
                Some(b'm') if minutes.is_none() => minutes = Some(value),
                _ => {}
            }
        }
        Minutes(
            hours
                .unwrap_or(0)
                .saturating_mul(60)
                .saturating_add(minutes.unwrap_or(0)),
        )
    }
}

impl fmt::Display for Minutes {
    /// Hours before minutes, zero components omitted; zero itself is `0m`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 60;
        let rest = self.0 % 60;
        match (hours, rest) {
            (0, m) => write!(f, "{m}m"),
            (h, 0) => write!(f, "{h}h"),
            (h, m) => write!(f, "{h}h {m}m"),
        }
    }
}

impl From<u64> for Minutes {
    fn from(value: u64) -> Self {
        Minutes(value)
    }
}

impl Add for Minutes {
    type Output = Minutes;

    fn add(self, rhs: Minutes) -> Minutes {
        Minutes(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Minutes {
    fn add_assign(&mut self, rhs: Minutes) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compact_durations() {
        assert_eq!(Minutes::parse("1h 30m"), Minutes(90));
        assert_eq!(Minutes::parse("45m"), Minutes(45));
        assert_eq!(Minutes::parse("2h"), Minutes(120));
        assert_eq!(Minutes::parse("30m 1h"), Minutes(90));
        assert_eq!(Minutes::parse(""), Minutes(0));
        assert_eq!(Minutes::parse("soon"), Minutes(0));
    }

    #[test]
    fn bare_numbers_without_unit_are_ignored() {
        assert_eq!(Minutes::parse("90"), Minutes(0));
        assert_eq!(Minutes::parse("12 45m"), Minutes(45));
    }

    #[test]
    fn legacy_spent_over_estimate_sums_both_tokens() {
        assert_eq!(Minutes::parse("45m/1h"), Minutes(105));
    }

    #[test]
    fn formats_hours_before_minutes() {
        assert_eq!(Minutes(90).to_string(), "1h 30m");
        assert_eq!(Minutes(45).to_string(), "45m");
        assert_eq!(Minutes(120).to_string(), "2h");
        assert_eq!(Minutes(0).to_string(), "0m");
    }

    #[test]
    fn to_std_is_sixty_seconds_per_minute() {
        assert_eq!(Minutes(8).to_std(), std::time::Duration::from_secs(480));
    }
}
