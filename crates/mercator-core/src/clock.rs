//! Simulated clock.
//!
//! All timestamps the engine hands to agents and the population come from
//! this clock, never from the wall clock, so a run is reproducible from its
//! seed and configuration alone.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// `secs` seconds as a duration, saturating at the largest representable.
pub fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Monotonic simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimClock {
    /// When the simulation started.
    started_at: DateTime<Utc>,
    /// Current simulated time.
    now: DateTime<Utc>,
}

impl SimClock {
    /// Clock standing at `start`.
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            started_at: start,
            now: start,
        }
    }

    /// Current simulated time.
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Start of the simulation.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Simulated time elapsed since the start.
    pub fn elapsed(&self) -> Duration {
        self.now.signed_duration_since(self.started_at)
    }

    /// Move forward by `by`; negative durations are ignored.
    pub fn advance(&mut self, by: Duration) -> Result<DateTime<Utc>, EngineError> {
        if by <= Duration::zero() {
            return Ok(self.now);
        }
        self.now = self
            .now
            .checked_add_signed(by)
            .ok_or(EngineError::ClockOverflow)?;
        Ok(self.now)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_forward_only() {
        let mut clock = SimClock::new(DateTime::<Utc>::UNIX_EPOCH);
        clock.advance(Duration::minutes(30)).unwrap();
        assert_eq!(clock.elapsed(), Duration::minutes(30));
        clock.advance(Duration::minutes(-10)).unwrap();
        assert_eq!(clock.elapsed(), Duration::minutes(30));
    }

    #[test]
    fn overflow_is_an_error() {
        let mut clock = SimClock::new(DateTime::<Utc>::MAX_UTC);
        assert!(matches!(
            clock.advance(Duration::seconds(1)),
            Err(EngineError::ClockOverflow)
        ));
    }
}
