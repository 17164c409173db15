use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;

/// Source of `created_at` timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that advances by a fixed step on every read.
#[derive(Debug, Clone)]
pub struct SteppingClock {
    next: Cell<DateTime<Utc>>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self { next: Cell::new(start), step }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let now = self.next.get();
        self.next.set(now + self.step);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stepping_clock_advances() {
        let start = Utc::now();
        let clock = SteppingClock::new(start, Duration::seconds(5));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + Duration::seconds(5));
        assert!(clock.now() > start);
    }
}
