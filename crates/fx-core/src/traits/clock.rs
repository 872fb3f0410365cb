//! Wall-clock abstraction.

use chrono::{DateTime, NaiveDate, Utc};

/// Defines how pipeline components determine the current time.
///
/// Generally a component will use a:
/// * [`SystemClock`] when running against a live source.
/// * [`FixedClock`] in tests and replays.
pub trait Clock: Send + Sync {
    fn time(&self) -> DateTime<Utc>;

    /// Current calendar date (UTC).
    fn today(&self) -> NaiveDate {
        self.time().date_naive()
    }
}

/// Live clock using `Utc::now()`.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn time(&self) -> DateTime<Utc> {
        self.0
    }
}
