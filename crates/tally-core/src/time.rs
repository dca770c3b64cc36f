//! Clock abstraction for testable timing.
//!
//! Every window computation in this system (recency cutoffs for
//! reconciliation, retention cutoffs for the sweeper, event arrival stamps)
//! is a wall-clock comparison, so the clock deals in `DateTime<Utc>`
//! directly. Production code uses [`RealClock`]; tests inject [`TestClock`]
//! to drive the windows deterministically.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};

/// Clock abstraction for timestamps and delays.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Sleeps for the specified duration.
    ///
    /// In production this maps to `tokio::time::sleep`; in tests it advances
    /// virtual time and yields immediately.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Production clock backed by the system time and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock instance.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Controllable clock for deterministic tests.
///
/// Holds the current time as microseconds since the UNIX epoch so clones
/// share one timeline. Sleeping advances the clock instead of waiting,
/// which lets tests step a campaign across the recency and retention
/// windows without real delays.
#[derive(Debug, Clone)]
pub struct TestClock {
    epoch_micros: Arc<AtomicI64>,
}

impl TestClock {
    /// Creates a test clock starting at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Creates a test clock starting at a specific instant.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { epoch_micros: Arc::new(AtomicI64::new(start.timestamp_micros())) }
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let micros = i64::try_from(duration.as_micros()).unwrap_or(i64::MAX);
        self.epoch_micros.fetch_add(micros, Ordering::AcqRel);
    }

    /// Jumps the clock to a specific instant. Backwards jumps are allowed.
    pub fn jump_to(&self, instant: DateTime<Utc>) {
        self.epoch_micros.store(instant.timestamp_micros(), Ordering::Release);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.epoch_micros.load(Ordering::Acquire);
        DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::UNIX_EPOCH)
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        Box::pin(tokio::task::yield_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_time_forward() {
        let clock = TestClock::starting_at(DateTime::UNIX_EPOCH);
        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.now(), DateTime::UNIX_EPOCH + chrono::Duration::seconds(90));
    }

    #[test]
    fn clones_share_the_same_timeline() {
        let clock = TestClock::starting_at(DateTime::UNIX_EPOCH);
        let observer = clock.clone();

        clock.advance(Duration::from_secs(7));

        assert_eq!(observer.now(), clock.now());
    }

    #[test]
    fn jump_to_allows_backwards_travel() {
        let clock = TestClock::new();
        clock.jump_to(DateTime::UNIX_EPOCH);

        assert_eq!(clock.now(), DateTime::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn sleep_advances_instead_of_waiting() {
        let clock = TestClock::starting_at(DateTime::UNIX_EPOCH);
        clock.sleep(Duration::from_secs(600)).await;

        assert_eq!(clock.now(), DateTime::UNIX_EPOCH + chrono::Duration::seconds(600));
    }
}
