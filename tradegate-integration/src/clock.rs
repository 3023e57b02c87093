use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

/// Wall clock readable as milliseconds since the Unix epoch.
///
/// Rate governors and retry classifiers take their notion of "now" from a
/// [`Clock`] handle rather than the system, keeping window arithmetic
/// deterministic under test.
pub trait Clock: std::fmt::Debug + Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Shared [`Clock`] handle.
pub type SharedClock = Arc<dyn Clock>;

/// [`Clock`] backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Construct the default process-wide [`SharedClock`].
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// Manually advanced [`Clock`] for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            now_ms: AtomicI64::new(now_ms),
        })
    }

    pub fn advance(&self, duration: Duration) {
        self.now_ms
            .fetch_add(duration.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Suspend the current task for the provided [`Duration`].
///
/// The single suspend primitive used by governor wait loops and classifier
/// pre-retry sleeps. Zero and negative-adjacent durations return immediately
/// without yielding to the timer wheel.
pub async fn sleep_for(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_700_000_000_000);
        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now_ms(), 1_700_000_001_500);

        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[tokio::test]
    async fn test_sleep_for_zero_returns_immediately() {
        tokio::time::pause();
        // Must not register a timer at all
        sleep_for(Duration::ZERO).await;
    }
}
