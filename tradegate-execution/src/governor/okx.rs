use super::{Endpoint, Governor, GovernorFeedback, SATURATED, UsageReading, Window, ledger_mutex};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::time::Duration;
use tradegate_integration::clock::SharedClock;

/// OKX publishes per-endpoint caps over a short frame rather than a shared
/// account budget.
const FRAME_MS: i64 = 3_000;

#[derive(Debug, Default)]
struct OkxBucket {
    window: Window,

    /// Additive wake-up stagger for waiters blocked in this bucket's
    /// overflowing frame. Reset when the frame rolls.
    queue_counter_ms: i64,
}

/// Ad-hoc per-endpoint OKX governor: a `(count, frame_start, queue_counter)`
/// bucket is created on first use of each endpoint. `endpoint.weight`
/// carries the endpoint's per-frame cap.
///
/// Ledger mutation is serialised per endpoint (`"okx:<endpoint>"`), since
/// OKX buckets never interact.
#[derive(Debug)]
pub struct OkxGovernor {
    clock: SharedClock,
    state: Mutex<FnvHashMap<SmolStr, OkxBucket>>,
}

impl OkxGovernor {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: Mutex::new(FnvHashMap::default()),
        }
    }
}

impl Governor for OkxGovernor {
    async fn check(&self, endpoint: &Endpoint) -> Duration {
        let key = smol_str::format_smolstr!("okx:{}", endpoint.name);
        let _guard = ledger_mutex().lock(key).await;
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let bucket = state.entry(SmolStr::new(endpoint.name)).or_default();

        if bucket.window.roll(now, FRAME_MS) {
            bucket.queue_counter_ms = 0;
        }

        if bucket.window.used + 1 > u64::from(endpoint.weight) {
            let wait = bucket.window.remaining_ms(now, FRAME_MS) + bucket.queue_counter_ms;
            bucket.queue_counter_ms += 1;
            return Duration::from_millis(wait.max(1) as u64);
        }

        bucket.window.used += 1;
        Duration::ZERO
    }

    fn snapshot(&self) -> Vec<UsageReading> {
        let state = self.state.lock();
        let mut readings: Vec<_> = state
            .iter()
            .map(|(name, bucket)| {
                // Caps live on the endpoint constants; report raw counts here
                UsageReading::new(name.clone(), bucket.window.used as f64)
            })
            .collect();
        readings.sort_by(|a, b| a.kind.cmp(&b.kind));
        readings
    }
}

impl GovernorFeedback for OkxGovernor {
    fn saturate(&self) {
        let mut state = self.state.lock();
        for bucket in state.values_mut() {
            bucket.window.used = SATURATED;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tradegate_integration::clock::ManualClock;

    #[tokio::test]
    async fn test_buckets_created_on_first_use() {
        let clock = ManualClock::new(1_700_000_000_000);
        let governor = OkxGovernor::new(Arc::clone(&clock) as SharedClock);

        let orders = Endpoint::order("trade/order", 20);
        let candles = Endpoint::request("market/candles", 20);

        for _ in 0..20 {
            assert_eq!(governor.check(&orders).await, Duration::ZERO);
        }
        assert!(governor.check(&orders).await > Duration::ZERO);

        // Candle bucket is fresh
        assert_eq!(governor.check(&candles).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_queue_counter_staggers_and_resets() {
        let clock = ManualClock::new(1_700_000_000_000);
        let governor = OkxGovernor::new(Arc::clone(&clock) as SharedClock);

        let endpoint = Endpoint::request("account/balance", 1);
        assert_eq!(governor.check(&endpoint).await, Duration::ZERO);

        let first = governor.check(&endpoint).await;
        let second = governor.check(&endpoint).await;
        assert_eq!(second, first + Duration::from_millis(1));

        clock.advance(Duration::from_millis(3_001));
        assert_eq!(governor.check(&endpoint).await, Duration::ZERO);
        let after_roll = governor.check(&endpoint).await;
        assert_eq!(after_roll, Duration::from_millis(3_000));
    }
}
