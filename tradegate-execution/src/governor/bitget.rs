use super::{Endpoint, Governor, GovernorFeedback, SATURATED, UsageReading, Window, ledger_mutex};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::time::Duration;
use tradegate_integration::clock::SharedClock;

/// Global request cap per minute, across every Bitget endpoint.
const GLOBAL_LIMIT: u64 = 6_000;
const GLOBAL_WINDOW_MS: i64 = 60_000;

/// Per-endpoint frames are one second wide.
const ENDPOINT_WINDOW_MS: i64 = 1_000;

/// Headroom margin: effective ceiling = nominal × (1 − margin).
const SAFETY_MARGIN: f64 = 0.1;

const LEDGER_KEY: &str = "bitget";

#[derive(Debug, Default)]
struct BitgetLedger {
    global: Window,
    per_endpoint: FnvHashMap<SmolStr, Window>,
}

/// Dual-level Bitget governor.
///
/// A call must clear both the global per-minute window and its endpoint's
/// one-second window; on overflow the larger of the two required waits is
/// returned. `endpoint.weight` carries the endpoint's nominal per-second
/// cap, since Bitget publishes those per route rather than as weights.
#[derive(Debug)]
pub struct BitgetGovernor {
    clock: SharedClock,
    state: Mutex<BitgetLedger>,
}

impl BitgetGovernor {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: Mutex::new(BitgetLedger::default()),
        }
    }

    fn effective(nominal: u64) -> u64 {
        (nominal as f64 * (1.0 - SAFETY_MARGIN)).floor() as u64
    }
}

impl Governor for BitgetGovernor {
    async fn check(&self, endpoint: &Endpoint) -> Duration {
        let _guard = ledger_mutex().lock(LEDGER_KEY).await;
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        state.global.roll(now, GLOBAL_WINDOW_MS);
        let bucket = state
            .per_endpoint
            .entry(SmolStr::new(endpoint.name))
            .or_default();
        bucket.roll(now, ENDPOINT_WINDOW_MS);

        let global_wait = (state.global.used + 1 > Self::effective(GLOBAL_LIMIT))
            .then(|| state.global.remaining_ms(now, GLOBAL_WINDOW_MS));

        let bucket = state
            .per_endpoint
            .get_mut(endpoint.name)
            .expect("bucket inserted above");
        let endpoint_wait = (bucket.used + 1 > Self::effective(u64::from(endpoint.weight)))
            .then(|| bucket.remaining_ms(now, ENDPOINT_WINDOW_MS));

        match global_wait.into_iter().chain(endpoint_wait).max() {
            Some(wait) => Duration::from_millis(wait.max(1) as u64),
            None => {
                state.global.used += 1;
                state
                    .per_endpoint
                    .get_mut(endpoint.name)
                    .expect("bucket inserted above")
                    .used += 1;
                Duration::ZERO
            }
        }
    }

    fn snapshot(&self) -> Vec<UsageReading> {
        let state = self.state.lock();
        vec![UsageReading::new(
            "requests",
            state.global.fraction(Self::effective(GLOBAL_LIMIT)),
        )]
    }
}

impl GovernorFeedback for BitgetGovernor {
    fn saturate(&self) {
        let mut state = self.state.lock();
        state.global.used = SATURATED;
        for bucket in state.per_endpoint.values_mut() {
            bucket.used = SATURATED;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tradegate_integration::clock::ManualClock;

    #[tokio::test]
    async fn test_endpoint_frame_is_one_second() {
        let clock = ManualClock::new(1_700_000_000_000);
        let governor = BitgetGovernor::new(Arc::clone(&clock) as SharedClock);

        // Nominal 10/s, effective 9/s
        let endpoint = Endpoint::order("place-order", 10);
        for _ in 0..9 {
            assert_eq!(governor.check(&endpoint).await, Duration::ZERO);
        }
        let wait = governor.check(&endpoint).await;
        assert_eq!(wait, Duration::from_millis(1_000));

        // A different endpoint is unaffected
        let other = Endpoint::request("ticker", 20);
        assert_eq!(governor.check(&other).await, Duration::ZERO);

        clock.advance(Duration::from_millis(1_001));
        assert_eq!(governor.check(&endpoint).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_global_window_caps_across_endpoints() {
        let clock = ManualClock::new(1_700_000_000_000);
        let governor = BitgetGovernor::new(Arc::clone(&clock) as SharedClock);

        let endpoint = Endpoint::request("ticker", 20);
        assert_eq!(governor.check(&endpoint).await, Duration::ZERO);

        governor.saturate();
        let wait = governor.check(&endpoint).await;
        // Window anchored by the first check; the full minute remains
        assert_eq!(wait, Duration::from_millis(60_000));
    }
}
