use super::{Endpoint, Governor, GovernorFeedback, SATURATED, UsageReading, Window, ledger_mutex};
use parking_lot::Mutex;
use std::time::Duration;
use tradegate_integration::clock::SharedClock;

const PRIVATE_LIMIT: u64 = 10;
const PUBLIC_LIMIT: u64 = 30;
const FRAME_MS: i64 = 1_000;

const LEDGER_KEY: &str = "coinbase";

#[derive(Debug, Default)]
struct CoinbaseLedger {
    private: Window,
    public: Window,
}

/// Two-bucket Coinbase governor: authenticated endpoints debit the private
/// per-second window, key-less market data debits the public one. The
/// bucket is carried as the endpoint-name prefix, eg/ `"private/orders"`.
#[derive(Debug)]
pub struct CoinbaseGovernor {
    clock: SharedClock,
    state: Mutex<CoinbaseLedger>,
}

impl CoinbaseGovernor {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: Mutex::new(CoinbaseLedger::default()),
        }
    }

    fn is_private(endpoint: &Endpoint) -> bool {
        !endpoint.name.starts_with("public/")
    }
}

impl Governor for CoinbaseGovernor {
    async fn check(&self, endpoint: &Endpoint) -> Duration {
        let _guard = ledger_mutex().lock(LEDGER_KEY).await;
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        let (window, limit) = if Self::is_private(endpoint) {
            (&mut state.private, PRIVATE_LIMIT)
        } else {
            (&mut state.public, PUBLIC_LIMIT)
        };

        window.roll(now, FRAME_MS);

        if window.used + 1 > limit {
            return Duration::from_millis(window.remaining_ms(now, FRAME_MS).max(1) as u64);
        }

        window.used += 1;
        Duration::ZERO
    }

    fn snapshot(&self) -> Vec<UsageReading> {
        let state = self.state.lock();
        vec![
            UsageReading::new("private", state.private.fraction(PRIVATE_LIMIT)),
            UsageReading::new("public", state.public.fraction(PUBLIC_LIMIT)),
        ]
    }
}

impl GovernorFeedback for CoinbaseGovernor {
    fn saturate(&self) {
        let mut state = self.state.lock();
        state.private.used = SATURATED;
        state.public.used = SATURATED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tradegate_integration::clock::ManualClock;

    #[tokio::test]
    async fn test_private_and_public_buckets_are_independent() {
        let clock = ManualClock::new(1_700_000_000_000);
        let governor = CoinbaseGovernor::new(Arc::clone(&clock) as SharedClock);

        let private = Endpoint::order("private/orders", 1);
        let public = Endpoint::request("public/products", 1);

        for _ in 0..10 {
            assert_eq!(governor.check(&private).await, Duration::ZERO);
        }
        assert!(governor.check(&private).await > Duration::ZERO);

        // Public bucket admits three times the rate
        for _ in 0..30 {
            assert_eq!(governor.check(&public).await, Duration::ZERO);
        }
        assert!(governor.check(&public).await > Duration::ZERO);

        clock.advance(Duration::from_millis(1_001));
        assert_eq!(governor.check(&private).await, Duration::ZERO);
        assert_eq!(governor.check(&public).await, Duration::ZERO);
    }
}
