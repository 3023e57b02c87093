use super::{Endpoint, Governor, GovernorFeedback, SATURATED, UsageReading, Window, ledger_mutex};
use parking_lot::Mutex;
use std::time::Duration;
use tradegate_integration::clock::SharedClock;

/// KuCoin resource pools. Every endpoint belongs to exactly one.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KucoinCategory {
    Public,
    Spot,
    Futures,
    Management,
}

impl KucoinCategory {
    /// Weight budget per 30-second frame.
    fn budget(&self) -> u64 {
        match self {
            KucoinCategory::Public => 2_000,
            KucoinCategory::Spot => 3_000,
            KucoinCategory::Futures => 2_000,
            KucoinCategory::Management => 2_000,
        }
    }

    /// Category is carried as the endpoint-name prefix, eg/ `"spot/orders"`.
    fn from_endpoint(name: &str) -> Self {
        match name.split('/').next() {
            Some("spot") => KucoinCategory::Spot,
            Some("futures") => KucoinCategory::Futures,
            Some("management") => KucoinCategory::Management,
            _ => KucoinCategory::Public,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            KucoinCategory::Public => "public",
            KucoinCategory::Spot => "spot",
            KucoinCategory::Futures => "futures",
            KucoinCategory::Management => "management",
        }
    }
}

const CATEGORY_FRAME_MS: i64 = 30_000;

/// Global raw-request cap independent of category weights.
const GLOBAL_LIMIT: u64 = 6_000;
const GLOBAL_WINDOW_MS: i64 = 60_000;

const LEDGER_KEY: &str = "kucoin";

#[derive(Debug, Default)]
struct KucoinLedger {
    public: Window,
    spot: Window,
    futures: Window,
    management: Window,
    global: Window,
}

impl KucoinLedger {
    fn category(&mut self, category: KucoinCategory) -> &mut Window {
        match category {
            KucoinCategory::Public => &mut self.public,
            KucoinCategory::Spot => &mut self.spot,
            KucoinCategory::Futures => &mut self.futures,
            KucoinCategory::Management => &mut self.management,
        }
    }
}

/// Category-bucket KuCoin governor: per-category weight budgets over 30-second
/// frames plus a global raw-request window.
#[derive(Debug)]
pub struct KucoinGovernor {
    clock: SharedClock,
    state: Mutex<KucoinLedger>,
}

impl KucoinGovernor {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: Mutex::new(KucoinLedger::default()),
        }
    }
}

impl Governor for KucoinGovernor {
    async fn check(&self, endpoint: &Endpoint) -> Duration {
        let _guard = ledger_mutex().lock(LEDGER_KEY).await;
        let now = self.clock.now_ms();
        let category = KucoinCategory::from_endpoint(endpoint.name);
        let mut state = self.state.lock();

        state.global.roll(now, GLOBAL_WINDOW_MS);
        state.category(category).roll(now, CATEGORY_FRAME_MS);

        let global_wait = (state.global.used + 1 > GLOBAL_LIMIT)
            .then(|| state.global.remaining_ms(now, GLOBAL_WINDOW_MS));

        let bucket = state.category(category);
        let category_wait = (bucket.used + u64::from(endpoint.weight) > category.budget())
            .then(|| bucket.remaining_ms(now, CATEGORY_FRAME_MS));

        match global_wait.into_iter().chain(category_wait).max() {
            Some(wait) => Duration::from_millis(wait.max(1) as u64),
            None => {
                state.global.used += 1;
                state.category(category).used += u64::from(endpoint.weight);
                Duration::ZERO
            }
        }
    }

    fn snapshot(&self) -> Vec<UsageReading> {
        let mut state = self.state.lock();
        [
            KucoinCategory::Public,
            KucoinCategory::Spot,
            KucoinCategory::Futures,
            KucoinCategory::Management,
        ]
        .into_iter()
        .map(|category| {
            let fraction = state.category(category).fraction(category.budget());
            UsageReading::new(category.as_str(), fraction)
        })
        .collect()
    }
}

impl GovernorFeedback for KucoinGovernor {
    fn saturate(&self) {
        let mut state = self.state.lock();
        state.public.used = SATURATED;
        state.spot.used = SATURATED;
        state.futures.used = SATURATED;
        state.management.used = SATURATED;
        state.global.used = SATURATED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tradegate_integration::clock::ManualClock;

    #[tokio::test]
    async fn test_categories_hold_independent_budgets() {
        let clock = ManualClock::new(1_700_000_000_000);
        let governor = KucoinGovernor::new(Arc::clone(&clock) as SharedClock);

        // Exhaust the spot budget in one debit
        let heavy = Endpoint::order("spot/orders", 3_000);
        assert_eq!(governor.check(&heavy).await, Duration::ZERO);
        assert!(governor.check(&Endpoint::order("spot/orders", 2)).await > Duration::ZERO);

        // Futures and public categories still admit
        assert_eq!(
            governor.check(&Endpoint::order("futures/orders", 2)).await,
            Duration::ZERO
        );
        assert_eq!(
            governor.check(&Endpoint::request("public/symbols", 4)).await,
            Duration::ZERO
        );
    }

    #[tokio::test]
    async fn test_category_frame_rolls_after_30s() {
        let clock = ManualClock::new(1_700_000_000_000);
        let governor = KucoinGovernor::new(Arc::clone(&clock) as SharedClock);

        let heavy = Endpoint::order("spot/orders", 3_000);
        assert_eq!(governor.check(&heavy).await, Duration::ZERO);
        let wait = governor.check(&heavy).await;
        assert_eq!(wait, Duration::from_millis(30_000));

        clock.advance(Duration::from_millis(30_001));
        assert_eq!(governor.check(&heavy).await, Duration::ZERO);
    }
}
