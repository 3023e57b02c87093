use super::{Endpoint, Governor, GovernorFeedback, LimitKind, SATURATED, UsageReading, Window, ledger_mutex};
use parking_lot::Mutex;
use std::time::Duration;
use tradegate_integration::clock::SharedClock;
use tracing::debug;

/// Weight every debited unit is multiplied by before comparing to the
/// ceiling. Leaves headroom for clock skew and for weight the server counted
/// that was never accounted locally.
const SAFETY_MULTIPLIER: f64 = 1.2;

/// Raw request cap across all endpoints, independent of weight.
const RAW_REQUEST_LIMIT: u64 = 1800;
const RAW_WINDOW_MS: i64 = 60_000;

const WEIGHT_WINDOW_MS: i64 = 60_000;

/// 2023-08-25 00:00:00 UTC — spot weight ceiling moved from 950 to 4500.
const SPOT_WEIGHT_RAISE_EPOCH_MS: i64 = 1_692_921_600_000;

/// Binance API surface, each holding a separate ledger.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum BinanceDomain {
    SpotCom,
    SpotUs,
    Usdm,
    Coinm,
}

impl BinanceDomain {
    pub fn ledger_key(&self) -> &'static str {
        match self {
            BinanceDomain::SpotCom => "binance-com",
            BinanceDomain::SpotUs => "binance-us",
            BinanceDomain::Usdm => "binance-usdm",
            BinanceDomain::Coinm => "binance-coinm",
        }
    }

    fn weight_limit(&self, now_ms: i64) -> u64 {
        match self {
            BinanceDomain::SpotCom => {
                if now_ms >= SPOT_WEIGHT_RAISE_EPOCH_MS {
                    4500
                } else {
                    950
                }
            }
            BinanceDomain::SpotUs => 950,
            BinanceDomain::Usdm | BinanceDomain::Coinm => 2000,
        }
    }

    /// Per-API-key order cap: (count, window).
    fn order_limit(&self) -> (u64, i64) {
        match self {
            BinanceDomain::SpotCom | BinanceDomain::SpotUs => (80, 11_000),
            BinanceDomain::Usdm => (250, 10_000),
            BinanceDomain::Coinm => (1000, 60_000),
        }
    }
}

#[derive(Debug, Default)]
struct BinanceLedger {
    weight: Window,
    raw: Window,
    orders: Window,

    /// Server-declared ban expiry, unix-ms. Zero when unbanned.
    banned_until_ms: i64,

    /// Additive wake-up stagger for waiters blocked in the same overflowing
    /// window. Reset when any window rolls.
    queue_penalty_ms: i64,

    /// Monotonic debit totals, never reset; used to compute the inflight
    /// delta when reconciling against server-reported counts.
    weight_debited_total: u64,
    orders_debited_total: u64,
}

/// Split-ledger Binance governor: weight per minute, raw requests per
/// minute, and orders per key-specific window, each compared against its
/// ceiling after the [`SAFETY_MULTIPLIER`].
///
/// On overflow, `check` returns `window remaining + queue penalty` and
/// bumps the penalty by 1 ms, so N contending callers see staggered
/// wake-ups instead of a thundering herd at the window boundary.
#[derive(Debug)]
pub struct BinanceGovernor {
    domain: BinanceDomain,
    clock: SharedClock,
    state: Mutex<BinanceLedger>,
}

impl BinanceGovernor {
    pub fn new(domain: BinanceDomain, clock: SharedClock) -> Self {
        Self {
            domain,
            clock,
            state: Mutex::new(BinanceLedger::default()),
        }
    }

    pub fn domain(&self) -> BinanceDomain {
        self.domain
    }

    fn over(used: u64, debit: u64, limit: u64) -> bool {
        (used + debit) as f64 * SAFETY_MULTIPLIER > limit as f64
    }

    /// Monotonic weight-debit total, captured by the facade before a request
    /// so the inflight delta can be derived at reconcile time.
    pub fn weight_marker(&self) -> u64 {
        self.state.lock().weight_debited_total
    }

    pub fn order_marker(&self) -> u64 {
        self.state.lock().orders_debited_total
    }

    /// Overwrite the local weight tally with the server-reported count plus
    /// whatever was debited locally since `marker` was captured.
    pub async fn reconcile_used_weight(&self, server_used: u64, marker: u64) {
        let _guard = ledger_mutex().lock(self.domain.ledger_key()).await;
        let mut state = self.state.lock();
        let inflight = state.weight_debited_total.saturating_sub(marker);
        state.weight.used = server_used + inflight;
        debug!(
            domain = self.domain.ledger_key(),
            server_used, inflight, "reconciled weight ledger"
        );
    }

    pub async fn reconcile_order_count(&self, server_used: u64, marker: u64) {
        let _guard = ledger_mutex().lock(self.domain.ledger_key()).await;
        let mut state = self.state.lock();
        let inflight = state.orders_debited_total.saturating_sub(marker);
        state.orders.used = server_used + inflight;
    }

    /// Expiry of the current server ban, if one is active.
    pub fn banned_until(&self) -> Option<i64> {
        let state = self.state.lock();
        (state.banned_until_ms > self.clock.now_ms()).then_some(state.banned_until_ms)
    }
}

impl Governor for BinanceGovernor {
    async fn check(&self, endpoint: &Endpoint) -> Duration {
        let _guard = ledger_mutex().lock(self.domain.ledger_key()).await;
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        if state.banned_until_ms > now {
            return Duration::from_millis((state.banned_until_ms - now) as u64);
        }

        let (order_limit, order_window_ms) = self.domain.order_limit();
        let rolled = state.weight.roll(now, WEIGHT_WINDOW_MS)
            | state.raw.roll(now, RAW_WINDOW_MS)
            | state.orders.roll(now, order_window_ms);
        if rolled {
            state.queue_penalty_ms = 0;
        }

        let weight_limit = self.domain.weight_limit(now);
        let overflow_ms = if Self::over(state.raw.used, 1, RAW_REQUEST_LIMIT) {
            Some(state.raw.remaining_ms(now, RAW_WINDOW_MS))
        } else if Self::over(state.weight.used, u64::from(endpoint.weight), weight_limit) {
            Some(state.weight.remaining_ms(now, WEIGHT_WINDOW_MS))
        } else if endpoint.kind == LimitKind::Order
            && Self::over(state.orders.used, 1, order_limit)
        {
            Some(state.orders.remaining_ms(now, order_window_ms))
        } else {
            None
        };

        if let Some(window_remaining) = overflow_ms {
            let wait = window_remaining + state.queue_penalty_ms;
            state.queue_penalty_ms += 1;
            debug!(
                domain = self.domain.ledger_key(),
                endpoint = endpoint.name,
                wait_ms = wait,
                "ledger overflow, suspending caller"
            );
            return Duration::from_millis(wait.max(1) as u64);
        }

        state.raw.used += 1;
        state.weight.used += u64::from(endpoint.weight);
        state.weight_debited_total += u64::from(endpoint.weight);
        if endpoint.kind == LimitKind::Order {
            state.orders.used += 1;
            state.orders_debited_total += 1;
        }

        Duration::ZERO
    }

    fn snapshot(&self) -> Vec<UsageReading> {
        let now = self.clock.now_ms();
        let state = self.state.lock();
        let (order_limit, _) = self.domain.order_limit();
        vec![
            UsageReading::new("weight", state.weight.fraction(self.domain.weight_limit(now))),
            UsageReading::new("orders", state.orders.fraction(order_limit)),
            UsageReading::new("raw", state.raw.fraction(RAW_REQUEST_LIMIT)),
        ]
    }
}

impl GovernorFeedback for BinanceGovernor {
    fn saturate(&self) {
        let mut state = self.state.lock();
        state.weight.used = SATURATED;
        state.raw.used = SATURATED;
        state.orders.used = SATURATED;
    }

    fn record_ban_until(&self, until_ms: i64) {
        let mut state = self.state.lock();
        state.banned_until_ms = state.banned_until_ms.max(until_ms);
        // Saturate as well so waiters already past the ban gate back off
        state.weight.used = SATURATED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradegate_integration::clock::ManualClock;

    const BALANCE: Endpoint = Endpoint::request("account", 10);
    const PLACE: Endpoint = Endpoint::order("order", 1);

    fn governor(domain: BinanceDomain, clock: &std::sync::Arc<ManualClock>) -> BinanceGovernor {
        BinanceGovernor::new(domain, std::sync::Arc::clone(clock) as SharedClock)
    }

    #[tokio::test]
    async fn test_debits_until_safety_ceiling() {
        // Post-raise spot window: ceiling 4500, effective 4500/1.2 = 3750
        let clock = ManualClock::new(SPOT_WEIGHT_RAISE_EPOCH_MS);
        let governor = governor(BinanceDomain::SpotCom, &clock);

        let heavy = Endpoint::request("klines", 50);
        for _ in 0..75 {
            assert_eq!(governor.check(&heavy).await, Duration::ZERO);
        }
        // 76th caller would push effective usage past the ceiling
        let wait = governor.check(&heavy).await;
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_millis(60_000));
    }

    #[tokio::test]
    async fn test_queue_penalty_staggers_waiters() {
        let clock = ManualClock::new(SPOT_WEIGHT_RAISE_EPOCH_MS);
        let governor = governor(BinanceDomain::SpotCom, &clock);

        let huge = Endpoint::request("all", 3750);
        assert_eq!(governor.check(&huge).await, Duration::ZERO);

        let first = governor.check(&BALANCE).await;
        let second = governor.check(&BALANCE).await;
        let third = governor.check(&BALANCE).await;
        assert_eq!(second, first + Duration::from_millis(1));
        assert_eq!(third, first + Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_window_roll_resets_counters_and_penalty() {
        let clock = ManualClock::new(SPOT_WEIGHT_RAISE_EPOCH_MS);
        let governor = governor(BinanceDomain::SpotCom, &clock);

        let huge = Endpoint::request("all", 3750);
        assert_eq!(governor.check(&huge).await, Duration::ZERO);
        assert!(governor.check(&BALANCE).await > Duration::ZERO);

        clock.advance(Duration::from_millis(60_001));
        assert_eq!(governor.check(&huge).await, Duration::ZERO);
        // Penalty reset with the roll: next overflow wait starts from zero again
        let wait = governor.check(&BALANCE).await;
        assert_eq!(wait, Duration::from_millis(60_000));
    }

    #[tokio::test]
    async fn test_order_ledger_independent_window() {
        let clock = ManualClock::new(SPOT_WEIGHT_RAISE_EPOCH_MS);
        let governor = governor(BinanceDomain::Usdm, &clock);

        // usdm: 250 orders / 10 s, effective 250/1.2 = 208
        for _ in 0..208 {
            assert_eq!(governor.check(&PLACE).await, Duration::ZERO);
        }
        assert!(governor.check(&PLACE).await > Duration::ZERO);

        // Plain requests are not order-capped
        assert_eq!(governor.check(&BALANCE).await, Duration::ZERO);

        clock.advance(Duration::from_millis(10_001));
        assert_eq!(governor.check(&PLACE).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_ban_gate_returns_remaining() {
        let clock = ManualClock::new(1_700_000_000_000);
        let governor = governor(BinanceDomain::SpotCom, &clock);

        governor.record_ban_until(1_700_000_030_000);
        let wait = governor.check(&BALANCE).await;
        assert_eq!(wait, Duration::from_millis(30_000));

        clock.advance(Duration::from_millis(10_000));
        let wait = governor.check(&BALANCE).await;
        assert_eq!(wait, Duration::from_millis(20_000));

        clock.advance(Duration::from_millis(20_001));
        // Ban expired; the saturated window must also have rolled by now
        clock.advance(Duration::from_millis(60_000));
        assert_eq!(governor.check(&BALANCE).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_pre_raise_spot_ceiling() {
        let clock = ManualClock::new(SPOT_WEIGHT_RAISE_EPOCH_MS - 120_000);
        let governor = governor(BinanceDomain::SpotCom, &clock);

        // Pre-2023-08-25 ceiling 950, effective 791
        let heavy = Endpoint::request("klines", 100);
        for _ in 0..7 {
            assert_eq!(governor.check(&heavy).await, Duration::ZERO);
        }
        assert!(governor.check(&heavy).await > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_reconcile_overwrites_with_inflight_delta() {
        let clock = ManualClock::new(SPOT_WEIGHT_RAISE_EPOCH_MS);
        let governor = governor(BinanceDomain::SpotCom, &clock);

        assert_eq!(governor.check(&BALANCE).await, Duration::ZERO);
        let marker = governor.weight_marker();

        // Two more calls debited while the response was inflight
        assert_eq!(governor.check(&BALANCE).await, Duration::ZERO);
        assert_eq!(governor.check(&BALANCE).await, Duration::ZERO);

        governor.reconcile_used_weight(500, marker).await;
        let usage = governor.snapshot();
        let weight = usage.iter().find(|u| u.kind == "weight").unwrap();
        assert!((weight.used - (520.0 / 4500.0)).abs() < 1e-9);
    }
}
