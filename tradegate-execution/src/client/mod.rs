use crate::{
    CallOutcome,
    error::CallError,
    governor::{Endpoint, Governor},
    model::{
        balance::FreeAsset,
        fee::{PairUserFee, UserFee},
        market::{Candle, CandleRange, TickerPrice, Trade},
        order::{CanonicalOrder, OpenOrderRequest, OpenOrders, OrderIdQuery, OrderQuery},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::time::Duration;
use tradegate_instrument::{instrument::Instrument, interval::CandleInterval, symbol::Symbol, venue::VenueId};
use tradegate_integration::{
    clock::{SharedClock, sleep_for},
    profile::TimeProfile,
};

/// Runtime-selected connector and the provider factory.
pub mod any;

/// Binance connector (spot-com / spot-us / usdm / coinm).
pub mod binance;

/// Bitget connector (spot + mix futures).
pub mod bitget;

/// Bybit V5 connector (spot + linear futures).
pub mod bybit;

/// Coinbase Advanced Trade connector (spot only).
pub mod coinbase;

/// KuCoin connector (spot + futures).
pub mod kucoin;

/// OKX V5 connector (spot + swap via instType).
pub mod okx;

/// The provider-agnostic gateway contract.
///
/// Every method returns a [`CallOutcome`] regardless of the backing venue;
/// derivatives methods are terminal `"Futures type missed"` errors on
/// spot-configured instances.
pub trait Connector {
    fn venue(&self) -> VenueId;

    // Account
    fn get_balance(&self) -> impl Future<Output = CallOutcome<Vec<FreeAsset>>> + Send;
    fn get_api_permission(&self) -> impl Future<Output = CallOutcome<bool>> + Send;
    fn get_uid(&self) -> impl Future<Output = CallOutcome<SmolStr>> + Send;
    fn get_affiliate(&self, uid: &str) -> impl Future<Output = CallOutcome<bool>> + Send;

    // Orders
    fn open_order(
        &self,
        request: OpenOrderRequest,
    ) -> impl Future<Output = CallOutcome<CanonicalOrder>> + Send;
    fn get_order(
        &self,
        query: OrderQuery,
    ) -> impl Future<Output = CallOutcome<CanonicalOrder>> + Send;
    fn cancel_order(
        &self,
        query: OrderQuery,
    ) -> impl Future<Output = CallOutcome<CanonicalOrder>> + Send;
    fn cancel_order_by_order_id(
        &self,
        query: OrderIdQuery,
    ) -> impl Future<Output = CallOutcome<CanonicalOrder>> + Send;
    fn get_all_open_orders(
        &self,
        symbol: Option<Symbol>,
        return_orders: bool,
    ) -> impl Future<Output = CallOutcome<OpenOrders>> + Send;

    // Market data
    fn latest_price(&self, symbol: Symbol) -> impl Future<Output = CallOutcome<Decimal>> + Send;
    fn get_all_prices(&self) -> impl Future<Output = CallOutcome<Vec<TickerPrice>>> + Send;
    fn get_candles(
        &self,
        symbol: Symbol,
        interval: CandleInterval,
        range: CandleRange,
    ) -> impl Future<Output = CallOutcome<Vec<Candle>>> + Send;
    fn get_trades(
        &self,
        symbol: Symbol,
        limit: Option<u32>,
    ) -> impl Future<Output = CallOutcome<Vec<Trade>>> + Send;

    // Instruments
    fn get_exchange_info(
        &self,
        symbol: Symbol,
    ) -> impl Future<Output = CallOutcome<Instrument>> + Send;
    fn get_all_exchange_info(&self) -> impl Future<Output = CallOutcome<Vec<Instrument>>> + Send;

    // Fees
    fn get_user_fees(&self, symbol: Symbol) -> impl Future<Output = CallOutcome<UserFee>> + Send;
    fn get_all_user_fees(&self) -> impl Future<Output = CallOutcome<Vec<PairUserFee>>> + Send;

    // Derivatives
    fn change_leverage(
        &self,
        symbol: Symbol,
        leverage: u32,
    ) -> impl Future<Output = CallOutcome<()>> + Send;
    fn change_margin_type(
        &self,
        symbol: Symbol,
        margin: MarginType,
    ) -> impl Future<Output = CallOutcome<()>> + Send;
    fn get_hedge(&self) -> impl Future<Output = CallOutcome<bool>> + Send;
    fn set_hedge(&self, hedge: bool) -> impl Future<Output = CallOutcome<()>> + Send;
    fn get_positions(
        &self,
        symbol: Option<Symbol>,
    ) -> impl Future<Output = CallOutcome<Vec<PositionInfo>>> + Send;
    fn leverage_bracket(
        &self,
        symbol: Symbol,
    ) -> impl Future<Output = CallOutcome<Vec<LeverageBracket>>> + Send;
}

/// Debit the governor for `endpoint`, suspending until admitted.
///
/// Runs the check/sleep loop and stamps the queue phase of the profile.
/// Fails with `"Response timeout"` before sleeping if the accumulated queue
/// wait would consume the call deadline.
pub(crate) async fn acquire_slot<G>(
    governor: &G,
    endpoint: &Endpoint,
    clock: &SharedClock,
    timeout: Duration,
    profile: &mut TimeProfile,
) -> Result<(), CallError>
where
    G: Governor,
{
    profile.stamp_queue_start(clock.now_ms());
    let mut waited = Duration::ZERO;

    loop {
        let wait = governor.check(endpoint).await;
        if wait.is_zero() {
            profile.stamp_queue_end(clock.now_ms());
            return Ok(());
        }
        if waited + wait >= timeout {
            profile.stamp_queue_end(clock.now_ms());
            return Err(CallError::QueueTimeout);
        }
        waited += wait;
        sleep_for(wait).await;
    }
}

/// Growing sleeps of the post-create/cancel authoritative lookup, applied
/// against "order not found" eventual-consistency answers.
pub(crate) const LOOKUP_BACKOFF_MS: [u64; 5] = [500, 500, 1000, 3000, 5000];

/// Re-run `lookup` through the eventual-consistency window.
///
/// Used after create/cancel, where the authoritative follow-up read can race
/// the venue's own propagation. Failures other than "not found" pass
/// straight through.
pub(crate) async fn lookup_until_visible<T, E, F>(
    mut lookup: F,
    is_not_found: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: AsyncFnMut() -> Result<T, E>,
{
    let mut last_not_found = None;

    for delay_ms in LOOKUP_BACKOFF_MS {
        match lookup().await {
            Ok(value) => return Ok(value),
            Err(error) if is_not_found(&error) => {
                last_not_found = Some(error);
                sleep_for(Duration::from_millis(delay_ms)).await;
            }
            Err(error) => return Err(error),
        }
    }

    Err(last_not_found.expect("lookup loop stored the error it slept on"))
}

/// Assemble the final [`CallOutcome`], sealing the profile.
pub(crate) fn seal_outcome<T, G>(
    result: Result<T, CallError>,
    governor: &G,
    clock: &SharedClock,
    mut profile: TimeProfile,
    attempts: u32,
) -> CallOutcome<T>
where
    G: Governor,
{
    profile.attempts = attempts;
    profile.seal(clock.now_ms());
    CallOutcome {
        result,
        usage: governor.snapshot(),
        profile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::VenueError,
        governor::{LimitKind, UsageReading},
    };
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };
    use tradegate_integration::clock::ManualClock;

    /// Governor scripted to return a fixed wait N times, then admit.
    struct ScriptedGovernor {
        waits_remaining: AtomicU32,
        wait: Duration,
    }

    impl Governor for ScriptedGovernor {
        async fn check(&self, _endpoint: &Endpoint) -> Duration {
            if self
                .waits_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                self.wait
            } else {
                Duration::ZERO
            }
        }

        fn snapshot(&self) -> Vec<UsageReading> {
            vec![]
        }
    }

    const ENDPOINT: Endpoint = Endpoint {
        name: "test",
        kind: LimitKind::Request,
        weight: 1,
    };

    #[tokio::test]
    async fn test_acquire_slot_sleeps_then_proceeds() {
        tokio::time::pause();
        let governor = ScriptedGovernor {
            waits_remaining: AtomicU32::new(2),
            wait: Duration::from_millis(50),
        };
        let clock = ManualClock::new(1_000) as SharedClock;
        let mut profile = TimeProfile::start(1_000);

        let result = acquire_slot(
            &governor,
            &ENDPOINT,
            &clock,
            Duration::from_secs(1),
            &mut profile,
        )
        .await;

        assert!(result.is_ok());
        assert!(profile.queue_start.is_some());
        assert!(profile.queue_end.is_some());
    }

    #[tokio::test]
    async fn test_acquire_slot_times_out_without_sleeping_past_budget() {
        let governor = ScriptedGovernor {
            waits_remaining: AtomicU32::new(1),
            wait: Duration::from_secs(600),
        };
        let clock = ManualClock::new(1_000) as SharedClock;
        let mut profile = TimeProfile::start(1_000);

        let started = std::time::Instant::now();
        let result = acquire_slot(
            &governor,
            &ENDPOINT,
            &clock,
            Duration::from_secs(300),
            &mut profile,
        )
        .await;

        assert_eq!(result.unwrap_err(), CallError::QueueTimeout);
        // Must fail immediately, not after attempting the 600s sleep
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_lookup_until_visible_retries_not_found_only() {
        tokio::time::pause();
        let calls = AtomicU32::new(0);

        let result = lookup_until_visible(
            async || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                if call < 2 {
                    Err(VenueError::new("The order does not exist"))
                } else {
                    Ok(call)
                }
            },
            |error| error.message_contains("does not exist"),
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_lookup_until_visible_passes_other_errors_through() {
        let result: Result<(), _> = lookup_until_visible(
            async || Err(VenueError::new("Invalid symbol")),
            |error| error.message_contains("does not exist"),
        )
        .await;

        assert_eq!(result.unwrap_err().message, "Invalid symbol");
    }
}
