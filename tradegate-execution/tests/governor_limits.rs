use std::{sync::Arc, time::Duration};
use tradegate_execution::governor::{
    Endpoint, Governor, GovernorFeedback,
    binance::{BinanceDomain, BinanceGovernor},
    bitget::BitgetGovernor,
};
use tradegate_integration::clock::{ManualClock, SharedClock};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// 2023-08-25 00:00:00 UTC, after the spot weight ceiling raise.
const POST_RAISE_MS: i64 = 1_692_921_600_000;

const BALANCE: Endpoint = Endpoint::request("account", 10);

#[tokio::test]
async fn test_spot_over_quota_call_waits_out_the_window_then_proceeds() {
    init_tracing();
    let clock = ManualClock::new(POST_RAISE_MS);
    let governor = BinanceGovernor::new(
        BinanceDomain::SpotCom,
        Arc::clone(&clock) as SharedClock,
    );

    // Preload the minute window close to the effective ceiling (4500 / 1.2)
    let preload = Endpoint::request("preload", 3741);
    assert_eq!(governor.check(&preload).await, Duration::ZERO);

    // A balance call no longer fits; the caller is told to sleep out the window
    let wait = governor.check(&BALANCE).await;
    assert_eq!(wait, Duration::from_millis(60_000));

    // After suspending past the roll, the same call is admitted with a clean ledger
    clock.advance(wait + Duration::from_millis(1));
    assert_eq!(governor.check(&BALANCE).await, Duration::ZERO);

    let usage = governor.snapshot();
    let weight = usage.iter().find(|reading| reading.kind == "weight").unwrap();
    assert!(weight.used > 0.0 && weight.used < 0.01);
}

#[tokio::test]
async fn test_contending_waiters_receive_staggered_wakeups() {
    init_tracing();
    let clock = ManualClock::new(POST_RAISE_MS);
    let governor = BinanceGovernor::new(
        BinanceDomain::SpotCom,
        Arc::clone(&clock) as SharedClock,
    );

    let preload = Endpoint::request("preload", 3750);
    assert_eq!(governor.check(&preload).await, Duration::ZERO);

    // Each blocked caller in the same window sees a strictly larger wait
    let mut waits = Vec::new();
    for _ in 0..5 {
        waits.push(governor.check(&BALANCE).await);
    }
    assert!(waits.windows(2).all(|pair| pair[1] == pair[0] + Duration::from_millis(1)));

    // The stagger resets once the window rolls
    clock.advance(Duration::from_millis(60_001));
    assert_eq!(governor.check(&preload).await, Duration::ZERO);
    assert_eq!(governor.check(&BALANCE).await, Duration::from_millis(60_000));
}

#[tokio::test]
async fn test_ban_gates_every_caller_until_expiry() {
    init_tracing();
    let now = 1_700_000_000_000;
    let clock = ManualClock::new(now);
    let governor = Arc::new(BinanceGovernor::new(
        BinanceDomain::Usdm,
        Arc::clone(&clock) as SharedClock,
    ));

    let banned_until = now + 30_000;
    governor.record_ban_until(banned_until);

    // Any caller, any endpoint: the wait is at least the remaining ban
    for endpoint in [BALANCE, Endpoint::order("order", 1)] {
        let wait = governor.check(&endpoint).await;
        assert!(wait >= Duration::from_millis(30_000));
    }

    clock.advance(Duration::from_millis(10_000));
    let wait = governor.check(&BALANCE).await;
    assert_eq!(wait, Duration::from_millis(20_000));
    assert_eq!(governor.banned_until(), Some(banned_until));

    // Past expiry (and a window roll), traffic flows again
    clock.advance(Duration::from_millis(20_001 + 60_000));
    assert_eq!(governor.check(&BALANCE).await, Duration::ZERO);
    assert_eq!(governor.banned_until(), None);
}

#[tokio::test]
async fn test_bitget_returns_the_larger_of_both_level_waits() {
    init_tracing();
    let clock = ManualClock::new(1_700_000_000_000);
    let governor = BitgetGovernor::new(Arc::clone(&clock) as SharedClock);

    // Nominal 10/s endpoint, effective 9/s after the safety margin
    let place = Endpoint::order("place-order", 10);
    for _ in 0..9 {
        assert_eq!(governor.check(&place).await, Duration::ZERO);
    }

    // Per-endpoint second is exhausted while the global minute is not
    let wait = governor.check(&place).await;
    assert_eq!(wait, Duration::from_millis(1_000));

    // When both levels are exhausted, the larger (global) wait wins
    governor.saturate();
    let wait = governor.check(&place).await;
    assert_eq!(wait, Duration::from_millis(60_000));
}

#[tokio::test]
async fn test_server_reported_usage_overwrites_local_tally() {
    init_tracing();
    let clock = ManualClock::new(POST_RAISE_MS);
    let governor = BinanceGovernor::new(
        BinanceDomain::SpotCom,
        Arc::clone(&clock) as SharedClock,
    );

    assert_eq!(governor.check(&BALANCE).await, Duration::ZERO);
    let marker = governor.weight_marker();

    // The server counted far more than we accounted locally (other
    // processes sharing the key); adopt its figure plus our inflight debits
    assert_eq!(governor.check(&BALANCE).await, Duration::ZERO);
    governor.reconcile_used_weight(3_700, marker).await;

    // 3700 + 10 inflight => the next heavy call must wait
    let heavy = Endpoint::request("klines", 100);
    assert!(governor.check(&heavy).await > Duration::ZERO);
}
