use serde::{Deserialize, Serialize};
use std::{sync::OnceLock, time::Duration};
use tradegate_integration::keyed::KeyedMutex;

/// Binance split-ledger governor (spot-com / spot-us / usdm / coinm).
pub mod binance;

/// Bitget dual-level governor (global per-minute + per-endpoint per-second).
pub mod bitget;

/// Bybit single sliding-window governor.
pub mod bybit;

/// Coinbase private/public bucket governor.
pub mod coinbase;

/// KuCoin category-bucket governor.
pub mod kucoin;

/// OKX ad-hoc per-endpoint bucket governor.
pub mod okx;

/// Ledger value that reads as saturated for any realistic ceiling.
///
/// Classifiers command this on overload responses so other inflight callers
/// observe the saturation and back off before the server tells them itself.
pub const SATURATED: u64 = 100_000;

/// Which ledger a call debits on venues with split request/order accounting.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum LimitKind {
    Request,
    Order,
}

/// Static description of one venue endpoint, as consumed by `check`.
///
/// `weight` is venue-relative: Binance debits it from the weight ledger,
/// while Bitget/OKX interpret it as the endpoint's per-window cap.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Endpoint {
    pub name: &'static str,
    pub kind: LimitKind,
    pub weight: u32,
}

impl Endpoint {
    pub const fn request(name: &'static str, weight: u32) -> Self {
        Self {
            name,
            kind: LimitKind::Request,
            weight,
        }
    }

    pub const fn order(name: &'static str, weight: u32) -> Self {
        Self {
            name,
            kind: LimitKind::Order,
            weight,
        }
    }
}

/// One fractional ledger readout, eg/ `("weight", 0.42)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReading {
    pub kind: smol_str::SmolStr,
    pub used: f64,
}

impl UsageReading {
    pub fn new(kind: impl Into<smol_str::SmolStr>, used: f64) -> Self {
        Self {
            kind: kind.into(),
            used,
        }
    }
}

/// Per-venue rate-limit ledger.
///
/// `check` returning [`Duration::ZERO`] means the ledger has been debited
/// and the caller may proceed. A positive duration means the caller must
/// sleep that long and call `check` again; nothing was debited. The facade
/// runs this loop, bounded by the call deadline.
pub trait Governor: Send + Sync {
    /// Attempt to debit the ledger for `endpoint`.
    fn check(&self, endpoint: &Endpoint) -> impl Future<Output = Duration> + Send;

    /// Non-queueing fractional usage readout for observability.
    fn snapshot(&self) -> Vec<UsageReading>;
}

/// Mutations commanded by retry classifiers on authoritative server
/// feedback.
pub trait GovernorFeedback: Send + Sync {
    /// Force the current window's counters to read saturated.
    fn saturate(&self);

    /// Record a server-declared ban. Governors without ban accounting
    /// degrade to saturating the current window.
    fn record_ban_until(&self, _until_ms: i64) {
        self.saturate();
    }
}

/// Process-wide keyed mutex serialising every ledger mutation under its
/// provider-scoped key.
pub(crate) fn ledger_mutex() -> &'static KeyedMutex {
    static MUTEX: OnceLock<KeyedMutex> = OnceLock::new();
    MUTEX.get_or_init(KeyedMutex::new)
}

/// Fixed-size rolling window counter.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Window {
    pub used: u64,
    pub start_ms: i64,
}

impl Window {
    /// Roll the window if `now_ms` passed its end. Returns whether it rolled.
    pub fn roll(&mut self, now_ms: i64, size_ms: i64) -> bool {
        if now_ms - self.start_ms >= size_ms {
            self.used = 0;
            self.start_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Milliseconds until the window ends.
    pub fn remaining_ms(&self, now_ms: i64, size_ms: i64) -> i64 {
        (self.start_ms + size_ms - now_ms).max(0)
    }

    pub fn fraction(&self, limit: u64) -> f64 {
        if limit == 0 {
            return 0.0;
        }
        self.used as f64 / limit as f64
    }
}

/// Process-wide default governor instances, one per provider ledger.
///
/// Facades resolve their governor here unless one is injected; tests
/// construct their own instances against a manual clock.
pub mod registry {
    use super::{
        binance::{BinanceDomain, BinanceGovernor},
        bitget::BitgetGovernor,
        bybit::BybitGovernor,
        coinbase::CoinbaseGovernor,
        kucoin::KucoinGovernor,
        okx::OkxGovernor,
    };
    use std::sync::{Arc, OnceLock};
    use tradegate_integration::clock::system_clock;

    pub fn binance(domain: BinanceDomain) -> Arc<BinanceGovernor> {
        static COM: OnceLock<Arc<BinanceGovernor>> = OnceLock::new();
        static US: OnceLock<Arc<BinanceGovernor>> = OnceLock::new();
        static USDM: OnceLock<Arc<BinanceGovernor>> = OnceLock::new();
        static COINM: OnceLock<Arc<BinanceGovernor>> = OnceLock::new();

        let cell = match domain {
            BinanceDomain::SpotCom => &COM,
            BinanceDomain::SpotUs => &US,
            BinanceDomain::Usdm => &USDM,
            BinanceDomain::Coinm => &COINM,
        };
        Arc::clone(cell.get_or_init(|| Arc::new(BinanceGovernor::new(domain, system_clock()))))
    }

    pub fn bybit() -> Arc<BybitGovernor> {
        static CELL: OnceLock<Arc<BybitGovernor>> = OnceLock::new();
        Arc::clone(CELL.get_or_init(|| Arc::new(BybitGovernor::new(system_clock()))))
    }

    pub fn bitget() -> Arc<BitgetGovernor> {
        static CELL: OnceLock<Arc<BitgetGovernor>> = OnceLock::new();
        Arc::clone(CELL.get_or_init(|| Arc::new(BitgetGovernor::new(system_clock()))))
    }

    pub fn kucoin() -> Arc<KucoinGovernor> {
        static CELL: OnceLock<Arc<KucoinGovernor>> = OnceLock::new();
        Arc::clone(CELL.get_or_init(|| Arc::new(KucoinGovernor::new(system_clock()))))
    }

    pub fn okx() -> Arc<OkxGovernor> {
        static CELL: OnceLock<Arc<OkxGovernor>> = OnceLock::new();
        Arc::clone(CELL.get_or_init(|| Arc::new(OkxGovernor::new(system_clock()))))
    }

    pub fn coinbase() -> Arc<CoinbaseGovernor> {
        static CELL: OnceLock<Arc<CoinbaseGovernor>> = OnceLock::new();
        Arc::clone(CELL.get_or_init(|| Arc::new(CoinbaseGovernor::new(system_clock()))))
    }
}
