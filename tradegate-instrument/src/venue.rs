use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Unique identifier for a fronted venue API surface.
///
/// ### Notes
/// A venue may have a distinct server per product family. For example,
/// Binance spot and Binance USDT-margined futures have distinct APIs and
/// rate ledgers, and are therefore represented as unique variants.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum VenueId {
    BinanceSpot,
    BinanceUs,
    BinanceFuturesUsd,
    BinanceFuturesCoin,
    BybitSpot,
    BybitFuturesUsd,
    BitgetSpot,
    BitgetFutures,
    KucoinSpot,
    KucoinFutures,
    Okx,
    Coinbase,
}

impl VenueId {
    /// Return the &str representation of this [`VenueId`].
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueId::BinanceSpot => "binance_spot",
            VenueId::BinanceUs => "binance_us",
            VenueId::BinanceFuturesUsd => "binance_futures_usd",
            VenueId::BinanceFuturesCoin => "binance_futures_coin",
            VenueId::BybitSpot => "bybit_spot",
            VenueId::BybitFuturesUsd => "bybit_futures_usd",
            VenueId::BitgetSpot => "bitget_spot",
            VenueId::BitgetFutures => "bitget_futures",
            VenueId::KucoinSpot => "kucoin_spot",
            VenueId::KucoinFutures => "kucoin_futures",
            VenueId::Okx => "okx",
            VenueId::Coinbase => "coinbase",
        }
    }

    /// Human-facing provider name, as used in connectivity error messages.
    pub fn provider(&self) -> &'static str {
        match self {
            VenueId::BinanceSpot
            | VenueId::BinanceUs
            | VenueId::BinanceFuturesUsd
            | VenueId::BinanceFuturesCoin => "Binance",
            VenueId::BybitSpot | VenueId::BybitFuturesUsd => "Bybit",
            VenueId::BitgetSpot | VenueId::BitgetFutures => "Bitget",
            VenueId::KucoinSpot | VenueId::KucoinFutures => "KuCoin",
            VenueId::Okx => "OKX",
            VenueId::Coinbase => "Coinbase",
        }
    }

    /// Key of the process-wide rate ledger this venue surface debits.
    ///
    /// Binance spot-com, spot-us, usdm and coinm hold separate ledgers;
    /// Bybit, Bitget, KuCoin, OKX and Coinbase each share one ledger across
    /// product families.
    pub fn ledger_key(&self) -> &'static str {
        match self {
            VenueId::BinanceSpot => "binance-com",
            VenueId::BinanceUs => "binance-us",
            VenueId::BinanceFuturesUsd => "binance-usdm",
            VenueId::BinanceFuturesCoin => "binance-coinm",
            VenueId::BybitSpot | VenueId::BybitFuturesUsd => "bybit",
            VenueId::BitgetSpot | VenueId::BitgetFutures => "bitget",
            VenueId::KucoinSpot | VenueId::KucoinFutures => "kucoin",
            VenueId::Okx => "okx",
            VenueId::Coinbase => "coinbase",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binance_surfaces_hold_distinct_ledgers() {
        let ledgers = [
            VenueId::BinanceSpot.ledger_key(),
            VenueId::BinanceUs.ledger_key(),
            VenueId::BinanceFuturesUsd.ledger_key(),
            VenueId::BinanceFuturesCoin.ledger_key(),
        ];
        let mut deduped = ledgers.to_vec();
        deduped.dedup();
        assert_eq!(deduped.len(), 4);
    }

    #[test]
    fn test_product_families_share_provider_ledger() {
        assert_eq!(
            VenueId::BybitSpot.ledger_key(),
            VenueId::BybitFuturesUsd.ledger_key()
        );
        assert_eq!(
            VenueId::KucoinSpot.ledger_key(),
            VenueId::KucoinFutures.ledger_key()
        );
    }
}
