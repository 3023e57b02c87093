#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity)]

//! # Tradegate-Instrument
//! Canonical venue, symbol, instrument and candle-interval data structures shared by every
//! tradegate connector. Normalizers map venue payloads into this space; callers never see a
//! venue-native representation.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Defines a global [`VenueId`](venue::VenueId) enum covering all fronted venues.
pub mod venue;

/// Canonical [`Instrument`](instrument::Instrument) trading-pair metadata and tick-size
/// precision derivation.
pub mod instrument;

/// Canonical candle interval enum and per-venue interval encodings.
pub mod interval;

/// Venue-native symbol newtype.
pub mod symbol;

/// Canonical order side.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    #[serde(alias = "buy", alias = "Buy")]
    Buy,
    #[serde(alias = "sell", alias = "Sell")]
    Sell,
}

/// Canonical order lifecycle status.
///
/// Venue statuses outside this set normalize to [`OrderStatus::Canceled`] by policy.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
}

/// Canonical order type.
///
/// Venue types outside this set normalize to [`OrderType::Market`] by policy.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Canonical derivatives position side.
///
/// `Both` is the one-way (net) posture; `Long`/`Short` are the hedge-mode legs.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
    Both,
}

/// Futures product family a connector instance is constructed for.
#[derive(
    Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FuturesMode {
    /// Spot-only instance; derivatives operations are terminal errors.
    #[default]
    Spot,
    /// USDT/USDC-margined derivatives.
    Usdm,
    /// Coin-margined (inverse) derivatives.
    Coinm,
}

impl FuturesMode {
    pub fn is_futures(&self) -> bool {
        !matches!(self, FuturesMode::Spot)
    }
}
