use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use smol_str::SmolStr;
use tradegate_instrument::symbol::Symbol;

/// Latest traded price of one pair.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct TickerPrice {
    pub symbol: Symbol,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,
}

/// One OHLCV candle. Times are unix-ms, open inclusive.
#[serde_as]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Candle {
    pub open_time: i64,

    #[serde_as(as = "DisplayFromStr")]
    pub open: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub high: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub low: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub close: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub volume: Decimal,

    pub close_time: i64,
}

/// One public trade print.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Trade {
    pub id: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub qty: Decimal,

    /// Unix-ms execution time.
    pub time: i64,

    pub is_buyer_maker: bool,
}

/// Bounds of one `get_candles` query.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct CandleRange {
    /// Unix-ms inclusive start.
    pub from: Option<i64>,

    /// Unix-ms inclusive end.
    pub to: Option<i64>,

    /// Maximum number of candles.
    pub count: Option<u32>,
}
