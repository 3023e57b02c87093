use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use tradegate_instrument::{PositionSide, symbol::Symbol};

/// Whether a position's margin is walled off to that position or shared
/// across the account.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarginType {
    Isolated,
    Crossed,
}

/// One open derivatives position.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct PositionInfo {
    pub symbol: Symbol,
    pub position_side: PositionSide,

    /// Signed position size: negative for shorts in one-way mode.
    #[serde_as(as = "DisplayFromStr")]
    pub position_amt: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub entry_price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub unrealized_pnl: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub leverage: Decimal,

    pub margin_type: MarginType,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidation_price: Option<Decimal>,
}

/// One leverage bracket step of a derivatives pair.
#[serde_as]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct LeverageBracket {
    pub bracket: u32,
    pub initial_leverage: u32,

    #[serde_as(as = "DisplayFromStr")]
    pub notional_cap: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub notional_floor: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub maint_margin_ratio: Decimal,
}
