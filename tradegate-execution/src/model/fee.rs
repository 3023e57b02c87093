use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use tradegate_instrument::symbol::Symbol;

/// Maker/taker fee rates as fractions (0.001 = 10 bps).
#[serde_as]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct UserFee {
    #[serde_as(as = "DisplayFromStr")]
    pub maker: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub taker: Decimal,
}

/// Fee rates keyed by pair, as returned by `get_all_user_fees`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct PairUserFee {
    pub pair: Symbol,
    pub fee: UserFee,
}
