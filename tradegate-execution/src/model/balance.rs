use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use smol_str::SmolStr;

/// Spendable + locked balance of one asset.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct FreeAsset {
    pub asset: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub free: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub locked: Decimal,
}

impl FreeAsset {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}
