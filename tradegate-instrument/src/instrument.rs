use crate::symbol::Symbol;
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Canonical trading pair metadata, normalized from venue exchange-info
/// payloads.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Instrument {
    pub pair: Symbol,
    pub base_asset: BaseAssetSpec,
    pub quote_asset: QuoteAssetSpec,

    /// Maximum number of resting orders the venue admits on this pair.
    pub max_orders: u32,

    /// Digits after the decimal point in the price tick, derived from the
    /// venue's tick-size string via [`precision_from_tick`].
    pub price_asset_precision: u32,

    pub price_multiplier: Option<PriceMultiplier>,
    pub leverage: Option<LeverageSpec>,
}

/// Base asset order-size constraints. `step` is always positive.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct BaseAssetSpec {
    pub name: smol_str::SmolStr,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub step: Decimal,
    pub max_market_amount: Decimal,

    /// Contract multiplier for venues quoting derivatives in contracts.
    pub multiplier: Option<Decimal>,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct QuoteAssetSpec {
    pub name: smol_str::SmolStr,
    pub min_amount: Decimal,
}

/// Admissible limit-price band around the mark, where the venue publishes one.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct PriceMultiplier {
    pub up: Decimal,
    pub down: Decimal,
    pub decimals: u32,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct LeverageSpec {
    pub max: Decimal,
    pub min: Decimal,
    pub step: Decimal,
}

/// Digits after the decimal point in a tick-size string, up to and including
/// its last non-zero digit.
///
/// Computed on the string form. Parsing through a float here would
/// manufacture precision out of representation error.
///
/// ```
/// use tradegate_instrument::instrument::precision_from_tick;
///
/// assert_eq!(precision_from_tick("0.00010"), 4);
/// assert_eq!(precision_from_tick("1"), 0);
/// assert_eq!(precision_from_tick("0.5"), 1);
/// ```
pub fn precision_from_tick(tick: &str) -> u32 {
    let Some((_, fraction)) = tick.split_once('.') else {
        return 0;
    };

    fraction
        .bytes()
        .enumerate()
        .filter(|(_, digit)| *digit != b'0')
        .map(|(index, _)| index as u32 + 1)
        .next_back()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_from_tick() {
        struct TestCase {
            input: &'static str,
            expected: u32,
        }

        let cases = vec![
            TestCase {
                input: "0.00010",
                expected: 4,
            },
            TestCase {
                input: "1",
                expected: 0,
            },
            TestCase {
                input: "0.5",
                expected: 1,
            },
            TestCase {
                input: "0.0001",
                expected: 4,
            },
            TestCase {
                input: "0.000001",
                expected: 6,
            },
            TestCase {
                input: "10",
                expected: 0,
            },
            TestCase {
                input: "1.0",
                expected: 0,
            },
            TestCase {
                input: "0.025",
                expected: 3,
            },
        ];

        for (index, case) in cases.into_iter().enumerate() {
            assert_eq!(
                precision_from_tick(case.input),
                case.expected,
                "TC{index} failed for tick {}",
                case.input
            );
        }
    }
}
