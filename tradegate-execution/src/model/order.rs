use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as, skip_serializing_none};
use smol_str::SmolStr;
use tradegate_instrument::{OrderStatus, OrderType, PositionSide, Side, symbol::Symbol};

/// Unix-ms sentinel for venue payloads that omit a timestamp.
pub const TIME_UNKNOWN: i64 = -1;

/// Normalized order, identical in shape regardless of the backing venue.
///
/// Invariants upheld by every normalizer:
/// - `executed_qty <= orig_qty`
/// - `status == Filled` implies `executed_qty == orig_qty`
/// - `status == New` implies `executed_qty == 0`
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct CanonicalOrder {
    pub symbol: Symbol,
    pub order_id: SmolStr,
    pub client_order_id: SmolStr,

    /// Unix-ms creation time, [`TIME_UNKNOWN`] when the venue omits it.
    pub transact_time: i64,

    /// Unix-ms last update time, [`TIME_UNKNOWN`] when the venue omits it.
    pub update_time: i64,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub orig_qty: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub executed_qty: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub cummulative_quote_qty: Decimal,

    pub status: OrderStatus,

    #[serde(rename = "type")]
    pub order_type: OrderType,

    pub side: Side,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_side: Option<PositionSide>,

    /// Ordered fills reported with the order, possibly empty.
    #[serde(default)]
    pub fills: Vec<Fill>,
}

impl CanonicalOrder {
    /// Check the canonical order invariants. Used by normalizer tests.
    pub fn invariants_hold(&self) -> bool {
        if self.executed_qty > self.orig_qty {
            return false;
        }
        match self.status {
            OrderStatus::Filled => self.executed_qty == self.orig_qty,
            OrderStatus::New => self.executed_qty.is_zero(),
            _ => true,
        }
    }
}

/// One execution against an order.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Fill {
    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub qty: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub commission: Decimal,

    pub commission_asset: SmolStr,
}

/// Caller input to `open_order`.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct OpenOrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,

    #[serde_as(as = "DisplayFromStr")]
    pub quantity: Decimal,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub price: Option<Decimal>,

    pub client_order_id: Option<SmolStr>,
    pub reduce_only: Option<bool>,
    pub position_side: Option<PositionSide>,
}

impl OpenOrderRequest {
    /// Random client order id when the caller did not supply one.
    pub fn client_order_id_or_random(&self) -> SmolStr {
        match &self.client_order_id {
            Some(cid) => cid.clone(),
            None => random_client_order_id(),
        }
    }
}

/// Lookup / cancel key: venue symbol + caller-assigned client order id.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct OrderQuery {
    pub symbol: Symbol,
    pub client_order_id: SmolStr,
}

/// Lookup / cancel key: venue symbol + venue-assigned order id.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct OrderIdQuery {
    pub symbol: Symbol,
    pub order_id: SmolStr,
}

/// `get_all_open_orders` payload: full orders, or just the count.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum OpenOrders {
    Orders(Vec<CanonicalOrder>),
    Count(u32),
}

/// Stack-allocated random client order id (23 url-safe bytes).
pub fn random_client_order_id() -> SmolStr {
    use rand::prelude::IndexedRandom;

    const URL_SAFE_SYMBOLS: [char; 64] = [
        '_', '-', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
        'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x',
        'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
        'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    ];
    // SmolStr can hold up to 23 bytes without allocating
    const LEN_NON_ALLOCATING_CID: usize = 23;

    let mut thread_rng = rand::rng();
    let random_utf8: [u8; LEN_NON_ALLOCATING_CID] = std::array::from_fn(|_| {
        let symbol = URL_SAFE_SYMBOLS
            .choose(&mut thread_rng)
            .expect("URL_SAFE_SYMBOLS slice is not empty");
        *symbol as u8
    });

    let random_utf8_str =
        std::str::from_utf8(&random_utf8).expect("URL_SAFE_SYMBOLS are valid utf8");

    SmolStr::new_inline(random_utf8_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(status: OrderStatus, orig: Decimal, executed: Decimal) -> CanonicalOrder {
        CanonicalOrder {
            symbol: Symbol::new("BTCUSDT"),
            order_id: SmolStr::new("1"),
            client_order_id: SmolStr::new("cid-1"),
            transact_time: 1_700_000_000_000,
            update_time: TIME_UNKNOWN,
            price: dec!(42000),
            orig_qty: orig,
            executed_qty: executed,
            cummulative_quote_qty: dec!(0),
            status,
            order_type: OrderType::Limit,
            side: Side::Buy,
            reduce_only: None,
            position_side: None,
            fills: vec![],
        }
    }

    #[test]
    fn test_invariants() {
        assert!(order(OrderStatus::New, dec!(1), dec!(0)).invariants_hold());
        assert!(!order(OrderStatus::New, dec!(1), dec!(0.5)).invariants_hold());
        assert!(order(OrderStatus::Filled, dec!(1), dec!(1)).invariants_hold());
        assert!(!order(OrderStatus::Filled, dec!(1), dec!(0.5)).invariants_hold());
        assert!(!order(OrderStatus::PartiallyFilled, dec!(1), dec!(2)).invariants_hold());
    }

    #[test]
    fn test_random_client_order_id_shape() {
        let cid = random_client_order_id();
        assert_eq!(cid.len(), 23);
        assert_ne!(cid, random_client_order_id());
    }
}
