use super::requests::{
    BybitOrder, FeeRateEntry, InstrumentEntry, PositionEntry, RawBybitKline, RecentTrade,
    RiskLimitEntry, TickerEntry,
};
use crate::{
    error::VenueError,
    model::{
        fee::{PairUserFee, UserFee},
        market::{Candle, TickerPrice, Trade},
        order::{CanonicalOrder, TIME_UNKNOWN},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::str::FromStr;
use tradegate_instrument::{
    OrderStatus, OrderType, PositionSide, Side,
    instrument::{BaseAssetSpec, Instrument, LeverageSpec, QuoteAssetSpec, precision_from_tick},
    interval::CandleInterval,
    symbol::Symbol,
};

/// Decimal parse tolerating the empty strings Bybit uses for absent values.
fn decimal(raw: &str) -> Result<Decimal, VenueError> {
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw)
        .map_err(|error| VenueError::new(format!("error parsing decimal {raw:?}: {error}")))
}

fn millis(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.parse().ok()).unwrap_or(TIME_UNKNOWN)
}

pub fn side(raw: &str) -> Result<Side, VenueError> {
    match raw {
        "Buy" => Ok(Side::Buy),
        "Sell" => Ok(Side::Sell),
        other => Err(VenueError::new(format!("unknown order side: {other}"))),
    }
}

pub fn order_type(raw: &str) -> OrderType {
    match raw {
        "Limit" => OrderType::Limit,
        _ => OrderType::Market,
    }
}

/// V5 order status table.
///
/// `PartiallyFilledCanceled` on a market buy is a complete fill: the venue
/// cancels the unspendable remainder of the quote budget, not the order.
pub fn status(raw: &str, kind: OrderType, side: Side) -> OrderStatus {
    match raw {
        "New" | "Created" | "Untriggered" => OrderStatus::New,
        "PartiallyFilled" => OrderStatus::PartiallyFilled,
        "Filled" => OrderStatus::Filled,
        "PartiallyFilledCanceled" if kind == OrderType::Market && side == Side::Buy => {
            OrderStatus::Filled
        }
        _ => OrderStatus::Canceled,
    }
}

pub fn position_side(position_idx: u8) -> PositionSide {
    match position_idx {
        1 => PositionSide::Long,
        2 => PositionSide::Short,
        _ => PositionSide::Both,
    }
}

/// Expected positionIdx for an order on a hedge-mode account.
pub fn hedge_position_idx(side: Side, reduce_only: bool) -> u8 {
    match (side, reduce_only) {
        (Side::Buy, false) | (Side::Sell, true) => 1,
        (Side::Sell, false) | (Side::Buy, true) => 2,
    }
}

pub fn order(raw: BybitOrder) -> Result<CanonicalOrder, VenueError> {
    let side = side(&raw.side)?;
    let kind = order_type(&raw.order_type);
    let mut status = status(&raw.order_status, kind, side);

    let executed_qty = decimal(&raw.cum_exec_qty)?;
    if status == OrderStatus::New && !executed_qty.is_zero() {
        status = OrderStatus::PartiallyFilled;
    }

    let nominal_price = decimal(&raw.price)?;
    let avg_price = decimal(&raw.avg_price)?;
    let price = match kind {
        OrderType::Market if !avg_price.is_zero() => avg_price,
        _ => nominal_price,
    };

    // On a Filled market buy the venue reports qty in quote terms; trust the
    // executed figures instead.
    let orig_qty = {
        let qty = decimal(&raw.qty)?;
        if status == OrderStatus::Filled && executed_qty > qty {
            executed_qty
        } else {
            qty
        }
    };

    Ok(CanonicalOrder {
        symbol: Symbol::new(raw.symbol),
        order_id: raw.order_id,
        client_order_id: raw.order_link_id,
        transact_time: millis(raw.created_time.as_deref()),
        update_time: millis(raw.updated_time.as_deref()),
        price,
        orig_qty,
        executed_qty,
        cummulative_quote_qty: decimal(&raw.cum_exec_value)?,
        status,
        order_type: kind,
        side,
        reduce_only: raw.reduce_only,
        position_side: raw.position_idx.map(position_side),
        fills: Vec::new(),
    })
}

pub fn instrument(raw: InstrumentEntry) -> Result<Instrument, VenueError> {
    let lot = raw.lot_size_filter;

    Ok(Instrument::new(
        Symbol::new(raw.symbol),
        BaseAssetSpec::new(
            raw.base_coin,
            lot.min_order_qty,
            lot.max_order_qty,
            lot.qty_step,
            lot.max_mkt_order_qty.unwrap_or(lot.max_order_qty),
            None,
        ),
        QuoteAssetSpec::new(raw.quote_coin, lot.min_notional_value.unwrap_or_default()),
        500,
        precision_from_tick(&raw.price_filter.tick_size),
        None,
        raw.leverage_filter.map(|filter| {
            LeverageSpec::new(filter.max_leverage, filter.min_leverage, filter.leverage_step)
        }),
    ))
}

/// `1m,3,5,15,30,60,120,240,480,D,W` per the V5 kline contract.
pub fn interval(interval: CandleInterval) -> &'static str {
    match interval {
        CandleInterval::M1 => "1",
        CandleInterval::M3 => "3",
        CandleInterval::M5 => "5",
        CandleInterval::M15 => "15",
        CandleInterval::M30 => "30",
        CandleInterval::H1 => "60",
        CandleInterval::H2 => "120",
        CandleInterval::H4 => "240",
        CandleInterval::H8 => "480",
        CandleInterval::D1 => "D",
        CandleInterval::W1 => "W",
    }
}

pub fn candle(raw: &RawBybitKline, interval: CandleInterval) -> Result<Candle, VenueError> {
    let open_time: i64 = raw
        .0
        .parse()
        .map_err(|_| VenueError::new(format!("error parsing kline start {:?}", raw.0)))?;

    Ok(Candle::new(
        open_time,
        decimal(&raw.1)?,
        decimal(&raw.2)?,
        decimal(&raw.3)?,
        decimal(&raw.4)?,
        decimal(&raw.5)?,
        open_time + interval.millis() - 1,
    ))
}

pub fn ticker(raw: TickerEntry) -> TickerPrice {
    TickerPrice::new(Symbol::new(raw.symbol), raw.last_price)
}

pub fn trade(raw: RecentTrade) -> Trade {
    // Bybit reports the taker side; the buyer is maker when the taker sold
    let is_buyer_maker = raw.side == "Sell";
    Trade::new(raw.exec_id, raw.price, raw.size, raw.time, is_buyer_maker)
}

pub fn fee(raw: FeeRateEntry) -> PairUserFee {
    PairUserFee::new(
        Symbol::new(raw.symbol),
        UserFee::new(raw.maker_fee_rate, raw.taker_fee_rate),
    )
}

pub fn position(raw: PositionEntry) -> Result<PositionInfo, VenueError> {
    let signed_size = match raw.side.as_str() {
        "Sell" => -raw.size,
        _ => raw.size,
    };

    Ok(PositionInfo::new(
        Symbol::new(raw.symbol),
        position_side(raw.position_idx),
        signed_size,
        decimal(&raw.avg_price)?,
        decimal(&raw.unrealised_pnl)?,
        decimal(&raw.leverage)?,
        if raw.trade_mode == 1 {
            MarginType::Isolated
        } else {
            MarginType::Crossed
        },
        {
            let liq = decimal(&raw.liq_price)?;
            (!liq.is_zero()).then_some(liq)
        },
    ))
}

pub fn bracket(raw: RiskLimitEntry) -> LeverageBracket {
    LeverageBracket::new(
        raw.id,
        raw.max_leverage.to_u32().unwrap_or(1),
        raw.risk_limit_value,
        Decimal::ZERO,
        raw.maintenance_margin,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_table() {
        assert_eq!(status("New", OrderType::Limit, Side::Buy), OrderStatus::New);
        assert_eq!(status("Created", OrderType::Limit, Side::Sell), OrderStatus::New);
        assert_eq!(status("Untriggered", OrderType::Limit, Side::Buy), OrderStatus::New);
        assert_eq!(
            status("PartiallyFilled", OrderType::Limit, Side::Buy),
            OrderStatus::PartiallyFilled
        );
        assert_eq!(status("Filled", OrderType::Market, Side::Sell), OrderStatus::Filled);

        // The market-buy quote-remainder case
        assert_eq!(
            status("PartiallyFilledCanceled", OrderType::Market, Side::Buy),
            OrderStatus::Filled
        );
        assert_eq!(
            status("PartiallyFilledCanceled", OrderType::Limit, Side::Buy),
            OrderStatus::Canceled
        );
        assert_eq!(
            status("PartiallyFilledCanceled", OrderType::Market, Side::Sell),
            OrderStatus::Canceled
        );

        assert_eq!(status("Rejected", OrderType::Limit, Side::Buy), OrderStatus::Canceled);
        assert_eq!(status("Deactivated", OrderType::Limit, Side::Buy), OrderStatus::Canceled);
    }

    #[test]
    fn test_hedge_position_idx_from_side_and_reduce() {
        assert_eq!(hedge_position_idx(Side::Buy, false), 1);
        assert_eq!(hedge_position_idx(Side::Sell, true), 1);
        assert_eq!(hedge_position_idx(Side::Sell, false), 2);
        assert_eq!(hedge_position_idx(Side::Buy, true), 2);
    }

    #[test]
    fn test_market_order_prefers_avg_price() {
        let raw: BybitOrder = serde_json::from_str(
            r#"{
                "symbol": "BTCUSDT",
                "orderId": "abc",
                "orderLinkId": "cid",
                "createdTime": "1700000000000",
                "price": "0",
                "qty": "1",
                "cumExecQty": "1",
                "cumExecValue": "42000",
                "avgPrice": "42000",
                "orderStatus": "Filled",
                "orderType": "Market",
                "side": "Buy"
            }"#,
        )
        .unwrap();

        let order = order(raw).unwrap();
        assert_eq!(order.price, dec!(42000));
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.invariants_hold());
    }

    #[test]
    fn test_interval_encoding() {
        assert_eq!(interval(CandleInterval::M1), "1");
        assert_eq!(interval(CandleInterval::H1), "60");
        assert_eq!(interval(CandleInterval::D1), "D");
        assert_eq!(interval(CandleInterval::W1), "W");
    }
}
