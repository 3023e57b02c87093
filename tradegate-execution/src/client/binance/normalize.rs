use super::requests::{
    BinanceFilter, BinanceOrder, BinanceSymbolInfo, BinanceTickerPrice, BinanceTrade, PositionRisk,
    RawKline, SymbolBrackets,
};
use crate::{
    error::VenueError,
    model::{
        market::{Candle, TickerPrice, Trade},
        order::{CanonicalOrder, Fill, TIME_UNKNOWN},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
};
use rust_decimal::Decimal;
use smol_str::{SmolStr, format_smolstr};
use std::str::FromStr;
use tradegate_instrument::{
    OrderStatus, OrderType, PositionSide, Side,
    instrument::{
        BaseAssetSpec, Instrument, LeverageSpec, PriceMultiplier, QuoteAssetSpec,
        precision_from_tick,
    },
    interval::CandleInterval,
    symbol::Symbol,
};

/// 200 days, the venue's hard candle-range cap on the coin-margined surface.
pub const COINM_MAX_CANDLE_SPAN_MS: i64 = 200 * 86_400_000;

pub fn status(raw: &str) -> OrderStatus {
    match raw {
        "NEW" => OrderStatus::New,
        "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
        "FILLED" => OrderStatus::Filled,
        "CANCELED" => OrderStatus::Canceled,
        // EXPIRED, REJECTED, PENDING_CANCEL and anything the venue adds later
        _ => OrderStatus::Canceled,
    }
}

pub fn order_type(raw: &str) -> OrderType {
    match raw {
        "LIMIT" => OrderType::Limit,
        _ => OrderType::Market,
    }
}

pub fn side(raw: &str) -> Result<Side, VenueError> {
    match raw {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(VenueError::new(format!("unknown order side: {other}"))),
    }
}

pub fn position_side(raw: &str) -> PositionSide {
    match raw {
        "LONG" => PositionSide::Long,
        "SHORT" => PositionSide::Short,
        _ => PositionSide::Both,
    }
}

/// Binance order envelope (any surface) → canonical order.
pub fn order(raw: BinanceOrder) -> Result<CanonicalOrder, VenueError> {
    let kind = order_type(&raw.kind);
    let mut status = status(&raw.status);

    // A lagging venue status never wins over observed executions
    if status == OrderStatus::New && !raw.executed_qty.is_zero() {
        status = OrderStatus::PartiallyFilled;
    }

    let cummulative_quote_qty = raw
        .cummulative_quote_qty
        .or(raw.cum_quote)
        .or(raw.cum_base)
        .unwrap_or_default();

    // Market orders carry their real price in the average-fill field; the
    // nominal price is zero there.
    let price = match kind {
        OrderType::Market => raw
            .avg_price
            .filter(|price| !price.is_zero())
            .or_else(|| {
                (!raw.executed_qty.is_zero())
                    .then(|| cummulative_quote_qty / raw.executed_qty)
            })
            .unwrap_or(raw.price),
        OrderType::Limit => raw.price,
    };

    Ok(CanonicalOrder {
        symbol: Symbol::new(raw.symbol),
        order_id: format_smolstr!("{}", raw.order_id),
        client_order_id: raw
            .client_order_id
            .or(raw.orig_client_order_id)
            .unwrap_or_default(),
        transact_time: raw
            .transact_time
            .or(raw.time)
            .or(raw.update_time)
            .unwrap_or(TIME_UNKNOWN),
        update_time: raw.update_time.unwrap_or(TIME_UNKNOWN),
        price,
        orig_qty: raw.orig_qty,
        executed_qty: raw.executed_qty,
        cummulative_quote_qty,
        status,
        order_type: kind,
        side: side(&raw.side)?,
        reduce_only: raw.reduce_only,
        position_side: raw.position_side.as_deref().map(position_side),
        fills: raw
            .fills
            .unwrap_or_default()
            .into_iter()
            .map(|fill| Fill::new(fill.price, fill.qty, fill.commission, fill.commission_asset))
            .collect(),
    })
}

/// Exchange-info symbol entry → canonical instrument.
pub fn instrument(raw: BinanceSymbolInfo) -> Result<Instrument, VenueError> {
    let mut tick_size: Option<SmolStr> = None;
    let mut min_qty = Decimal::ZERO;
    let mut max_qty = Decimal::MAX;
    let mut step = Decimal::ONE;
    let mut max_market_qty: Option<Decimal> = None;
    let mut min_notional = Decimal::ZERO;
    let mut max_orders = 200u32;
    let mut price_multiplier = None;

    for filter in raw.filters {
        match filter {
            BinanceFilter::Price { tick_size: tick } => tick_size = Some(tick),
            BinanceFilter::LotSize {
                min_qty: min,
                max_qty: max,
                step_size,
            } => {
                min_qty = min;
                max_qty = max;
                step = step_size;
            }
            BinanceFilter::MarketLotSize { max_qty } => max_market_qty = Some(max_qty),
            BinanceFilter::MinNotional {
                min_notional: min,
                notional,
            } => min_notional = min.or(notional).unwrap_or_default(),
            BinanceFilter::Notional { min_notional: min } => min_notional = min,
            BinanceFilter::MaxNumOrders {
                max_num_orders,
                limit,
            } => max_orders = max_num_orders.or(limit).unwrap_or(max_orders),
            BinanceFilter::PercentPrice {
                multiplier_up,
                multiplier_down,
                multiplier_decimal,
            } => {
                let decimals = multiplier_decimal
                    .as_deref()
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(0);
                price_multiplier = Some(PriceMultiplier::new(
                    multiplier_up,
                    multiplier_down,
                    decimals,
                ));
            }
            BinanceFilter::Other => {}
        }
    }

    let tick_size = tick_size
        .ok_or_else(|| VenueError::new(format!("{}: no PRICE_FILTER in filters", raw.symbol)))?;

    Ok(Instrument::new(
        Symbol::new(raw.symbol),
        BaseAssetSpec::new(
            raw.base_asset,
            min_qty,
            max_qty,
            step,
            max_market_qty.unwrap_or(max_qty),
            None,
        ),
        QuoteAssetSpec::new(raw.quote_asset, min_notional),
        max_orders,
        precision_from_tick(&tick_size),
        price_multiplier,
        None,
    ))
}

/// Attach the leverage bounds reported by the brackets endpoint.
pub fn leverage_spec(brackets: &[LeverageBracket]) -> Option<LeverageSpec> {
    let max = brackets.iter().map(|bracket| bracket.initial_leverage).max()?;
    Some(LeverageSpec::new(
        Decimal::from(max),
        Decimal::ONE,
        Decimal::ONE,
    ))
}

/// The venue serves the canonical interval spellings natively.
pub fn interval(interval: CandleInterval) -> &'static str {
    interval.as_str()
}

pub fn candle(raw: RawKline) -> Result<Candle, VenueError> {
    let parse = |field: &SmolStr| {
        Decimal::from_str(field)
            .map_err(|error| VenueError::new(format!("error parsing kline decimal: {error}")))
    };

    Ok(Candle::new(
        raw.0,
        parse(&raw.1)?,
        parse(&raw.2)?,
        parse(&raw.3)?,
        parse(&raw.4)?,
        parse(&raw.5)?,
        raw.6,
    ))
}

pub fn ticker(raw: BinanceTickerPrice) -> TickerPrice {
    TickerPrice::new(Symbol::new(raw.symbol), raw.price)
}

pub fn trade(raw: BinanceTrade) -> Trade {
    Trade::new(
        format_smolstr!("{}", raw.id),
        raw.price,
        raw.qty,
        raw.time,
        raw.is_buyer_maker,
    )
}

pub fn position(raw: PositionRisk) -> PositionInfo {
    PositionInfo::new(
        Symbol::new(raw.symbol),
        position_side(&raw.position_side),
        raw.position_amt,
        raw.entry_price,
        raw.un_realized_profit,
        raw.leverage,
        match raw.margin_type.as_str() {
            "isolated" | "ISOLATED" => MarginType::Isolated,
            _ => MarginType::Crossed,
        },
        raw.liquidation_price,
    )
}

pub fn brackets(raw: SymbolBrackets) -> Vec<LeverageBracket> {
    raw.brackets
        .into_iter()
        .map(|entry| {
            LeverageBracket::new(
                entry.bracket,
                entry.initial_leverage,
                entry.notional_cap.unwrap_or(Decimal::MAX),
                entry.notional_floor.unwrap_or_default(),
                entry.maint_margin_ratio,
            )
        })
        .collect()
}

/// Split `[from, to]` into spans no wider than `max_span_ms`, inclusive ends
/// abutting the next start. Used on the coin-margined surface, which caps
/// candle queries at 200 days.
pub fn chunk_ranges(from: i64, to: i64, max_span_ms: i64) -> Vec<(i64, i64)> {
    let mut chunks = Vec::new();
    let mut cursor = from;
    while cursor < to {
        let end = (cursor + max_span_ms).min(to);
        chunks.push((cursor, end));
        cursor = end;
    }
    if chunks.is_empty() {
        chunks.push((from, to));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_table() {
        assert_eq!(status("NEW"), OrderStatus::New);
        assert_eq!(status("PARTIALLY_FILLED"), OrderStatus::PartiallyFilled);
        assert_eq!(status("FILLED"), OrderStatus::Filled);
        assert_eq!(status("CANCELED"), OrderStatus::Canceled);
        assert_eq!(status("EXPIRED"), OrderStatus::Canceled);
        assert_eq!(status("REJECTED"), OrderStatus::Canceled);
        assert_eq!(status("PENDING_CANCEL"), OrderStatus::Canceled);
    }

    fn market_order_raw() -> BinanceOrder {
        serde_json::from_str(
            r#"{
                "symbol": "BTCUSDT",
                "orderId": 42,
                "clientOrderId": "cid-42",
                "transactTime": 1700000000000,
                "price": "0",
                "origQty": "2",
                "executedQty": "2",
                "cummulativeQuoteQty": "84000",
                "status": "FILLED",
                "type": "MARKET",
                "side": "BUY"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_market_price_derived_from_quote_volume() {
        let order = order(market_order_raw()).unwrap();
        assert_eq!(order.price, dec!(42000));
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.invariants_hold());
    }

    #[test]
    fn test_avg_price_preferred_over_derivation() {
        let mut raw = market_order_raw();
        raw.avg_price = Some(dec!(41999.5));
        let order = order(raw).unwrap();
        assert_eq!(order.price, dec!(41999.5));
    }

    #[test]
    fn test_stale_new_status_with_executions_normalizes_to_partial() {
        let mut raw = market_order_raw();
        raw.status = "NEW".into();
        raw.executed_qty = dec!(1);
        let order = order(raw).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert!(order.invariants_hold());
    }

    #[test]
    fn test_chunk_ranges_covers_without_overlap() {
        let day = 86_400_000i64;
        let chunks = chunk_ranges(0, 450 * day, 200 * day);
        assert_eq!(chunks, vec![
            (0, 200 * day),
            (200 * day, 400 * day),
            (400 * day, 450 * day),
        ]);

        // Narrow range stays one chunk
        assert_eq!(chunk_ranges(0, day, 200 * day), vec![(0, day)]);
    }
}
