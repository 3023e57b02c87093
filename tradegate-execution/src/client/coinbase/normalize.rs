use super::requests::{CoinbaseCandle, CoinbaseOrder, CoinbaseProduct, CoinbaseTrade};
use crate::{
    error::VenueError,
    model::{
        market::{Candle, TickerPrice, Trade},
        order::{CanonicalOrder, TIME_UNKNOWN},
    },
};
use rust_decimal::Decimal;
use std::str::FromStr;
use tradegate_instrument::{
    OrderStatus, OrderType, Side,
    instrument::{BaseAssetSpec, Instrument, QuoteAssetSpec, precision_from_tick},
    interval::CandleInterval,
    symbol::Symbol,
};

fn decimal(raw: &str) -> Result<Decimal, VenueError> {
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw)
        .map_err(|error| VenueError::new(format!("error parsing decimal {raw:?}: {error}")))
}

fn rfc3339_millis(raw: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|time| time.timestamp_millis())
        .unwrap_or(TIME_UNKNOWN)
}

pub fn side(raw: &str) -> Result<Side, VenueError> {
    match raw {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(VenueError::new(format!("unknown order side: {other}"))),
    }
}

/// `OPEN`/`PENDING` split on observed progress; everything outside the
/// table is a cancellation.
pub fn status(raw: &str, completion: Decimal) -> OrderStatus {
    match raw {
        "OPEN" | "PENDING" | "QUEUED" => {
            if completion > Decimal::ZERO {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::New
            }
        }
        "FILLED" => OrderStatus::Filled,
        _ => OrderStatus::Canceled,
    }
}

pub fn order(raw: CoinbaseOrder) -> Result<CanonicalOrder, VenueError> {
    let side = side(&raw.side)?;
    let completion = decimal(&raw.completion_percentage)?;
    let status = status(&raw.status, completion);
    let filled = decimal(&raw.filled_size)?;
    let average = decimal(&raw.average_filled_price)?;

    let (kind, orig_qty, limit_price) = match (
        &raw.order_configuration.limit_limit_gtc,
        &raw.order_configuration.market_market_ioc,
    ) {
        (Some(limit), _) => (OrderType::Limit, limit.base_size, Some(limit.limit_price)),
        (None, Some(market)) => (OrderType::Market, market.base_size, None),
        (None, None) => (OrderType::Market, filled, None),
    };

    let price = match kind {
        OrderType::Market => {
            if average.is_zero() {
                limit_price.unwrap_or_default()
            } else {
                average
            }
        }
        OrderType::Limit => limit_price.unwrap_or(average),
    };

    let transact_time = if raw.created_time.is_empty() {
        TIME_UNKNOWN
    } else {
        rfc3339_millis(&raw.created_time)
    };

    Ok(CanonicalOrder {
        symbol: Symbol::new(raw.product_id),
        order_id: raw.order_id,
        client_order_id: raw.client_order_id,
        transact_time,
        update_time: raw
            .last_fill_time
            .as_deref()
            .map(rfc3339_millis)
            .unwrap_or(TIME_UNKNOWN),
        price,
        orig_qty,
        executed_qty: filled,
        cummulative_quote_qty: average * filled,
        status,
        order_type: kind,
        side,
        reduce_only: None,
        position_side: None,
        fills: Vec::new(),
    })
}

/// `CandleGranularity` enum; intervals outside it have no encoding.
pub fn granularity(interval: CandleInterval) -> Result<&'static str, VenueError> {
    match interval {
        CandleInterval::M1 => Ok("ONE_MINUTE"),
        CandleInterval::M5 => Ok("FIVE_MINUTE"),
        CandleInterval::M15 => Ok("FIFTEEN_MINUTE"),
        CandleInterval::M30 => Ok("THIRTY_MINUTE"),
        CandleInterval::H1 => Ok("ONE_HOUR"),
        CandleInterval::H2 => Ok("TWO_HOUR"),
        CandleInterval::D1 => Ok("ONE_DAY"),
        CandleInterval::M3 | CandleInterval::H4 | CandleInterval::H8 | CandleInterval::W1 => Err(
            VenueError::new(format!("interval {interval} is not served by this venue")),
        ),
    }
}

pub fn candle(raw: &CoinbaseCandle, interval: CandleInterval) -> Result<Candle, VenueError> {
    let start_s: i64 = raw
        .start
        .parse()
        .map_err(|_| VenueError::new(format!("error parsing candle start {:?}", raw.start)))?;
    let open_time = start_s * 1000;

    Ok(Candle::new(
        open_time,
        raw.open,
        raw.high,
        raw.low,
        raw.close,
        raw.volume,
        open_time + interval.millis() - 1,
    ))
}

pub fn ticker(raw: &CoinbaseProduct) -> Result<Option<TickerPrice>, VenueError> {
    if raw.price.is_empty() {
        return Ok(None);
    }
    Ok(Some(TickerPrice::new(
        Symbol::new(raw.product_id.clone()),
        decimal(&raw.price)?,
    )))
}

pub fn trade(raw: CoinbaseTrade) -> Trade {
    Trade::new(
        raw.trade_id,
        raw.price,
        raw.size,
        rfc3339_millis(&raw.time),
        raw.side == "SELL",
    )
}

pub fn instrument(raw: CoinbaseProduct) -> Result<Instrument, VenueError> {
    let tick = raw
        .price_increment
        .as_deref()
        .filter(|tick| !tick.is_empty())
        .unwrap_or(&raw.quote_increment);
    let base_max = decimal(&raw.base_max_size)?;

    Ok(Instrument::new(
        Symbol::new(raw.product_id.clone()),
        BaseAssetSpec::new(
            raw.base_currency_id,
            decimal(&raw.base_min_size)?,
            if base_max.is_zero() {
                Decimal::MAX
            } else {
                base_max
            },
            decimal(&raw.base_increment)?,
            base_max,
            None,
        ),
        QuoteAssetSpec::new(raw.quote_currency_id, decimal(&raw.quote_min_size)?),
        500,
        precision_from_tick(tick),
        None,
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_splits_open_on_completion() {
        assert_eq!(status("OPEN", dec!(0)), OrderStatus::New);
        assert_eq!(status("PENDING", dec!(0)), OrderStatus::New);
        assert_eq!(status("OPEN", dec!(33.4)), OrderStatus::PartiallyFilled);
        assert_eq!(status("FILLED", dec!(100)), OrderStatus::Filled);
        assert_eq!(status("CANCELLED", dec!(10)), OrderStatus::Canceled);
        assert_eq!(status("EXPIRED", dec!(0)), OrderStatus::Canceled);
    }

    #[test]
    fn test_granularity_rejects_unserved_intervals() {
        assert_eq!(granularity(CandleInterval::H1).unwrap(), "ONE_HOUR");
        assert!(granularity(CandleInterval::W1).is_err());
        assert!(granularity(CandleInterval::H8).is_err());
    }

    #[test]
    fn test_market_order_uses_average_fill_price() {
        let raw: CoinbaseOrder = serde_json::from_str(
            r#"{
                "order_id": "1",
                "client_order_id": "cid",
                "product_id": "BTC-USD",
                "side": "BUY",
                "status": "FILLED",
                "completion_percentage": "100",
                "filled_size": "0.5",
                "average_filled_price": "42000",
                "created_time": "2023-11-14T12:00:00Z",
                "order_configuration": {
                    "market_market_ioc": {"base_size": "0.5"}
                }
            }"#,
        )
        .unwrap();

        let order = order(raw).unwrap();
        assert_eq!(order.price, dec!(42000));
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.transact_time, 1_699_963_200_000);
        assert!(order.invariants_hold());
    }
}
