use super::requests::{
    FuturesContract, FuturesOrder, FuturesPosition, RawFuturesCandle, RawSpotCandle,
    RiskLimitLevel, SpotOrder, SpotSymbol, SpotTradeHistory,
};
use crate::{
    error::VenueError,
    model::{
        market::{Candle, Trade},
        order::{CanonicalOrder, TIME_UNKNOWN},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use smol_str::SmolStr;
use std::str::FromStr;
use tradegate_instrument::{
    OrderStatus, OrderType, PositionSide, Side,
    instrument::{BaseAssetSpec, Instrument, LeverageSpec, QuoteAssetSpec, precision_from_tick},
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

/// Derivatives symbol translation: `BTC` trades as `XBT`, and the quote
/// suffix gains an `M` (`…USDT` → `…USDTM`). Spot symbols pass through.
pub fn encode_futures_symbol(symbol: &Symbol) -> Symbol {
    let name = symbol.name();
    let swapped = if let Some(rest) = name.strip_prefix("BTC") {
        format!("XBT{rest}")
    } else {
        name.to_string()
    };

    let suffixed = if swapped.ends_with("USDTM") || swapped.ends_with("USDCM") {
        swapped
    } else if swapped.ends_with("USDT") || swapped.ends_with("USDC") || swapped.ends_with("USD") {
        format!("{swapped}M")
    } else {
        swapped
    };

    Symbol::new(suffixed)
}

/// Inverse of [`encode_futures_symbol`].
pub fn decode_futures_symbol(symbol: &str) -> Symbol {
    let swapped = if let Some(rest) = symbol.strip_prefix("XBT") {
        format!("BTC{rest}")
    } else {
        symbol.to_string()
    };

    let stripped = if swapped.ends_with("USDTM") || swapped.ends_with("USDCM") || swapped.ends_with("USDM")
    {
        swapped[..swapped.len() - 1].to_string()
    } else {
        swapped
    };

    Symbol::new(stripped)
}

pub fn side(raw: &str) -> Result<Side, VenueError> {
    match raw {
        "buy" => Ok(Side::Buy),
        "sell" => Ok(Side::Sell),
        other => Err(VenueError::new(format!("unknown order side: {other}"))),
    }
}

pub fn order_type(raw: &str) -> OrderType {
    match raw {
        "limit" => OrderType::Limit,
        _ => OrderType::Market,
    }
}

/// KuCoin has no status field; the lifecycle is derived from
/// `(isActive, dealSize, size, cancelExist)`.
pub fn status(
    is_active: bool,
    cancel_exist: bool,
    size: Decimal,
    deal_size: Decimal,
) -> OrderStatus {
    if is_active {
        if deal_size.is_zero() {
            OrderStatus::New
        } else {
            OrderStatus::PartiallyFilled
        }
    } else if !cancel_exist && size == deal_size {
        OrderStatus::Filled
    } else {
        OrderStatus::Canceled
    }
}

pub fn spot_order(raw: SpotOrder) -> Result<CanonicalOrder, VenueError> {
    let side = side(&raw.side)?;
    let kind = order_type(&raw.kind);
    let size = decimal(&raw.size)?;
    let deal_size = decimal(&raw.deal_size)?;
    let deal_funds = decimal(&raw.deal_funds)?;
    let status = status(raw.is_active, raw.cancel_exist, size, deal_size);

    // Market orders report no price; derive from quote volume over base fill
    let nominal = decimal(&raw.price)?;
    let price = if !deal_size.is_zero() && (kind == OrderType::Market || nominal.is_zero()) {
        deal_funds / deal_size
    } else {
        nominal
    };

    Ok(CanonicalOrder {
        symbol: Symbol::new(raw.symbol),
        order_id: raw.id,
        client_order_id: raw.client_oid,
        transact_time: if raw.created_at > 0 {
            raw.created_at
        } else {
            TIME_UNKNOWN
        },
        update_time: TIME_UNKNOWN,
        price,
        orig_qty: size,
        executed_qty: deal_size,
        cummulative_quote_qty: deal_funds,
        status,
        order_type: kind,
        side,
        reduce_only: None,
        position_side: None,
        fills: Vec::new(),
    })
}

pub fn futures_order(raw: FuturesOrder, inverse: bool) -> Result<CanonicalOrder, VenueError> {
    let side = side(&raw.side)?;
    let kind = order_type(&raw.kind);
    let deal_value = decimal(&raw.deal_value)?;
    let status = status(raw.is_active, raw.cancel_exist, raw.size, raw.deal_size);

    // Inverse contracts quote value in base terms: invert the ratio
    let nominal = decimal(&raw.price)?;
    let price = if !raw.deal_size.is_zero() && !deal_value.is_zero() {
        if inverse {
            raw.deal_size / deal_value
        } else {
            deal_value / raw.deal_size
        }
    } else {
        nominal
    };

    Ok(CanonicalOrder {
        symbol: decode_futures_symbol(&raw.symbol),
        order_id: raw.id,
        client_order_id: raw.client_oid,
        transact_time: if raw.order_time > 0 {
            normalize_order_time(raw.order_time)
        } else {
            TIME_UNKNOWN
        },
        update_time: if raw.updated_at > 0 {
            raw.updated_at
        } else {
            TIME_UNKNOWN
        },
        price,
        orig_qty: raw.size,
        executed_qty: raw.deal_size,
        cummulative_quote_qty: deal_value,
        status,
        order_type: kind,
        side,
        reduce_only: Some(raw.reduce_only),
        position_side: Some(PositionSide::Both),
        fills: Vec::new(),
    })
}

/// Futures order timestamps arrive in nanoseconds.
fn normalize_order_time(raw: i64) -> i64 {
    if raw > 10_000_000_000_000_000 {
        raw / 1_000_000
    } else {
        raw
    }
}

/// Spot interval encoding: `1min … 1week`.
pub fn spot_interval(interval: CandleInterval) -> &'static str {
    match interval {
        CandleInterval::M1 => "1min",
        CandleInterval::M3 => "3min",
        CandleInterval::M5 => "5min",
        CandleInterval::M15 => "15min",
        CandleInterval::M30 => "30min",
        CandleInterval::H1 => "1hour",
        CandleInterval::H2 => "2hour",
        CandleInterval::H4 => "4hour",
        CandleInterval::H8 => "8hour",
        CandleInterval::D1 => "1day",
        CandleInterval::W1 => "1week",
    }
}

/// Futures granularity is the interval in whole minutes.
pub fn futures_granularity(interval: CandleInterval) -> u32 {
    interval.minutes()
}

/// Spot rows are `[time_s, open, close, high, low, volume, turnover]` —
/// close comes before high and low.
pub fn spot_candle(raw: &RawSpotCandle, interval: CandleInterval) -> Result<Candle, VenueError> {
    if raw.len() < 6 {
        return Err(VenueError::new(format!(
            "candle row has {} fields, expected at least 6",
            raw.len()
        )));
    }

    let open_time_s: i64 = raw[0]
        .parse()
        .map_err(|_| VenueError::new(format!("error parsing candle time {:?}", raw[0])))?;
    let open_time = open_time_s * 1000;

    Ok(Candle::new(
        open_time,
        decimal(&raw[1])?,
        decimal(&raw[3])?,
        decimal(&raw[4])?,
        decimal(&raw[2])?,
        decimal(&raw[5])?,
        open_time + interval.millis() - 1,
    ))
}

pub fn futures_candle(
    raw: &RawFuturesCandle,
    interval: CandleInterval,
) -> Result<Candle, VenueError> {
    if raw.len() < 6 {
        return Err(VenueError::new(format!(
            "candle row has {} fields, expected at least 6",
            raw.len()
        )));
    }

    let parse = |value: f64, field: &str| {
        Decimal::from_f64_retain(value)
            .ok_or_else(|| VenueError::new(format!("candle {field} {value} is not finite")))
    };

    let open_time = raw[0] as i64;
    Ok(Candle::new(
        open_time,
        parse(raw[1], "open")?,
        parse(raw[2], "high")?,
        parse(raw[3], "low")?,
        parse(raw[4], "close")?,
        parse(raw[5], "volume")?,
        open_time + interval.millis() - 1,
    ))
}

pub fn trade(raw: SpotTradeHistory) -> Trade {
    Trade::new(
        raw.sequence,
        raw.price,
        raw.size,
        // Trade history timestamps are nanoseconds
        raw.time / 1_000_000,
        raw.side == "sell",
    )
}

/// Minimum quote order size that is guaranteed to clear the venue's own
/// filter: at least `quoteMinSize + quoteIncrement`, rounded up to the price
/// precision.
pub fn quote_min_amount(
    quote_min_size: Decimal,
    quote_increment: Decimal,
    price_precision: u32,
) -> Decimal {
    (quote_min_size + quote_increment)
        .round_dp_with_strategy(price_precision, RoundingStrategy::AwayFromZero)
}

pub fn spot_instrument(raw: SpotSymbol) -> Instrument {
    let precision = precision_from_tick(&raw.price_increment);

    Instrument::new(
        Symbol::new(raw.symbol),
        BaseAssetSpec::new(
            raw.base_currency,
            raw.base_min_size,
            raw.base_max_size,
            raw.base_increment,
            raw.base_max_size,
            None,
        ),
        QuoteAssetSpec::new(
            raw.quote_currency,
            quote_min_amount(raw.quote_min_size, raw.quote_increment, precision),
        ),
        200,
        precision,
        None,
        None,
    )
}

pub fn futures_instrument(raw: FuturesContract) -> Instrument {
    Instrument::new(
        decode_futures_symbol(&raw.symbol),
        BaseAssetSpec::new(
            if raw.base_currency == "XBT" {
                SmolStr::new_static("BTC")
            } else {
                raw.base_currency
            },
            raw.lot_size,
            if raw.max_order_qty.is_zero() {
                Decimal::MAX
            } else {
                raw.max_order_qty
            },
            raw.lot_size,
            raw.max_order_qty,
            Some(raw.multiplier),
        ),
        QuoteAssetSpec::new(raw.quote_currency, Decimal::ZERO),
        200,
        precision_from_tick(&raw.tick_size.to_string()),
        None,
        (!raw.max_leverage.is_zero())
            .then(|| LeverageSpec::new(raw.max_leverage, Decimal::ONE, Decimal::ONE)),
    )
}

pub fn position(raw: FuturesPosition) -> PositionInfo {
    PositionInfo::new(
        decode_futures_symbol(&raw.symbol),
        PositionSide::Both,
        raw.current_qty,
        raw.avg_entry_price,
        raw.unrealised_pnl,
        raw.real_leverage,
        if raw.cross_mode {
            MarginType::Crossed
        } else {
            MarginType::Isolated
        },
        (!raw.liquidation_price.is_zero()).then_some(raw.liquidation_price),
    )
}

pub fn bracket(raw: RiskLimitLevel) -> LeverageBracket {
    // Initial margin ratio is the inverse of the admissible leverage
    let initial_leverage = if raw.initial_margin.is_zero() {
        1
    } else {
        (Decimal::ONE / raw.initial_margin).to_u32().unwrap_or(1)
    };

    LeverageBracket::new(
        raw.level,
        initial_leverage,
        raw.max_risk_limit,
        raw.min_risk_limit,
        raw.maintain_margin,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_futures_symbol_translation_is_involutive() {
        for (canonical, native) in [
            ("BTCUSDT", "XBTUSDTM"),
            ("ETHUSDT", "ETHUSDTM"),
            ("BTCUSD", "XBTUSDM"),
            ("SOLUSDC", "SOLUSDCM"),
        ] {
            let encoded = encode_futures_symbol(&Symbol::new(canonical));
            assert_eq!(encoded.name(), native, "encode {canonical}");
            assert_eq!(
                decode_futures_symbol(encoded.name()).name(),
                canonical,
                "decode {native}"
            );
        }
    }

    #[test]
    fn test_status_from_flags() {
        assert_eq!(status(true, false, dec!(1), dec!(0)), OrderStatus::New);
        assert_eq!(
            status(true, false, dec!(1), dec!(0.4)),
            OrderStatus::PartiallyFilled
        );
        assert_eq!(status(false, false, dec!(1), dec!(1)), OrderStatus::Filled);
        assert_eq!(status(false, true, dec!(1), dec!(0.4)), OrderStatus::Canceled);
        // Done without full fill and without cancel record still reads canceled
        assert_eq!(status(false, false, dec!(1), dec!(0.4)), OrderStatus::Canceled);
    }

    #[test]
    fn test_spot_candle_reorders_close_before_high_low() {
        let row: RawSpotCandle = ["1700000000", "100", "105", "110", "90", "12.5", "1300"]
            .into_iter()
            .map(SmolStr::new)
            .collect();

        let candle = spot_candle(&row, CandleInterval::M1).unwrap();
        assert_eq!(candle.open, dec!(100));
        assert_eq!(candle.close, dec!(105));
        assert_eq!(candle.high, dec!(110));
        assert_eq!(candle.low, dec!(90));
        assert_eq!(candle.open_time, 1_700_000_000_000);
    }

    #[test]
    fn test_quote_min_rounds_up_to_price_precision() {
        // 1 + 0.0001 at precision 2 rounds up, never down
        assert_eq!(
            quote_min_amount(dec!(1), dec!(0.0001), 2),
            dec!(1.01)
        );
        assert_eq!(quote_min_amount(dec!(0.1), dec!(0.01), 2), dec!(0.11));
    }

    #[test]
    fn test_inverse_futures_price_inverts_value_ratio() {
        let raw: FuturesOrder = serde_json::from_str(
            r#"{
                "id": "1",
                "symbol": "XBTUSDM",
                "clientOid": "cid",
                "side": "buy",
                "type": "market",
                "price": "0",
                "size": 100,
                "dealValue": "0.0025",
                "dealSize": 100,
                "isActive": false,
                "cancelExist": false,
                "orderTime": 1700000000000,
                "updatedAt": 1700000000100
            }"#,
        )
        .unwrap();

        let order = futures_order(raw, true).unwrap();
        assert_eq!(order.price, dec!(40000));
        assert_eq!(order.symbol.name(), "BTCUSD");
    }
}
