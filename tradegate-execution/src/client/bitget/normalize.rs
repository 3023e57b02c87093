use super::requests::{
    BitgetOrder, FillEntry, MixContract, MixPosition, PositionTier, RawBitgetCandle, SpotSymbol,
    TickerEntry,
};
use crate::{
    error::VenueError,
    model::{
        market::{Candle, TickerPrice, Trade},
        order::{CanonicalOrder, TIME_UNKNOWN},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::str::FromStr;
use tradegate_instrument::{
    FuturesMode, OrderStatus, OrderType, PositionSide, Side,
    instrument::{BaseAssetSpec, Instrument, LeverageSpec, QuoteAssetSpec},
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

fn millis(raw: &str) -> i64 {
    raw.parse().unwrap_or(TIME_UNKNOWN)
}

/// Product family is decided by the quote suffix, with `S`-prefixed demo
/// variants.
pub fn product_type(symbol: &Symbol, demo: bool) -> &'static str {
    let name = symbol.name();
    match (demo, name.ends_with("USDT"), name.ends_with("USDC")) {
        (false, true, _) => "USDT-FUTURES",
        (false, _, true) => "USDC-FUTURES",
        (false, false, false) => "COIN-FUTURES",
        (true, true, _) => "SUSDT-FUTURES",
        (true, _, true) => "SUSDC-FUTURES",
        (true, false, false) => "SCOIN-FUTURES",
    }
}

/// Margin coin backing a mix order, from the same suffix logic.
pub fn margin_coin(symbol: &Symbol, demo: bool) -> &'static str {
    let name = symbol.name();
    match (demo, name.ends_with("USDT"), name.ends_with("USDC")) {
        (false, true, _) => "USDT",
        (false, _, true) => "USDC",
        (false, false, false) => "BTC",
        (true, true, _) => "SUSDT",
        (true, _, true) => "SUSDC",
        (true, false, false) => "SBTC",
    }
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

pub fn status(raw: &str) -> OrderStatus {
    match raw {
        "live" | "new" | "init" => OrderStatus::New,
        "partially_filled" => OrderStatus::PartiallyFilled,
        "filled" => OrderStatus::Filled,
        _ => OrderStatus::Canceled,
    }
}

pub fn position_side(raw: &str) -> PositionSide {
    match raw {
        "long" => PositionSide::Long,
        "short" => PositionSide::Short,
        _ => PositionSide::Both,
    }
}

pub fn order(raw: BitgetOrder) -> Result<CanonicalOrder, VenueError> {
    let side = side(&raw.side)?;
    let kind = order_type(&raw.order_type);
    let mut status = status(&raw.status);

    let executed_qty = decimal(&raw.base_volume)?;
    if status == OrderStatus::New && !executed_qty.is_zero() {
        status = OrderStatus::PartiallyFilled;
    }

    let nominal = decimal(&raw.price)?;
    let avg = decimal(&raw.price_avg)?;
    let price = match kind {
        OrderType::Market if !avg.is_zero() => avg,
        _ if nominal.is_zero() && !avg.is_zero() => avg,
        _ => nominal,
    };

    Ok(CanonicalOrder {
        symbol: Symbol::new(raw.symbol),
        order_id: raw.order_id,
        client_order_id: raw.client_oid,
        transact_time: millis(&raw.c_time),
        update_time: millis(&raw.u_time),
        price,
        orig_qty: decimal(&raw.size)?,
        executed_qty,
        cummulative_quote_qty: decimal(&raw.quote_volume)?,
        status,
        order_type: kind,
        side,
        reduce_only: match raw.reduce_only.as_str() {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        },
        position_side: (!raw.pos_side.is_empty()).then(|| position_side(&raw.pos_side)),
        fills: Vec::new(),
    })
}

/// Spot granularity: `Xmin/Xh/1day/1week`; mix granularity: `Xm/XH/1Dutc/1Wutc`.
pub fn interval(interval: CandleInterval, futures: FuturesMode) -> &'static str {
    if futures.is_futures() {
        match interval {
            CandleInterval::M1 => "1m",
            CandleInterval::M3 => "3m",
            CandleInterval::M5 => "5m",
            CandleInterval::M15 => "15m",
            CandleInterval::M30 => "30m",
            CandleInterval::H1 => "1H",
            CandleInterval::H2 => "2H",
            CandleInterval::H4 => "4H",
            CandleInterval::H8 => "8H",
            CandleInterval::D1 => "1Dutc",
            CandleInterval::W1 => "1Wutc",
        }
    } else {
        match interval {
            CandleInterval::M1 => "1min",
            CandleInterval::M3 => "3min",
            CandleInterval::M5 => "5min",
            CandleInterval::M15 => "15min",
            CandleInterval::M30 => "30min",
            CandleInterval::H1 => "1h",
            CandleInterval::H2 => "2h",
            CandleInterval::H4 => "4h",
            CandleInterval::H8 => "8h",
            CandleInterval::D1 => "1day",
            CandleInterval::W1 => "1week",
        }
    }
}

pub fn candle(raw: &RawBitgetCandle, interval: CandleInterval) -> Result<Candle, VenueError> {
    if raw.len() < 6 {
        return Err(VenueError::new(format!(
            "candle row has {} fields, expected at least 6",
            raw.len()
        )));
    }

    let open_time: i64 = raw[0]
        .parse()
        .map_err(|_| VenueError::new(format!("error parsing candle ts {:?}", raw[0])))?;

    Ok(Candle::new(
        open_time,
        decimal(&raw[1])?,
        decimal(&raw[2])?,
        decimal(&raw[3])?,
        decimal(&raw[4])?,
        decimal(&raw[5])?,
        open_time + interval.millis() - 1,
    ))
}

pub fn ticker(raw: TickerEntry) -> TickerPrice {
    TickerPrice::new(Symbol::new(raw.symbol), raw.last_pr)
}

pub fn trade(raw: FillEntry) -> Trade {
    Trade::new(raw.trade_id, raw.price, raw.size, raw.ts, raw.side == "sell")
}

/// Digits-of-precision to tick-size based spec fields.
fn step_from_digits(digits: &str) -> (Decimal, u32) {
    let digits: u32 = digits.parse().unwrap_or(0);
    (Decimal::new(1, digits), digits)
}

pub fn spot_instrument(raw: SpotSymbol) -> Result<Instrument, VenueError> {
    let (step, _) = step_from_digits(&raw.quantity_precision);
    let (_, price_digits) = step_from_digits(&raw.price_precision);
    let max = decimal(&raw.max_trade_amount)?;

    Ok(Instrument::new(
        Symbol::new(raw.symbol),
        BaseAssetSpec::new(
            raw.base_coin,
            decimal(&raw.min_trade_amount)?,
            if max.is_zero() { Decimal::MAX } else { max },
            step,
            max,
            None,
        ),
        QuoteAssetSpec::new(raw.quote_coin, decimal(&raw.min_trade_usdt)?),
        200,
        price_digits,
        None,
        None,
    ))
}

pub fn mix_instrument(raw: MixContract) -> Result<Instrument, VenueError> {
    let (step, _) = step_from_digits(&raw.volume_place);
    let (_, price_digits) = step_from_digits(&raw.price_place);
    let multiplier = decimal(&raw.size_multiplier)?;
    let max_orders: u32 = raw.max_order_num.parse().unwrap_or(200);
    let max_lever = decimal(&raw.max_lever)?;
    let min_lever = decimal(&raw.min_lever)?;

    Ok(Instrument::new(
        Symbol::new(raw.symbol),
        BaseAssetSpec::new(
            raw.base_coin,
            decimal(&raw.min_trade_num)?,
            Decimal::MAX,
            step,
            Decimal::MAX,
            (!multiplier.is_zero()).then_some(multiplier),
        ),
        QuoteAssetSpec::new(raw.quote_coin, Decimal::ZERO),
        max_orders,
        price_digits,
        None,
        (!max_lever.is_zero()).then(|| {
            LeverageSpec::new(
                max_lever,
                if min_lever.is_zero() {
                    Decimal::ONE
                } else {
                    min_lever
                },
                Decimal::ONE,
            )
        }),
    ))
}

pub fn position(raw: MixPosition) -> Result<PositionInfo, VenueError> {
    let total = decimal(&raw.total)?;
    // Hedge accounts key the legs by holdSide
    let position_side = if raw.pos_mode == "hedge_mode" {
        position_side(&raw.hold_side)
    } else {
        PositionSide::Both
    };
    let signed = if raw.hold_side == "short" { -total } else { total };

    Ok(PositionInfo::new(
        Symbol::new(raw.symbol),
        position_side,
        signed,
        decimal(&raw.open_price_avg)?,
        decimal(&raw.unrealized_pl)?,
        decimal(&raw.leverage)?,
        match raw.margin_mode.as_str() {
            "isolated" => MarginType::Isolated,
            _ => MarginType::Crossed,
        },
        {
            let liq = decimal(&raw.liquidation_price)?;
            (!liq.is_zero()).then_some(liq)
        },
    ))
}

pub fn bracket(raw: PositionTier) -> Result<LeverageBracket, VenueError> {
    Ok(LeverageBracket::new(
        raw.level.parse().unwrap_or(0),
        decimal(&raw.leverage)?.to_u32().unwrap_or(1),
        decimal(&raw.end_unit)?,
        decimal(&raw.start_unit)?,
        decimal(&raw.keep_margin_rate)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_product_type_by_suffix() {
        assert_eq!(product_type(&Symbol::new("BTCUSDT"), false), "USDT-FUTURES");
        assert_eq!(product_type(&Symbol::new("ETHUSDC"), false), "USDC-FUTURES");
        assert_eq!(product_type(&Symbol::new("BTCUSD"), false), "COIN-FUTURES");
        assert_eq!(product_type(&Symbol::new("BTCUSDT"), true), "SUSDT-FUTURES");
        assert_eq!(product_type(&Symbol::new("BTCUSD"), true), "SCOIN-FUTURES");
    }

    #[test]
    fn test_status_table() {
        assert_eq!(status("live"), OrderStatus::New);
        assert_eq!(status("partially_filled"), OrderStatus::PartiallyFilled);
        assert_eq!(status("filled"), OrderStatus::Filled);
        assert_eq!(status("cancelled"), OrderStatus::Canceled);
        assert_eq!(status("canceled"), OrderStatus::Canceled);
    }

    #[test]
    fn test_spot_instrument_precisions_become_steps() {
        let raw: SpotSymbol = serde_json::from_str(
            r#"{
                "symbol": "BTCUSDT",
                "baseCoin": "BTC",
                "quoteCoin": "USDT",
                "minTradeAmount": "0.0001",
                "maxTradeAmount": "10000",
                "pricePrecision": "2",
                "quantityPrecision": "4",
                "minTradeUSDT": "5"
            }"#,
        )
        .unwrap();

        let instrument = spot_instrument(raw).unwrap();
        assert_eq!(instrument.price_asset_precision, 2);
        assert_eq!(instrument.base_asset.step, dec!(0.0001));
        assert_eq!(instrument.quote_asset.min_amount, dec!(5));
    }
}
