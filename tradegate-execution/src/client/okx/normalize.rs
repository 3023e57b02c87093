use super::requests::{
    InstrumentEntry, OkxOrder, PositionEntry, PositionTier, PublicTrade, RawOkxCandle, TickerEntry,
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
    instrument::{BaseAssetSpec, Instrument, LeverageSpec, QuoteAssetSpec, precision_from_tick},
    interval::CandleInterval,
    symbol::Symbol,
};

const SWAP_SUFFIX: &str = "-SWAP";

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

/// Append `-SWAP` for derivatives instances; spot passes through.
pub fn encode_symbol(symbol: &Symbol, futures: FuturesMode) -> Symbol {
    if futures.is_futures() && !symbol.name().ends_with(SWAP_SUFFIX) {
        Symbol::new(format!("{}{SWAP_SUFFIX}", symbol.name()))
    } else {
        symbol.clone()
    }
}

/// Strip `-SWAP` on the way back.
pub fn decode_symbol(symbol: &str) -> Symbol {
    Symbol::new(symbol.strip_suffix(SWAP_SUFFIX).unwrap_or(symbol))
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
        "limit" | "post_only" => OrderType::Limit,
        _ => OrderType::Market,
    }
}

pub fn status(raw: &str) -> OrderStatus {
    match raw {
        "live" => OrderStatus::New,
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

pub fn order(raw: OkxOrder) -> Result<CanonicalOrder, VenueError> {
    let kind = order_type(&raw.ord_type);
    let mut status = status(&raw.state);

    let executed_qty = decimal(&raw.acc_fill_sz)?;
    if status == OrderStatus::New && !executed_qty.is_zero() {
        status = OrderStatus::PartiallyFilled;
    }

    let nominal = decimal(&raw.px)?;
    let avg = decimal(&raw.avg_px)?;
    let price = match kind {
        OrderType::Market if !avg.is_zero() => avg,
        _ if nominal.is_zero() && !avg.is_zero() => avg,
        _ => nominal,
    };

    Ok(CanonicalOrder {
        symbol: decode_symbol(&raw.inst_id),
        order_id: raw.ord_id,
        client_order_id: raw.cl_ord_id,
        transact_time: millis(&raw.c_time),
        update_time: millis(&raw.u_time),
        price,
        orig_qty: decimal(&raw.sz)?,
        executed_qty,
        cummulative_quote_qty: avg * executed_qty,
        status,
        order_type: kind,
        side: side(&raw.side)?,
        reduce_only: match raw.reduce_only.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        position_side: (!raw.pos_side.is_empty()).then(|| position_side(&raw.pos_side)),
        fills: Vec::new(),
    })
}

/// `1m,3m,5m,15m,30m,1H,2H,4H,1Dutc,1Wutc`; 8h has no venue encoding.
pub fn interval(interval: CandleInterval) -> Result<&'static str, VenueError> {
    match interval {
        CandleInterval::M1 => Ok("1m"),
        CandleInterval::M3 => Ok("3m"),
        CandleInterval::M5 => Ok("5m"),
        CandleInterval::M15 => Ok("15m"),
        CandleInterval::M30 => Ok("30m"),
        CandleInterval::H1 => Ok("1H"),
        CandleInterval::H2 => Ok("2H"),
        CandleInterval::H4 => Ok("4H"),
        CandleInterval::H8 => Err(VenueError::new("interval 8h is not served by this venue")),
        CandleInterval::D1 => Ok("1Dutc"),
        CandleInterval::W1 => Ok("1Wutc"),
    }
}

pub fn candle(raw: &RawOkxCandle, interval: CandleInterval) -> Result<Candle, VenueError> {
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
    TickerPrice::new(decode_symbol(&raw.inst_id), raw.last)
}

pub fn trade(raw: PublicTrade) -> Trade {
    Trade::new(raw.trade_id, raw.px, raw.sz, raw.ts, raw.side == "sell")
}

pub fn instrument(raw: InstrumentEntry) -> Result<Instrument, VenueError> {
    let lot = decimal(&raw.lot_sz)?;
    let min = decimal(&raw.min_sz)?;
    let max_lmt = decimal(&raw.max_lmt_sz)?;
    let max_mkt = decimal(&raw.max_mkt_sz)?;
    let contract_value = decimal(&raw.ct_val)?;
    let lever = decimal(&raw.lever)?;

    // Swap instruments carry base/quote inside the instId
    let (base, quote) = if raw.base_ccy.is_empty() {
        let mut parts = raw.inst_id.split('-');
        (
            smol_str::SmolStr::new(parts.next().unwrap_or_default()),
            smol_str::SmolStr::new(parts.next().unwrap_or_default()),
        )
    } else {
        (raw.base_ccy.clone(), raw.quote_ccy.clone())
    };

    Ok(Instrument::new(
        decode_symbol(&raw.inst_id),
        BaseAssetSpec::new(
            base,
            min,
            if max_lmt.is_zero() { Decimal::MAX } else { max_lmt },
            if lot.is_zero() { Decimal::ONE } else { lot },
            if max_mkt.is_zero() { max_lmt } else { max_mkt },
            (!contract_value.is_zero()).then_some(contract_value),
        ),
        QuoteAssetSpec::new(quote, Decimal::ZERO),
        500,
        precision_from_tick(&raw.tick_sz),
        None,
        (!lever.is_zero()).then(|| LeverageSpec::new(lever, Decimal::ONE, Decimal::ONE)),
    ))
}

pub fn position(raw: PositionEntry) -> Result<PositionInfo, VenueError> {
    Ok(PositionInfo::new(
        decode_symbol(&raw.inst_id),
        position_side(&raw.pos_side),
        decimal(&raw.pos)?,
        decimal(&raw.avg_px)?,
        decimal(&raw.upl)?,
        decimal(&raw.lever)?,
        match raw.mgn_mode.as_str() {
            "isolated" => MarginType::Isolated,
            _ => MarginType::Crossed,
        },
        {
            let liq = decimal(&raw.liq_px)?;
            (!liq.is_zero()).then_some(liq)
        },
    ))
}

pub fn bracket(raw: PositionTier) -> Result<LeverageBracket, VenueError> {
    Ok(LeverageBracket::new(
        raw.tier.parse().unwrap_or(0),
        decimal(&raw.max_lever)?.to_u32().unwrap_or(1),
        decimal(&raw.max_sz)?,
        decimal(&raw.min_sz)?,
        decimal(&raw.mmr)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_translation_is_involutive() {
        let spot = Symbol::new("BTC-USDT");
        assert_eq!(encode_symbol(&spot, FuturesMode::Spot), spot);
        assert_eq!(decode_symbol(spot.name()), spot);

        let encoded = encode_symbol(&spot, FuturesMode::Usdm);
        assert_eq!(encoded.name(), "BTC-USDT-SWAP");
        assert_eq!(decode_symbol(encoded.name()), spot);

        // Encoding an already-encoded symbol is a no-op
        assert_eq!(encode_symbol(&encoded, FuturesMode::Usdm), encoded);
    }

    #[test]
    fn test_status_table() {
        assert_eq!(status("live"), OrderStatus::New);
        assert_eq!(status("partially_filled"), OrderStatus::PartiallyFilled);
        assert_eq!(status("filled"), OrderStatus::Filled);
        assert_eq!(status("canceled"), OrderStatus::Canceled);
        assert_eq!(status("mmp_canceled"), OrderStatus::Canceled);
    }

    #[test]
    fn test_interval_rejects_8h() {
        assert!(interval(CandleInterval::H8).is_err());
        assert_eq!(interval(CandleInterval::D1).unwrap(), "1Dutc");
    }

    #[test]
    fn test_candle_close_time_derived_from_interval() {
        let row: RawOkxCandle = ["1700000000000", "100", "110", "90", "105", "12.5"]
            .into_iter()
            .map(smol_str::SmolStr::new)
            .collect();

        let candle = candle(&row, CandleInterval::M5).unwrap();
        assert_eq!(candle.open_time, 1_700_000_000_000);
        assert_eq!(candle.close_time, 1_700_000_299_999);
        assert_eq!(candle.close, dec!(105));
    }
}
