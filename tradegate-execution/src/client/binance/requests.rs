use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as, skip_serializing_none};
use smol_str::SmolStr;
use std::borrow::Cow;
use tradegate_integration::protocol::http::rest::RestRequest;

/// Raw kline row: `[openTime, open, high, low, close, volume, closeTime, ...]`.
/// The five trailing aggregates are not consumed.
pub type RawKline = (
    i64,
    SmolStr,
    SmolStr,
    SmolStr,
    SmolStr,
    SmolStr,
    i64,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
);

/// Order envelope shared by the spot and futures surfaces; fields absent on
/// one surface are optional.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOrder {
    pub symbol: SmolStr,
    pub order_id: u64,

    #[serde(default)]
    pub client_order_id: Option<SmolStr>,

    #[serde(default)]
    pub orig_client_order_id: Option<SmolStr>,

    #[serde(default)]
    pub transact_time: Option<i64>,

    #[serde(default)]
    pub update_time: Option<i64>,

    #[serde(default)]
    pub time: Option<i64>,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub orig_qty: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub executed_qty: Decimal,

    /// Spot surface.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub cummulative_quote_qty: Option<Decimal>,

    /// USDT-margined surface.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub cum_quote: Option<Decimal>,

    /// Coin-margined surface.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub cum_base: Option<Decimal>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub avg_price: Option<Decimal>,

    pub status: SmolStr,

    #[serde(rename = "type")]
    pub kind: SmolStr,

    pub side: SmolStr,

    #[serde(default)]
    pub reduce_only: Option<bool>,

    #[serde(default)]
    pub position_side: Option<SmolStr>,

    #[serde(default)]
    pub fills: Option<Vec<BinanceFill>>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceFill {
    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub qty: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub commission: Decimal,

    pub commission_asset: SmolStr,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceBalance {
    pub asset: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub free: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub locked: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub balances: Vec<BinanceBalance>,

    #[serde(default)]
    pub uid: Option<u64>,
}

/// Futures balance row (`/fapi/v2/balance`, `/dapi/v1/balance`).
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesBalance {
    pub asset: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub balance: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub available_balance: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRestrictions {
    #[serde(default)]
    pub enable_spot_and_margin_trading: bool,

    #[serde(default)]
    pub enable_futures: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfNewUserResponse {
    pub if_new_user: bool,

    #[serde(default)]
    pub rebate_working: bool,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceTickerPrice {
    pub symbol: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceTrade {
    pub id: u64,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub qty: Decimal,

    pub time: i64,
    pub is_buyer_maker: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfoResponse {
    pub symbols: Vec<BinanceSymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceSymbolInfo {
    pub symbol: SmolStr,
    pub base_asset: SmolStr,
    pub quote_asset: SmolStr,
    pub filters: Vec<BinanceFilter>,
}

/// Subset of the venue's filter zoo the normalizer consumes; unknown filter
/// types are skipped wholesale.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum BinanceFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    Price { tick_size: SmolStr },

    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        #[serde_as(as = "DisplayFromStr")]
        min_qty: Decimal,
        #[serde_as(as = "DisplayFromStr")]
        max_qty: Decimal,
        #[serde_as(as = "DisplayFromStr")]
        step_size: Decimal,
    },

    #[serde(rename = "MARKET_LOT_SIZE", rename_all = "camelCase")]
    MarketLotSize {
        #[serde_as(as = "DisplayFromStr")]
        max_qty: Decimal,
    },

    #[serde(rename = "MIN_NOTIONAL", rename_all = "camelCase")]
    MinNotional {
        #[serde_as(as = "Option<DisplayFromStr>")]
        #[serde(default)]
        min_notional: Option<Decimal>,
        #[serde_as(as = "Option<DisplayFromStr>")]
        #[serde(default)]
        notional: Option<Decimal>,
    },

    #[serde(rename = "NOTIONAL", rename_all = "camelCase")]
    Notional {
        #[serde_as(as = "DisplayFromStr")]
        min_notional: Decimal,
    },

    #[serde(rename = "MAX_NUM_ORDERS", rename_all = "camelCase")]
    MaxNumOrders {
        #[serde(default)]
        max_num_orders: Option<u32>,
        #[serde(default)]
        limit: Option<u32>,
    },

    #[serde(rename = "PERCENT_PRICE", rename_all = "camelCase")]
    PercentPrice {
        #[serde_as(as = "DisplayFromStr")]
        multiplier_up: Decimal,
        #[serde_as(as = "DisplayFromStr")]
        multiplier_down: Decimal,
        #[serde(default)]
        multiplier_decimal: Option<SmolStr>,
    },

    #[serde(other)]
    Other,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotTradeFee {
    pub symbol: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub maker_commission: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub taker_commission: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRate {
    pub symbol: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub maker_commission_rate: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub taker_commission_rate: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRisk {
    pub symbol: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub position_amt: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub entry_price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub un_realized_profit: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub leverage: Decimal,

    pub margin_type: SmolStr,
    pub position_side: SmolStr,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub liquidation_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSideDual {
    pub dual_side_position: bool,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageBracketEntry {
    pub bracket: u32,
    pub initial_leverage: u32,

    /// `notionalCap` on usdm, `qtyCap` on coinm.
    #[serde(default, alias = "qtyCap")]
    pub notional_cap: Option<Decimal>,

    #[serde(default, alias = "qtyFloor")]
    pub notional_floor: Option<Decimal>,

    pub maint_margin_ratio: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolBrackets {
    pub symbol: SmolStr,
    pub brackets: Vec<LeverageBracketEntry>,
}

// ----- query parameter types -----

#[derive(Debug, Clone, Serialize)]
pub struct SymbolParams {
    pub symbol: SmolStr,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct OptionalSymbolParams {
    pub symbol: Option<SmolStr>,
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderParams {
    pub symbol: SmolStr,
    pub side: SmolStr,

    #[serde(rename = "type")]
    pub kind: SmolStr,

    pub time_in_force: Option<SmolStr>,

    #[serde_as(as = "DisplayFromStr")]
    pub quantity: Decimal,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub price: Option<Decimal>,

    pub new_client_order_id: SmolStr,
    pub reduce_only: Option<bool>,
    pub position_side: Option<SmolStr>,

    /// `FULL` on spot so the response carries fills.
    pub new_order_resp_type: Option<SmolStr>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLookupParams {
    pub symbol: SmolStr,
    pub orig_client_order_id: Option<SmolStr>,
    pub order_id: Option<SmolStr>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KlinesParams {
    pub symbol: SmolStr,
    pub interval: SmolStr,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub limit: Option<u32>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesParams {
    pub symbol: SmolStr,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageParams {
    pub symbol: SmolStr,
    pub leverage: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginTypeParams {
    pub symbol: SmolStr,
    pub margin_type: SmolStr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DualSideParams {
    pub dual_side_position: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAgentParams {
    pub api_agent_code: SmolStr,
}

// ----- request wrappers -----

/// One signed Binance request: a path chosen per domain at construction plus
/// typed query parameters. Binance carries everything in the query string,
/// even for POST/DELETE.
#[derive(Debug, Clone)]
pub struct BinanceRequest<Params, Response> {
    path: Cow<'static, str>,
    method: reqwest::Method,
    params: Params,
    response: std::marker::PhantomData<Response>,
}

impl<Params, Response> BinanceRequest<Params, Response> {
    pub fn get(path: impl Into<Cow<'static, str>>, params: Params) -> Self {
        Self::new(reqwest::Method::GET, path, params)
    }

    pub fn post(path: impl Into<Cow<'static, str>>, params: Params) -> Self {
        Self::new(reqwest::Method::POST, path, params)
    }

    pub fn delete(path: impl Into<Cow<'static, str>>, params: Params) -> Self {
        Self::new(reqwest::Method::DELETE, path, params)
    }

    fn new(method: reqwest::Method, path: impl Into<Cow<'static, str>>, params: Params) -> Self {
        Self {
            path: path.into(),
            method,
            params,
            response: std::marker::PhantomData,
        }
    }
}

impl<Params, Response> RestRequest for BinanceRequest<Params, Response>
where
    Params: Serialize + Send + Sync,
    Response: serde::de::DeserializeOwned + Send + Sync,
{
    type Response = Response;
    type QueryParams = Params;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        self.path.clone()
    }

    fn method(&self) -> reqwest::Method {
        self.method.clone()
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod de {
        use super::*;
        use rust_decimal_macros::dec;

        #[test]
        fn test_spot_full_order() {
            let raw_response = r#"{
                "symbol": "BTCUSDT",
                "orderId": 28,
                "orderListId": -1,
                "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
                "transactTime": 1507725176595,
                "price": "0.00000000",
                "origQty": "10.00000000",
                "executedQty": "10.00000000",
                "cummulativeQuoteQty": "10.00000000",
                "status": "FILLED",
                "timeInForce": "GTC",
                "type": "MARKET",
                "side": "SELL",
                "fills": [
                    {"price": "4000.00000000", "qty": "1.00000000", "commission": "4.00000000", "commissionAsset": "USDT"}
                ]
            }"#;

            let order = serde_json::from_str::<BinanceOrder>(raw_response).unwrap();
            assert_eq!(order.order_id, 28);
            assert_eq!(order.cummulative_quote_qty, Some(dec!(10)));
            assert_eq!(order.fills.as_ref().unwrap().len(), 1);
            assert_eq!(order.transact_time, Some(1_507_725_176_595));
        }

        #[test]
        fn test_futures_order_envelope() {
            let raw_response = r#"{
                "symbol": "BTCUSDT",
                "orderId": 283194212,
                "clientOrderId": "x-1234",
                "updateTime": 1571110484038,
                "price": "0",
                "avgPrice": "9478.15000",
                "origQty": "1",
                "executedQty": "1",
                "cumQuote": "9478.15",
                "status": "FILLED",
                "type": "MARKET",
                "side": "BUY",
                "reduceOnly": false,
                "positionSide": "LONG"
            }"#;

            let order = serde_json::from_str::<BinanceOrder>(raw_response).unwrap();
            assert_eq!(order.avg_price, Some(dec!(9478.15)));
            assert_eq!(order.position_side.as_deref(), Some("LONG"));
            assert_eq!(order.cummulative_quote_qty, None);
        }

        #[test]
        fn test_exchange_info_filters() {
            let raw_response = r#"{
                "symbols": [{
                    "symbol": "ETHBTC",
                    "baseAsset": "ETH",
                    "quoteAsset": "BTC",
                    "filters": [
                        {"filterType": "PRICE_FILTER", "minPrice": "0.00000100", "maxPrice": "100000.00000000", "tickSize": "0.00000100"},
                        {"filterType": "LOT_SIZE", "minQty": "0.00100000", "maxQty": "100000.00000000", "stepSize": "0.00100000"},
                        {"filterType": "MARKET_LOT_SIZE", "minQty": "0.00000000", "maxQty": "928.43891000", "stepSize": "0.00000000"},
                        {"filterType": "NOTIONAL", "minNotional": "0.00010000", "applyMinToMarket": true},
                        {"filterType": "MAX_NUM_ORDERS", "maxNumOrders": 200},
                        {"filterType": "TRAILING_DELTA", "minTrailingAboveDelta": 10}
                    ]
                }]
            }"#;

            let info = serde_json::from_str::<ExchangeInfoResponse>(raw_response).unwrap();
            let filters = &info.symbols[0].filters;
            assert!(matches!(&filters[0], BinanceFilter::Price { tick_size } if tick_size == "0.00000100"));
            assert!(matches!(filters[5], BinanceFilter::Other));
        }

        #[test]
        fn test_raw_kline_row() {
            let raw_response = r#"[
                [1499040000000, "0.01634790", "0.80000000", "0.01575800", "0.01577100",
                 "148976.11427815", 1499644799999, "2434.19055334", 308, "1756.87402397",
                 "28.46694368", "17928899.62484339"]
            ]"#;

            let klines = serde_json::from_str::<Vec<RawKline>>(raw_response).unwrap();
            assert_eq!(klines[0].0, 1_499_040_000_000);
            assert_eq!(klines[0].6, 1_499_644_799_999);
        }
    }
}
