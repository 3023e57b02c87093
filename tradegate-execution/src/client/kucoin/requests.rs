use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as, skip_serializing_none};
use smol_str::SmolStr;
use std::borrow::Cow;
use tradegate_integration::protocol::http::rest::RestRequest;

/// Response envelope: `code` is `"200000"` on success.
#[derive(Debug, Clone, Deserialize)]
pub struct KucoinHttpResponse<Data> {
    pub code: SmolStr,

    #[serde(default)]
    pub msg: Option<String>,

    pub data: Option<Data>,
}

/// Paginated listing wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<Item> {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotOrder {
    pub id: SmolStr,
    pub symbol: SmolStr,

    #[serde(default)]
    pub client_oid: SmolStr,

    pub side: SmolStr,

    #[serde(rename = "type")]
    pub kind: SmolStr,

    #[serde(default)]
    pub price: SmolStr,

    #[serde(default)]
    pub size: SmolStr,

    #[serde(default)]
    pub deal_funds: SmolStr,

    #[serde(default)]
    pub deal_size: SmolStr,

    pub is_active: bool,

    #[serde(default)]
    pub cancel_exist: bool,

    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesOrder {
    pub id: SmolStr,
    pub symbol: SmolStr,

    #[serde(default)]
    pub client_oid: SmolStr,

    pub side: SmolStr,

    #[serde(rename = "type")]
    pub kind: SmolStr,

    #[serde(default)]
    pub price: SmolStr,

    #[serde(default)]
    pub size: Decimal,

    #[serde(default)]
    pub deal_value: SmolStr,

    #[serde(default)]
    pub deal_size: Decimal,

    pub is_active: bool,

    #[serde(default)]
    pub cancel_exist: bool,

    #[serde(default)]
    pub reduce_only: bool,

    #[serde(default)]
    pub order_time: i64,

    #[serde(default)]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: SmolStr,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotAccount {
    pub currency: SmolStr,

    #[serde(rename = "type")]
    pub kind: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub available: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub holds: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesAccountOverview {
    pub currency: SmolStr,

    pub available_balance: Decimal,

    #[serde(default)]
    pub order_margin: Decimal,

    #[serde(default)]
    pub position_margin: Decimal,

    #[serde(default)]
    pub frozen_funds: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub uid: serde_json::Value,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFee {
    pub symbol: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub maker_fee_rate: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub taker_fee_rate: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseFee {
    #[serde_as(as = "DisplayFromStr")]
    pub maker_fee_rate: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub taker_fee_rate: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level1Ticker {
    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllTickersEnvelope {
    pub ticker: Vec<TickerEntry>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerEntry {
    pub symbol: SmolStr,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub last: Option<Decimal>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesTicker {
    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,
}

/// Spot candle row: `[time_s, open, close, high, low, volume, turnover]`.
/// Close precedes high and low on this venue.
pub type RawSpotCandle = Vec<SmolStr>;

/// Futures candle row: `[time_ms, open, high, low, close, volume]`, numeric.
pub type RawFuturesCandle = Vec<f64>;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotTradeHistory {
    pub sequence: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub size: Decimal,

    pub side: SmolStr,

    /// Nanoseconds.
    pub time: i64,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotSymbol {
    pub symbol: SmolStr,
    pub base_currency: SmolStr,
    pub quote_currency: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub base_min_size: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub base_max_size: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub base_increment: Decimal,

    pub price_increment: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub quote_min_size: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub quote_increment: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesContract {
    pub symbol: SmolStr,
    pub base_currency: SmolStr,
    pub quote_currency: SmolStr,

    pub multiplier: Decimal,
    pub lot_size: Decimal,

    #[serde(default)]
    pub max_order_qty: Decimal,

    pub tick_size: Decimal,

    #[serde(default)]
    pub max_leverage: Decimal,

    #[serde(default)]
    pub is_inverse: bool,

    #[serde(default)]
    pub maker_fee_rate: Option<Decimal>,

    #[serde(default)]
    pub taker_fee_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesPosition {
    pub symbol: SmolStr,

    #[serde(default)]
    pub current_qty: Decimal,

    #[serde(default)]
    pub avg_entry_price: Decimal,

    #[serde(default)]
    pub unrealised_pnl: Decimal,

    #[serde(default)]
    pub real_leverage: Decimal,

    #[serde(default)]
    pub cross_mode: bool,

    #[serde(default)]
    pub liquidation_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLimitLevel {
    pub level: u32,
    pub max_risk_limit: Decimal,
    pub min_risk_limit: Decimal,
    pub maintain_margin: Decimal,

    #[serde(default)]
    pub initial_margin: Decimal,
}

// ----- parameter types -----

#[derive(Debug, Clone, Serialize)]
pub struct SymbolParams {
    pub symbol: SmolStr,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct OpenOrdersParams {
    pub status: SmolStr,
    pub symbol: Option<SmolStr>,
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody {
    pub client_oid: SmolStr,
    pub side: SmolStr,
    pub symbol: SmolStr,

    #[serde(rename = "type")]
    pub kind: SmolStr,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub price: Option<Decimal>,

    #[serde_as(as = "DisplayFromStr")]
    pub size: Decimal,

    /// Futures-only fields.
    pub leverage: Option<SmolStr>,
    pub reduce_only: Option<bool>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotCandlesParams {
    pub symbol: SmolStr,

    #[serde(rename = "type")]
    pub interval: SmolStr,

    /// Seconds.
    pub start_at: Option<i64>,
    pub end_at: Option<i64>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesCandlesParams {
    pub symbol: SmolStr,

    /// Minutes.
    pub granularity: u32,

    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyParams {
    pub currency: SmolStr,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolsFeeParams {
    pub symbols: SmolStr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLeverageBody {
    pub symbol: SmolStr,
    pub leverage: SmolStr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMarginModeBody {
    pub symbol: SmolStr,
    pub margin_mode: SmolStr,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientOidParams {
    #[serde(rename = "clientOid")]
    pub client_oid: SmolStr,
}

/// One envelope-wrapped request against either KuCoin host.
#[derive(Debug, Clone)]
pub struct KucoinRequest<Params, Data> {
    path: Cow<'static, str>,
    method: reqwest::Method,
    params: Params,
    response: std::marker::PhantomData<Data>,
}

impl<Params, Data> KucoinRequest<Params, Data> {
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

impl<Params, Data> RestRequest for KucoinRequest<Params, Data>
where
    Params: Serialize + Send + Sync,
    Data: serde::de::DeserializeOwned + Send + Sync,
{
    type Response = KucoinHttpResponse<Data>;
    type QueryParams = Params;
    type Body = Params;

    fn path(&self) -> Cow<'static, str> {
        self.path.clone()
    }

    fn method(&self) -> reqwest::Method {
        self.method.clone()
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        (self.method == reqwest::Method::GET || self.method == reqwest::Method::DELETE)
            .then_some(&self.params)
    }

    fn body(&self) -> Option<&Self::Body> {
        (self.method == reqwest::Method::POST).then_some(&self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod de {
        use super::*;

        #[test]
        fn test_spot_order_detail() {
            let raw_response = r#"{
                "code": "200000",
                "data": {
                    "id": "5f3113a1c9b6d539dc614dc6",
                    "symbol": "BTC-USDT",
                    "clientOid": "cid-1",
                    "side": "buy",
                    "type": "limit",
                    "price": "9000",
                    "size": "0.1",
                    "dealFunds": "0",
                    "dealSize": "0",
                    "isActive": true,
                    "cancelExist": false,
                    "createdAt": 1597026383085
                }
            }"#;

            let response =
                serde_json::from_str::<KucoinHttpResponse<SpotOrder>>(raw_response).unwrap();
            assert_eq!(response.code, "200000");
            let order = response.data.unwrap();
            assert!(order.is_active);
            assert_eq!(order.deal_size, "0");
        }

        #[test]
        fn test_error_envelope_has_no_data() {
            let raw_response = r#"{"code": "400100", "msg": "order not exist."}"#;

            let response =
                serde_json::from_str::<KucoinHttpResponse<SpotOrder>>(raw_response).unwrap();
            assert_eq!(response.code, "400100");
            assert!(response.data.is_none());
        }
    }
}
