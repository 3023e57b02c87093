use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as, skip_serializing_none};
use smol_str::SmolStr;
use std::borrow::Cow;
use tradegate_integration::protocol::http::rest::RestRequest;

/// V5 response envelope shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BybitHttpResponse<Inner> {
    #[serde(rename = "retCode")]
    pub ret_code: i64,

    #[serde(rename = "retMsg")]
    pub ret_msg: String,

    pub result: Inner,

    /// Server unix-ms.
    #[serde(default)]
    pub time: i64,
}

/// `result` wrapper for list-shaped endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResult<Item> {
    pub list: Vec<Item>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitOrder {
    pub symbol: SmolStr,
    pub order_id: SmolStr,

    #[serde(default)]
    pub order_link_id: SmolStr,

    #[serde(default)]
    pub created_time: Option<SmolStr>,

    #[serde(default)]
    pub updated_time: Option<SmolStr>,

    pub price: SmolStr,
    pub qty: SmolStr,

    #[serde(default)]
    pub cum_exec_qty: SmolStr,

    #[serde(default)]
    pub cum_exec_value: SmolStr,

    #[serde(default)]
    pub avg_price: SmolStr,

    pub order_status: SmolStr,
    pub order_type: SmolStr,
    pub side: SmolStr,

    #[serde(default)]
    pub reduce_only: Option<bool>,

    #[serde(default)]
    pub position_idx: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: SmolStr,

    #[serde(default)]
    pub order_link_id: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalanceEntry {
    pub account_type: SmolStr,
    pub coin: Vec<WalletCoin>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCoin {
    pub coin: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub wallet_balance: Decimal,

    /// Empty string on some account types.
    #[serde(default)]
    pub locked: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub margin_mode: SmolStr,

    #[serde(default)]
    pub unified_margin_status: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyInfo {
    #[serde(rename = "userID")]
    pub user_id: i64,

    #[serde(default)]
    pub read_only: i32,

    #[serde(default)]
    pub permissions: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateInfo {
    #[serde(default)]
    pub is_affiliate: bool,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRateEntry {
    pub symbol: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub maker_fee_rate: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub taker_fee_rate: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerEntry {
    pub symbol: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub last_price: Decimal,
}

/// Kline row: `[start, open, high, low, close, volume, turnover]`, all strings.
pub type RawBybitKline = (SmolStr, SmolStr, SmolStr, SmolStr, SmolStr, SmolStr, SmolStr);

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTrade {
    pub exec_id: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub size: Decimal,

    pub side: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub time: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentEntry {
    pub symbol: SmolStr,
    pub base_coin: SmolStr,
    pub quote_coin: SmolStr,
    pub price_filter: PriceFilter,
    pub lot_size_filter: LotSizeFilter,

    #[serde(default)]
    pub leverage_filter: Option<LeverageFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFilter {
    pub tick_size: SmolStr,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSizeFilter {
    #[serde_as(as = "DisplayFromStr")]
    pub min_order_qty: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub max_order_qty: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub qty_step: Decimal,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub max_mkt_order_qty: Option<Decimal>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub min_notional_value: Option<Decimal>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageFilter {
    #[serde_as(as = "DisplayFromStr")]
    pub min_leverage: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub max_leverage: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub leverage_step: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEntry {
    pub symbol: SmolStr,
    pub side: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub size: Decimal,

    #[serde(default)]
    pub avg_price: SmolStr,

    #[serde(default)]
    pub unrealised_pnl: SmolStr,

    #[serde(default)]
    pub leverage: SmolStr,

    pub position_idx: u8,

    #[serde(default)]
    pub trade_mode: i32,

    #[serde(default)]
    pub liq_price: SmolStr,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLimitEntry {
    pub id: u32,

    #[serde_as(as = "DisplayFromStr")]
    pub risk_limit_value: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub maintenance_margin: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub max_leverage: Decimal,
}

// ----- parameter types -----

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryParams {
    pub category: SmolStr,
    pub symbol: Option<SmolStr>,
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody {
    pub category: SmolStr,
    pub symbol: SmolStr,
    pub side: SmolStr,
    pub order_type: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub qty: Decimal,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub price: Option<Decimal>,

    pub time_in_force: Option<SmolStr>,
    pub order_link_id: SmolStr,
    pub reduce_only: Option<bool>,
    pub position_idx: Option<u8>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderBody {
    pub category: SmolStr,
    pub symbol: SmolStr,
    pub order_id: Option<SmolStr>,
    pub order_link_id: Option<SmolStr>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQueryParams {
    pub category: SmolStr,
    pub symbol: Option<SmolStr>,
    pub order_link_id: Option<SmolStr>,
    pub open_only: Option<u8>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KlineParams {
    pub category: SmolStr,
    pub symbol: SmolStr,
    pub interval: SmolStr,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub limit: Option<u32>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalanceParams {
    pub account_type: SmolStr,
    pub coin: Option<SmolStr>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLeverageBody {
    pub category: SmolStr,
    pub symbol: SmolStr,
    pub buy_leverage: SmolStr,
    pub sell_leverage: SmolStr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchIsolatedBody {
    pub category: SmolStr,
    pub symbol: SmolStr,
    pub trade_mode: i32,
    pub buy_leverage: SmolStr,
    pub sell_leverage: SmolStr,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchModeBody {
    pub category: SmolStr,
    pub symbol: Option<SmolStr>,
    pub coin: Option<SmolStr>,
    pub mode: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct UidParams {
    pub uid: SmolStr,
}

/// One V5 request: GET carries `params` as the query string, POST as the
/// JSON body (the signer hashes whichever is present).
#[derive(Debug, Clone)]
pub struct BybitRequest<Params, Inner> {
    path: Cow<'static, str>,
    method: reqwest::Method,
    params: Params,
    response: std::marker::PhantomData<Inner>,
}

impl<Params, Inner> BybitRequest<Params, Inner> {
    pub fn get(path: impl Into<Cow<'static, str>>, params: Params) -> Self {
        Self {
            path: path.into(),
            method: reqwest::Method::GET,
            params,
            response: std::marker::PhantomData,
        }
    }

    pub fn post(path: impl Into<Cow<'static, str>>, params: Params) -> Self {
        Self {
            path: path.into(),
            method: reqwest::Method::POST,
            params,
            response: std::marker::PhantomData,
        }
    }
}

impl<Params, Inner> RestRequest for BybitRequest<Params, Inner>
where
    Params: Serialize + Send + Sync,
    Inner: serde::de::DeserializeOwned + Send + Sync,
{
    type Response = BybitHttpResponse<Inner>;
    type QueryParams = Params;
    type Body = Params;

    fn path(&self) -> Cow<'static, str> {
        self.path.clone()
    }

    fn method(&self) -> reqwest::Method {
        self.method.clone()
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        (self.method == reqwest::Method::GET).then_some(&self.params)
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
        use rust_decimal_macros::dec;

        #[test]
        fn test_place_order_ack() {
            let raw_response = r#"{
                "retCode": 0,
                "retMsg": "OK",
                "result": {
                    "orderId": "1321003749386327552",
                    "orderLinkId": "test-client-id"
                },
                "retExtInfo": {},
                "time": 1672211918471
            }"#;

            let actual =
                serde_json::from_str::<BybitHttpResponse<OrderAck>>(raw_response).unwrap();
            assert_eq!(actual.ret_code, 0);
            assert_eq!(actual.result.order_id, "1321003749386327552");
            assert_eq!(actual.time, 1_672_211_918_471);
        }

        #[test]
        fn test_order_list() {
            let raw_response = r#"{
                "retCode": 0,
                "retMsg": "OK",
                "result": {
                    "list": [{
                        "symbol": "ETHUSDT",
                        "orderId": "fd4300ae-7847-404e-b947-b46980a4d140",
                        "orderLinkId": "test-01",
                        "createdTime": "1672211918471",
                        "updatedTime": "1672211918990",
                        "price": "1600.00",
                        "qty": "0.10",
                        "cumExecQty": "0.05",
                        "cumExecValue": "80.00",
                        "avgPrice": "1600.00",
                        "orderStatus": "PartiallyFilled",
                        "orderType": "Limit",
                        "side": "Buy",
                        "reduceOnly": false,
                        "positionIdx": 1
                    }]
                },
                "time": 1672211919000
            }"#;

            let actual = serde_json::from_str::<BybitHttpResponse<ListResult<BybitOrder>>>(
                raw_response,
            )
            .unwrap();
            let order = &actual.result.list[0];
            assert_eq!(order.order_status, "PartiallyFilled");
            assert_eq!(order.position_idx, Some(1));
        }

        #[test]
        fn test_instrument_entry_filters() {
            let raw_response = r#"{
                "symbol": "BTCUSDT",
                "baseCoin": "BTC",
                "quoteCoin": "USDT",
                "priceFilter": {"tickSize": "0.10"},
                "lotSizeFilter": {
                    "minOrderQty": "0.001",
                    "maxOrderQty": "100",
                    "qtyStep": "0.001",
                    "maxMktOrderQty": "50",
                    "minNotionalValue": "5"
                },
                "leverageFilter": {
                    "minLeverage": "1",
                    "maxLeverage": "100.00",
                    "leverageStep": "0.01"
                }
            }"#;

            let entry = serde_json::from_str::<InstrumentEntry>(raw_response).unwrap();
            assert_eq!(entry.price_filter.tick_size, "0.10");
            assert_eq!(entry.lot_size_filter.min_notional_value, Some(dec!(5)));
            assert_eq!(
                entry.leverage_filter.as_ref().unwrap().max_leverage,
                dec!(100)
            );
        }
    }
}
