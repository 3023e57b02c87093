use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as, skip_serializing_none};
use smol_str::SmolStr;
use std::borrow::Cow;
use tradegate_integration::protocol::http::rest::RestRequest;

/// V2 response envelope: `code` is `"00000"` on success.
#[derive(Debug, Clone, Deserialize)]
pub struct BitgetHttpResponse<Data> {
    pub code: SmolStr,

    #[serde(default)]
    pub msg: String,

    pub data: Option<Data>,
}

/// Order envelope shared by the spot and mix surfaces.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetOrder {
    pub order_id: SmolStr,

    #[serde(default)]
    pub client_oid: SmolStr,

    pub symbol: SmolStr,

    #[serde(default)]
    pub price: SmolStr,

    pub size: SmolStr,

    /// Filled base quantity.
    #[serde(default)]
    pub base_volume: SmolStr,

    /// Filled quote value.
    #[serde(default)]
    pub quote_volume: SmolStr,

    #[serde(default)]
    pub price_avg: SmolStr,

    pub status: SmolStr,
    pub side: SmolStr,
    pub order_type: SmolStr,

    #[serde(default)]
    pub pos_side: SmolStr,

    #[serde(default)]
    pub reduce_only: SmolStr,

    #[serde(default)]
    pub c_time: SmolStr,

    #[serde(default)]
    pub u_time: SmolStr,
}

/// Mix pending-order listing wrapper.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrders {
    #[serde(default)]
    pub entrusted_list: Option<Vec<BitgetOrder>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: SmolStr,

    #[serde(default)]
    pub client_oid: SmolStr,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotAsset {
    pub coin: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub available: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub frozen: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub locked: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixAccount {
    pub margin_coin: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub available: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub locked: Decimal,

    #[serde(default)]
    pub pos_mode: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub user_id: SmolStr,

    #[serde(default)]
    pub channel_code: SmolStr,

    #[serde(default)]
    pub authorities: Vec<SmolStr>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRate {
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
    pub last_pr: Decimal,
}

/// Candle row: `[ts, open, high, low, close, baseVol, ...]`, strings.
pub type RawBitgetCandle = Vec<SmolStr>;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillEntry {
    pub trade_id: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub size: Decimal,

    pub side: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub ts: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotSymbol {
    pub symbol: SmolStr,
    pub base_coin: SmolStr,
    pub quote_coin: SmolStr,

    #[serde(default)]
    pub min_trade_amount: SmolStr,

    #[serde(default)]
    pub max_trade_amount: SmolStr,

    /// Digits, not a tick string.
    pub price_precision: SmolStr,
    pub quantity_precision: SmolStr,

    #[serde(default)]
    pub min_trade_usdt: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixContract {
    pub symbol: SmolStr,
    pub base_coin: SmolStr,
    pub quote_coin: SmolStr,

    #[serde(default)]
    pub min_trade_num: SmolStr,

    #[serde(default)]
    pub max_order_num: SmolStr,

    pub price_place: SmolStr,
    pub volume_place: SmolStr,

    #[serde(default)]
    pub size_multiplier: SmolStr,

    #[serde(default)]
    pub max_lever: SmolStr,

    #[serde(default)]
    pub min_lever: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixPosition {
    pub symbol: SmolStr,

    #[serde(default)]
    pub hold_side: SmolStr,

    #[serde(default)]
    pub total: SmolStr,

    #[serde(default)]
    pub open_price_avg: SmolStr,

    #[serde(default)]
    pub unrealized_pl: SmolStr,

    #[serde(default)]
    pub leverage: SmolStr,

    #[serde(default)]
    pub margin_mode: SmolStr,

    #[serde(default)]
    pub liquidation_price: SmolStr,

    #[serde(default)]
    pub pos_mode: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionTier {
    pub level: SmolStr,

    #[serde(default)]
    pub start_unit: SmolStr,

    #[serde(default)]
    pub end_unit: SmolStr,

    pub leverage: SmolStr,

    #[serde(default)]
    pub keep_margin_rate: SmolStr,
}

// ----- parameter types -----

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotSymbolParams {
    pub symbol: Option<SmolStr>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixParams {
    pub product_type: SmolStr,
    pub symbol: Option<SmolStr>,

    pub margin_coin: Option<SmolStr>,
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotPlaceOrderBody {
    pub symbol: SmolStr,
    pub side: SmolStr,
    pub order_type: SmolStr,

    /// Time condition, `gtc` for resting limit orders.
    pub force: SmolStr,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub price: Option<Decimal>,

    #[serde_as(as = "DisplayFromStr")]
    pub size: Decimal,

    pub client_oid: SmolStr,
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixPlaceOrderBody {
    pub symbol: SmolStr,
    pub product_type: SmolStr,
    pub margin_mode: SmolStr,
    pub margin_coin: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub size: Decimal,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub price: Option<Decimal>,

    pub side: SmolStr,
    pub order_type: SmolStr,
    pub force: Option<SmolStr>,
    pub client_oid: SmolStr,
    pub reduce_only: Option<SmolStr>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLookupParams {
    pub symbol: Option<SmolStr>,
    pub product_type: Option<SmolStr>,
    pub client_oid: Option<SmolStr>,
    pub order_id: Option<SmolStr>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandlesParams {
    pub symbol: SmolStr,
    pub product_type: Option<SmolStr>,
    pub granularity: SmolStr,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRateParams {
    pub symbol: SmolStr,
    pub business_type: SmolStr,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLeverageBody {
    pub symbol: SmolStr,
    pub product_type: SmolStr,
    pub margin_coin: SmolStr,
    pub leverage: SmolStr,
    pub hold_side: Option<SmolStr>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMarginModeBody {
    pub symbol: SmolStr,
    pub product_type: SmolStr,
    pub margin_coin: SmolStr,
    pub margin_mode: SmolStr,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPositionModeBody {
    pub product_type: SmolStr,
    pub pos_mode: SmolStr,
}

/// One V2 request; GET/DELETE params serialize to the query string, POST to
/// the JSON body.
#[derive(Debug, Clone)]
pub struct BitgetRequest<Params, Data> {
    path: Cow<'static, str>,
    method: reqwest::Method,
    params: Params,
    response: std::marker::PhantomData<Data>,
}

impl<Params, Data> BitgetRequest<Params, Data> {
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

impl<Params, Data> RestRequest for BitgetRequest<Params, Data>
where
    Params: Serialize + Send + Sync,
    Data: serde::de::DeserializeOwned + Send + Sync,
{
    type Response = BitgetHttpResponse<Data>;
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

        #[test]
        fn test_spot_order_info() {
            let raw_response = r#"{
                "code": "00000",
                "msg": "success",
                "data": [{
                    "orderId": "121211212122",
                    "clientOid": "cid-7",
                    "symbol": "BTCUSDT",
                    "price": "34829.12",
                    "size": "1",
                    "baseVolume": "0.5",
                    "quoteVolume": "17414.56",
                    "priceAvg": "34829.12",
                    "status": "partially_filled",
                    "side": "buy",
                    "orderType": "limit",
                    "cTime": "1622697148",
                    "uTime": "1622697148"
                }]
            }"#;

            let response =
                serde_json::from_str::<BitgetHttpResponse<Vec<BitgetOrder>>>(raw_response).unwrap();
            assert_eq!(response.code, "00000");
            let order = &response.data.unwrap()[0];
            assert_eq!(order.status, "partially_filled");
            assert_eq!(order.base_volume, "0.5");
        }

        #[test]
        fn test_error_envelope() {
            let raw_response = r#"{"code": "43001", "msg": "The order cannot be found", "data": null}"#;

            let response =
                serde_json::from_str::<BitgetHttpResponse<Vec<BitgetOrder>>>(raw_response).unwrap();
            assert_eq!(response.code, "43001");
            assert!(response.data.is_none());
        }
    }
}
