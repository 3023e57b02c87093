use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as, skip_serializing_none};
use smol_str::SmolStr;
use std::borrow::Cow;
use tradegate_integration::protocol::http::rest::RestRequest;

/// V5 response envelope: `code` is `"0"` on success, `data` is always a list.
#[derive(Debug, Clone, Deserialize)]
pub struct OkxHttpResponse<Item> {
    pub code: SmolStr,

    #[serde(default)]
    pub msg: String,

    pub data: Vec<Item>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OkxOrder {
    #[serde(rename = "instId")]
    pub inst_id: SmolStr,

    #[serde(rename = "ordId")]
    pub ord_id: SmolStr,

    #[serde(rename = "clOrdId", default)]
    pub cl_ord_id: SmolStr,

    #[serde(rename = "cTime", default)]
    pub c_time: SmolStr,

    #[serde(rename = "uTime", default)]
    pub u_time: SmolStr,

    #[serde(rename = "px", default)]
    pub px: SmolStr,

    #[serde(rename = "sz")]
    pub sz: SmolStr,

    #[serde(rename = "accFillSz", default)]
    pub acc_fill_sz: SmolStr,

    #[serde(rename = "avgPx", default)]
    pub avg_px: SmolStr,

    pub state: SmolStr,

    #[serde(rename = "ordType")]
    pub ord_type: SmolStr,

    pub side: SmolStr,

    #[serde(rename = "posSide", default)]
    pub pos_side: SmolStr,

    #[serde(rename = "reduceOnly", default)]
    pub reduce_only: SmolStr,
}

/// Per-item ack inside the order placement/cancel envelope; `sCode` is the
/// item-level result.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderAck {
    #[serde(rename = "ordId", default)]
    pub ord_id: SmolStr,

    #[serde(rename = "clOrdId", default)]
    pub cl_ord_id: SmolStr,

    #[serde(rename = "sCode", default)]
    pub s_code: SmolStr,

    #[serde(rename = "sMsg", default)]
    pub s_msg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceEnvelope {
    pub details: Vec<BalanceDetail>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceDetail {
    pub ccy: SmolStr,

    #[serde(rename = "availBal", default)]
    pub avail_bal: SmolStr,

    #[serde(rename = "frozenBal", default)]
    pub frozen_bal: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub uid: SmolStr,

    #[serde(rename = "posMode", default)]
    pub pos_mode: SmolStr,

    #[serde(default)]
    pub perm: SmolStr,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct TradeFee {
    #[serde_as(as = "DisplayFromStr")]
    pub maker: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub taker: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct TickerEntry {
    #[serde(rename = "instId")]
    pub inst_id: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub last: Decimal,
}

/// Candle row: `[ts, o, h, l, c, vol, ...]`, all strings, newest first.
pub type RawOkxCandle = Vec<SmolStr>;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct PublicTrade {
    #[serde(rename = "tradeId")]
    pub trade_id: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub px: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub sz: Decimal,

    pub side: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub ts: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentEntry {
    #[serde(rename = "instId")]
    pub inst_id: SmolStr,

    #[serde(rename = "baseCcy", default)]
    pub base_ccy: SmolStr,

    #[serde(rename = "quoteCcy", default)]
    pub quote_ccy: SmolStr,

    /// Contract settle currency (swap instruments).
    #[serde(rename = "settleCcy", default)]
    pub settle_ccy: SmolStr,

    #[serde(rename = "ctVal", default)]
    pub ct_val: SmolStr,

    #[serde(rename = "ctValCcy", default)]
    pub ct_val_ccy: SmolStr,

    #[serde(rename = "tickSz")]
    pub tick_sz: SmolStr,

    #[serde(rename = "lotSz")]
    pub lot_sz: SmolStr,

    #[serde(rename = "minSz")]
    pub min_sz: SmolStr,

    #[serde(rename = "maxLmtSz", default)]
    pub max_lmt_sz: SmolStr,

    #[serde(rename = "maxMktSz", default)]
    pub max_mkt_sz: SmolStr,

    #[serde(default)]
    pub lever: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionEntry {
    #[serde(rename = "instId")]
    pub inst_id: SmolStr,

    #[serde(rename = "posSide", default)]
    pub pos_side: SmolStr,

    #[serde(default)]
    pub pos: SmolStr,

    #[serde(rename = "avgPx", default)]
    pub avg_px: SmolStr,

    #[serde(default)]
    pub upl: SmolStr,

    #[serde(default)]
    pub lever: SmolStr,

    #[serde(rename = "mgnMode", default)]
    pub mgn_mode: SmolStr,

    #[serde(rename = "liqPx", default)]
    pub liq_px: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionTier {
    #[serde(default)]
    pub tier: SmolStr,

    #[serde(rename = "maxLever", default)]
    pub max_lever: SmolStr,

    #[serde(rename = "maxSz", default)]
    pub max_sz: SmolStr,

    #[serde(rename = "minSz", default)]
    pub min_sz: SmolStr,

    #[serde(default)]
    pub mmr: SmolStr,
}

// ----- parameter types -----

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct InstParams {
    #[serde(rename = "instId")]
    pub inst_id: Option<SmolStr>,

    #[serde(rename = "instType")]
    pub inst_type: Option<SmolStr>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct OrderLookupParams {
    #[serde(rename = "instId")]
    pub inst_id: SmolStr,

    #[serde(rename = "clOrdId")]
    pub cl_ord_id: Option<SmolStr>,

    #[serde(rename = "ordId")]
    pub ord_id: Option<SmolStr>,
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderBody {
    #[serde(rename = "instId")]
    pub inst_id: SmolStr,

    #[serde(rename = "tdMode")]
    pub td_mode: SmolStr,

    #[serde(rename = "clOrdId")]
    pub cl_ord_id: SmolStr,

    pub side: SmolStr,

    #[serde(rename = "ordType")]
    pub ord_type: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub sz: Decimal,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub px: Option<Decimal>,

    #[serde(rename = "posSide")]
    pub pos_side: Option<SmolStr>,

    #[serde(rename = "reduceOnly")]
    pub reduce_only: Option<bool>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct CandlesParams {
    #[serde(rename = "instId")]
    pub inst_id: SmolStr,

    pub bar: SmolStr,

    /// Pagination: rows strictly older than this ts.
    pub after: Option<i64>,

    /// Rows strictly newer than this ts.
    pub before: Option<i64>,

    pub limit: Option<u32>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct SetLeverageBody {
    #[serde(rename = "instId")]
    pub inst_id: SmolStr,

    pub lever: SmolStr,

    #[serde(rename = "mgnMode")]
    pub mgn_mode: SmolStr,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetPositionModeBody {
    #[serde(rename = "posMode")]
    pub pos_mode: SmolStr,
}

#[derive(Debug, Clone, Serialize)]
pub struct UidParams {
    pub uid: SmolStr,
}

/// One V5 request; GET params go to the query string, POST params to the
/// JSON body, and the signer hashes path+query+body accordingly.
#[derive(Debug, Clone)]
pub struct OkxRequest<Params, Item> {
    path: Cow<'static, str>,
    method: reqwest::Method,
    params: Params,
    response: std::marker::PhantomData<Item>,
}

impl<Params, Item> OkxRequest<Params, Item> {
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

impl<Params, Item> RestRequest for OkxRequest<Params, Item>
where
    Params: Serialize + Send + Sync,
    Item: serde::de::DeserializeOwned + Send + Sync,
{
    type Response = OkxHttpResponse<Item>;
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
        fn test_order_placement_envelope() {
            let raw_response = r#"{
                "code": "0",
                "msg": "",
                "data": [{
                    "ordId": "312269865356374016",
                    "clOrdId": "cid-1",
                    "tag": "",
                    "sCode": "0",
                    "sMsg": ""
                }]
            }"#;

            let response =
                serde_json::from_str::<OkxHttpResponse<OrderAck>>(raw_response).unwrap();
            assert_eq!(response.code, "0");
            assert_eq!(response.data[0].ord_id, "312269865356374016");
        }

        #[test]
        fn test_order_state() {
            let raw_response = r#"{
                "instId": "BTC-USDT",
                "ordId": "312269865356374016",
                "clOrdId": "cid-1",
                "cTime": "1597026383085",
                "uTime": "1597026383085",
                "px": "20000",
                "sz": "1",
                "accFillSz": "0.5",
                "avgPx": "20000",
                "state": "partially_filled",
                "ordType": "limit",
                "side": "buy",
                "posSide": "net",
                "reduceOnly": "false"
            }"#;

            let order = serde_json::from_str::<OkxOrder>(raw_response).unwrap();
            assert_eq!(order.state, "partially_filled");
            assert_eq!(order.pos_side, "net");
        }
    }
}
