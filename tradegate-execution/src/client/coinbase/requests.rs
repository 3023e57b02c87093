use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as, skip_serializing_none};
use smol_str::SmolStr;
use std::borrow::Cow;
use tradegate_integration::protocol::http::rest::RestRequest;

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsResponse {
    pub accounts: Vec<CoinbaseAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseAccount {
    pub uuid: SmolStr,
    pub currency: SmolStr,
    pub available_balance: MoneyAmount,

    #[serde(default)]
    pub hold: Option<MoneyAmount>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct MoneyAmount {
    #[serde_as(as = "DisplayFromStr")]
    pub value: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderEnvelope {
    pub order: CoinbaseOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersBatch {
    pub orders: Vec<CoinbaseOrder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseOrder {
    pub order_id: SmolStr,

    #[serde(default)]
    pub client_order_id: SmolStr,

    pub product_id: SmolStr,
    pub side: SmolStr,
    pub status: SmolStr,

    #[serde(default)]
    pub completion_percentage: SmolStr,

    #[serde(default)]
    pub filled_size: SmolStr,

    #[serde(default)]
    pub average_filled_price: SmolStr,

    /// RFC3339.
    #[serde(default)]
    pub created_time: SmolStr,

    #[serde(default)]
    pub last_fill_time: Option<SmolStr>,

    pub order_configuration: OrderConfiguration,
}

/// Order shape is carried by which configuration variant is present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OrderConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_limit_gtc: Option<LimitGtc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_market_ioc: Option<MarketIoc>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitGtc {
    #[serde_as(as = "DisplayFromStr")]
    pub base_size: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub limit_price: Decimal,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketIoc {
    #[serde_as(as = "DisplayFromStr")]
    pub base_size: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderResponse {
    pub success: bool,

    #[serde(default)]
    pub success_response: Option<PlacedOrderIds>,

    #[serde(default)]
    pub error_response: Option<super::parser::CoinbaseErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlacedOrderIds {
    pub order_id: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchCancelResponse {
    pub results: Vec<CancelResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelResult {
    pub success: bool,
    pub order_id: SmolStr,

    #[serde(default)]
    pub failure_reason: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<CoinbaseProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseProduct {
    pub product_id: SmolStr,

    #[serde(default)]
    pub price: SmolStr,

    pub base_increment: SmolStr,
    pub quote_increment: SmolStr,

    #[serde(default)]
    pub price_increment: Option<SmolStr>,

    #[serde(default)]
    pub quote_min_size: SmolStr,

    #[serde(default)]
    pub base_min_size: SmolStr,

    #[serde(default)]
    pub base_max_size: SmolStr,

    #[serde(default)]
    pub base_currency_id: SmolStr,

    #[serde(default)]
    pub quote_currency_id: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandlesResponse {
    pub candles: Vec<CoinbaseCandle>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseCandle {
    /// Unix seconds, as a string.
    pub start: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub low: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub high: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub open: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub close: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub volume: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerResponse {
    pub trades: Vec<CoinbaseTrade>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseTrade {
    pub trade_id: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub price: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub size: Decimal,

    /// RFC3339.
    pub time: SmolStr,

    pub side: SmolStr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionSummary {
    pub fee_tier: FeeTier,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct FeeTier {
    #[serde_as(as = "DisplayFromStr")]
    pub maker_fee_rate: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub taker_fee_rate: Decimal,
}

// ----- parameter types -----

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct BatchOrdersParams {
    pub product_id: Option<SmolStr>,
    pub order_status: Option<SmolStr>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderBody {
    pub client_order_id: SmolStr,
    pub product_id: SmolStr,
    pub side: SmolStr,
    pub order_configuration: OrderConfiguration,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchCancelBody {
    pub order_ids: Vec<SmolStr>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct CandlesParams {
    /// Unix seconds.
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub granularity: SmolStr,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct TickerParams {
    pub limit: Option<u32>,
}

/// One Advanced Trade request.
#[derive(Debug, Clone)]
pub struct CoinbaseRequest<Params, Response> {
    path: Cow<'static, str>,
    method: reqwest::Method,
    params: Params,
    response: std::marker::PhantomData<Response>,
}

impl<Params, Response> CoinbaseRequest<Params, Response> {
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

impl<Params, Response> RestRequest for CoinbaseRequest<Params, Response>
where
    Params: Serialize + Send + Sync,
    Response: serde::de::DeserializeOwned + Send + Sync,
{
    type Response = Response;
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
        fn test_order_envelope() {
            let raw_response = r#"{
                "order": {
                    "order_id": "0001-0001",
                    "client_order_id": "cid-9",
                    "product_id": "BTC-USD",
                    "side": "BUY",
                    "status": "OPEN",
                    "completion_percentage": "50",
                    "filled_size": "0.05",
                    "average_filled_price": "41000",
                    "created_time": "2021-05-31T09:59:59Z",
                    "order_configuration": {
                        "limit_limit_gtc": {"base_size": "0.1", "limit_price": "41000.00"}
                    }
                }
            }"#;

            let envelope = serde_json::from_str::<OrderEnvelope>(raw_response).unwrap();
            let config = envelope.order.order_configuration.limit_limit_gtc.unwrap();
            assert_eq!(config.base_size, dec!(0.1));
            assert_eq!(envelope.order.status, "OPEN");
        }

        #[test]
        fn test_accounts_response() {
            let raw_response = r#"{
                "accounts": [{
                    "uuid": "8bfc20d7-f7c6-4422-bf07-8243ca4169fe",
                    "currency": "BTC",
                    "available_balance": {"value": "1.23", "currency": "BTC"},
                    "hold": {"value": "0.01", "currency": "BTC"}
                }],
                "has_next": false
            }"#;

            let response = serde_json::from_str::<AccountsResponse>(raw_response).unwrap();
            assert_eq!(response.accounts[0].available_balance.value, dec!(1.23));
        }
    }
}
