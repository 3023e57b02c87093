use self::{
    parser::CoinbaseParser,
    requests::{
        AccountsResponse, BatchCancelBody, BatchCancelResponse, BatchOrdersParams, CandlesParams,
        CandlesResponse, CoinbaseOrder, CoinbaseRequest, LimitGtc, MarketIoc, OrderConfiguration,
        OrderEnvelope, OrdersBatch, PlaceOrderBody, PlaceOrderResponse, ProductsResponse,
        TickerParams, TickerResponse, TransactionSummary,
    },
    signer::{CoinbaseRequestSigner, CoinbaseSigner},
};
use super::{Connector, acquire_slot, lookup_until_visible, seal_outcome};
use crate::{
    CallOutcome,
    config::{ProviderConfig, coinbase_default_credentials},
    error::{CallError, VenueError},
    governor::{Endpoint, coinbase::CoinbaseGovernor, registry},
    model::{
        balance::FreeAsset,
        fee::{PairUserFee, UserFee},
        market::{Candle, CandleRange, TickerPrice, Trade},
        order::{CanonicalOrder, OpenOrderRequest, OpenOrders, OrderIdQuery, OrderQuery},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
    retry::{AttemptError, coinbase::CoinbaseRetryPolicy, with_retry},
};
use hmac::Mac;
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use smol_str::SmolStr;
use std::{sync::Arc, time::Duration};
use tradegate_instrument::{
    OrderType, Side, instrument::Instrument, interval::CandleInterval, symbol::Symbol,
    venue::VenueId,
};
use tradegate_integration::{
    clock::{SharedClock, system_clock},
    profile::TimeProfile,
    protocol::http::{private::encoder::HexEncoder, rest::{NoParams, client::RestClient}},
};

mod parser;
mod requests;
mod signer;

pub mod normalize;

const HTTP_BASE_URL: &str = "https://api.coinbase.com";

mod endpoints {
    use super::Endpoint;

    pub const ACCOUNTS: Endpoint = Endpoint::request("private/accounts", 1);
    pub const PLACE_ORDER: Endpoint = Endpoint::order("private/orders", 1);
    pub const BATCH_CANCEL: Endpoint = Endpoint::order("private/orders/batch_cancel", 1);
    pub const ORDER_LOOKUP: Endpoint = Endpoint::request("private/orders/historical", 1);
    pub const TRANSACTION_SUMMARY: Endpoint = Endpoint::request("private/transaction_summary", 1);
    pub const PRODUCTS: Endpoint = Endpoint::request("public/products", 1);
    pub const CANDLES: Endpoint = Endpoint::request("public/candles", 1);
    pub const TICKER: Endpoint = Endpoint::request("public/ticker", 1);
}

type CoinbaseRestClient = RestClient<'static, CoinbaseRequestSigner, CoinbaseParser>;

/// Coinbase Advanced Trade connector (spot only).
///
/// When the caller supplies no credentials, the process-level default key
/// pair (if configured) still serves public market data; private operations
/// then fail as client-missing.
#[derive(Debug)]
pub struct CoinbaseConnector {
    rest: Option<CoinbaseRestClient>,

    /// True when `rest` was built from the environment fallback keys.
    default_keys: bool,

    governor: Arc<CoinbaseGovernor>,
    policy: CoinbaseRetryPolicy,
    clock: SharedClock,
    timeout: Duration,
}

impl CoinbaseConnector {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_parts(config, registry::coinbase(), system_clock())
    }

    pub fn with_parts(
        config: ProviderConfig,
        governor: Arc<CoinbaseGovernor>,
        clock: SharedClock,
    ) -> Self {
        // Paper-trading deployments front the venue behind their own host
        let base_url = config
            .host
            .clone()
            .or_else(|| config.demo.then(crate::config::paper_trading_url).flatten())
            .unwrap_or_else(|| HTTP_BASE_URL.to_string());

        let default_keys = config.credentials.is_none();
        let credentials = config
            .credentials
            .clone()
            .or_else(coinbase_default_credentials);

        let rest = credentials.map(|credentials| {
            let hmac = hmac::Hmac::new_from_slice(credentials.secret.as_bytes())
                .expect("ApiCredentials secret invalid length");
            RestClient::new(
                base_url,
                CoinbaseRequestSigner::new(
                    CoinbaseSigner::new(credentials.key.clone()),
                    hmac,
                    HexEncoder,
                ),
                CoinbaseParser,
            )
        });

        Self {
            rest,
            default_keys,
            governor,
            policy: CoinbaseRetryPolicy::new(config.retry),
            clock,
            timeout: config.timeout,
        }
    }

    async fn issue<Params, Response>(
        &self,
        endpoint: &Endpoint,
        request: CoinbaseRequest<Params, Response>,
        profile: &mut TimeProfile,
    ) -> Result<Response, AttemptError>
    where
        Params: Serialize + Send + Sync,
        Response: DeserializeOwned + Send + Sync,
    {
        // Fallback keys only carry public market data
        if self.default_keys && !endpoint.name.starts_with("public/") {
            return Err(AttemptError::Terminal(CallError::ClientMissing("Coinbase")));
        }

        let rest = self
            .rest
            .as_ref()
            .ok_or(CallError::ClientMissing("Coinbase"))?;

        acquire_slot(self.governor.as_ref(), endpoint, &self.clock, self.timeout, profile).await?;

        let (response, _meta) = rest
            .execute(request, profile)
            .await
            .map_err(AttemptError::Venue)?;
        Ok(response)
    }

    async fn order_by_id_attempt(
        &self,
        order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<CoinbaseOrder, AttemptError> {
        let envelope: OrderEnvelope = self
            .issue(
                &endpoints::ORDER_LOOKUP,
                CoinbaseRequest::get(
                    format!("/api/v3/brokerage/orders/historical/{order_id}"),
                    NoParams {},
                ),
                profile,
            )
            .await?;
        Ok(envelope.order)
    }

    async fn confirm_order(
        &self,
        order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<CanonicalOrder, CallError> {
        let raw = lookup_until_visible(
            async || self.order_by_id_attempt(order_id, profile).await,
            |error: &AttemptError| {
                error
                    .as_venue()
                    .is_some_and(|venue| venue.status == Some(404))
            },
        )
        .await
        .map_err(AttemptError::into_call_error)?;

        normalize::order(raw).map_err(|error| CallError::Rejected(error.message))
    }

    /// Resolve a caller-assigned client order id to the venue order record.
    async fn find_by_client_id(
        &self,
        symbol: &Symbol,
        client_order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<CoinbaseOrder, AttemptError> {
        let batch: OrdersBatch = self
            .issue(
                &endpoints::ORDER_LOOKUP,
                CoinbaseRequest::get(
                    "/api/v3/brokerage/orders/historical/batch",
                    BatchOrdersParams {
                        product_id: Some(SmolStr::new(symbol.name())),
                        order_status: None,
                    },
                ),
                profile,
            )
            .await?;

        batch
            .orders
            .into_iter()
            .find(|order| order.client_order_id == *client_order_id)
            .ok_or_else(|| AttemptError::Venue(VenueError::new("order not found")))
    }

    fn futures_unsupported<T>(&self, profile: TimeProfile) -> CallOutcome<T> {
        seal_outcome(
            Err(CallError::FuturesModeMissing),
            self.governor.as_ref(),
            &self.clock,
            profile,
            0,
        )
    }
}

impl Connector for CoinbaseConnector {
    fn venue(&self) -> VenueId {
        VenueId::Coinbase
    }

    async fn get_balance(&self) -> CallOutcome<Vec<FreeAsset>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: AccountsResponse = self
                .issue(
                    &endpoints::ACCOUNTS,
                    CoinbaseRequest::get("/api/v3/brokerage/accounts", NoParams {}),
                    &mut profile,
                )
                .await?;
            Ok(response
                .accounts
                .into_iter()
                .map(|account| {
                    let hold = account
                        .hold
                        .map(|amount| amount.value)
                        .unwrap_or_default();
                    FreeAsset::new(account.currency, account.available_balance.value, hold)
                })
                .collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_api_permission(&self) -> CallOutcome<bool> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, AccountsResponse>(
                &endpoints::ACCOUNTS,
                CoinbaseRequest::get("/api/v3/brokerage/accounts", NoParams {}),
                &mut profile,
            )
            .await?;
            Ok(true)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_uid(&self) -> CallOutcome<SmolStr> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: AccountsResponse = self
                .issue(
                    &endpoints::ACCOUNTS,
                    CoinbaseRequest::get("/api/v3/brokerage/accounts", NoParams {}),
                    &mut profile,
                )
                .await?;
            response
                .accounts
                .into_iter()
                .next()
                .map(|account| account.uuid)
                .ok_or_else(|| AttemptError::Venue(VenueError::new("no accounts on key")))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_affiliate(&self, _uid: &str) -> CallOutcome<bool> {
        let profile = TimeProfile::start(self.clock.now_ms());

        // No referral lookup surface on this venue
        seal_outcome(Ok(false), self.governor.as_ref(), &self.clock, profile, 0)
    }

    async fn open_order(&self, request: OpenOrderRequest) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let client_order_id = request.client_order_id_or_random();
        let order_configuration = match request.order_type {
            OrderType::Limit => OrderConfiguration {
                limit_limit_gtc: Some(LimitGtc {
                    base_size: request.quantity,
                    limit_price: request.price.unwrap_or_default(),
                }),
                market_market_ioc: None,
            },
            OrderType::Market => OrderConfiguration {
                limit_limit_gtc: None,
                market_market_ioc: Some(MarketIoc {
                    base_size: request.quantity,
                }),
            },
        };
        let body = PlaceOrderBody {
            client_order_id: client_order_id.clone(),
            product_id: SmolStr::new(request.symbol.name()),
            side: SmolStr::new_static(match request.side {
                Side::Buy => "BUY",
                Side::Sell => "SELL",
            }),
            order_configuration,
        };

        let (submitted, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let result: Result<PlaceOrderResponse, AttemptError> = self
                .issue(
                    &endpoints::PLACE_ORDER,
                    CoinbaseRequest::post("/api/v3/brokerage/orders", body.clone()),
                    &mut profile,
                )
                .await;

            match result {
                Ok(response) => {
                    if response.success {
                        response
                            .success_response
                            .map(|ids| ids.order_id)
                            .ok_or_else(|| {
                                AttemptError::Venue(VenueError::new(
                                    "success response carried no order id",
                                ))
                            })
                    } else {
                        let detail = response.error_response.unwrap_or_default();
                        Err(AttemptError::Venue(VenueError::new(
                            detail
                                .message
                                .or(detail.error)
                                .unwrap_or_else(|| "order rejected".to_string()),
                        )))
                    }
                }
                // The exchange may have accepted the order even though the
                // HTTP exchange failed; never re-submit in that case.
                Err(AttemptError::Venue(error)) if error.created_order_id.is_some() => {
                    Ok(error.created_order_id.expect("checked above"))
                }
                Err(error) => Err(error),
            }
        })
        .await;

        let result = match submitted {
            Ok(order_id) => self.confirm_order(&order_id, &mut profile).await,
            Err(error) => Err(error),
        };

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let raw = self
                .find_by_client_id(&query.symbol, &query.client_order_id, &mut profile)
                .await?;
            normalize::order(raw).map_err(AttemptError::Venue)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn cancel_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let order = self
                .find_by_client_id(&query.symbol, &query.client_order_id, &mut profile)
                .await?;

            let response: BatchCancelResponse = self
                .issue(
                    &endpoints::BATCH_CANCEL,
                    CoinbaseRequest::post(
                        "/api/v3/brokerage/orders/batch_cancel",
                        BatchCancelBody {
                            order_ids: vec![order.order_id.clone()],
                        },
                    ),
                    &mut profile,
                )
                .await?;

            if let Some(failed) = response.results.iter().find(|result| !result.success) {
                return Err(AttemptError::Venue(VenueError::new(format!(
                    "Can not cancel order: {}",
                    failed.failure_reason
                ))));
            }

            let raw = self.order_by_id_attempt(&order.order_id, &mut profile).await?;
            normalize::order(raw).map_err(AttemptError::Venue)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn cancel_order_by_order_id(&self, query: OrderIdQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BatchCancelResponse = self
                .issue(
                    &endpoints::BATCH_CANCEL,
                    CoinbaseRequest::post(
                        "/api/v3/brokerage/orders/batch_cancel",
                        BatchCancelBody {
                            order_ids: vec![query.order_id.clone()],
                        },
                    ),
                    &mut profile,
                )
                .await?;

            if let Some(failed) = response.results.iter().find(|result| !result.success) {
                return Err(AttemptError::Venue(VenueError::new(format!(
                    "Can not cancel order: {}",
                    failed.failure_reason
                ))));
            }

            let raw = self.order_by_id_attempt(&query.order_id, &mut profile).await?;
            normalize::order(raw).map_err(AttemptError::Venue)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_open_orders(
        &self,
        symbol: Option<Symbol>,
        return_orders: bool,
    ) -> CallOutcome<OpenOrders> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let params = BatchOrdersParams {
            product_id: symbol.as_ref().map(|symbol| SmolStr::new(symbol.name())),
            order_status: Some(SmolStr::new_static("OPEN")),
        };
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let batch: OrdersBatch = self
                .issue(
                    &endpoints::ORDER_LOOKUP,
                    CoinbaseRequest::get(
                        "/api/v3/brokerage/orders/historical/batch",
                        params.clone(),
                    ),
                    &mut profile,
                )
                .await?;

            if !return_orders {
                return Ok(OpenOrders::Count(batch.orders.len() as u32));
            }

            let orders = batch
                .orders
                .into_iter()
                .map(normalize::order)
                .collect::<Result<Vec<_>, _>>()
                .map_err(AttemptError::Venue)?;
            Ok(OpenOrders::Orders(orders))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn latest_price(&self, symbol: Symbol) -> CallOutcome<Decimal> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let path = format!("/api/v3/brokerage/products/{}", symbol.name());
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let product: requests::CoinbaseProduct = self
                .issue(&endpoints::PRODUCTS, CoinbaseRequest::get(path.clone(), NoParams {}), &mut profile)
                .await?;
            normalize::ticker(&product)
                .map_err(AttemptError::Venue)?
                .map(|ticker| ticker.price)
                .ok_or_else(|| AttemptError::Venue(VenueError::new("product carries no price")))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_prices(&self) -> CallOutcome<Vec<TickerPrice>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: ProductsResponse = self
                .issue(
                    &endpoints::PRODUCTS,
                    CoinbaseRequest::get("/api/v3/brokerage/products", NoParams {}),
                    &mut profile,
                )
                .await?;
            let mut prices = Vec::with_capacity(response.products.len());
            for product in &response.products {
                if let Some(ticker) = normalize::ticker(product).map_err(AttemptError::Venue)? {
                    prices.push(ticker);
                }
            }
            Ok(prices)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_candles(
        &self,
        symbol: Symbol,
        interval: CandleInterval,
        range: CandleRange,
    ) -> CallOutcome<Vec<Candle>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let granularity = match normalize::granularity(interval) {
            Ok(granularity) => granularity,
            Err(error) => {
                return seal_outcome(
                    Err(CallError::Rejected(error.message)),
                    self.governor.as_ref(),
                    &self.clock,
                    profile,
                    0,
                );
            }
        };

        let path = format!("/api/v3/brokerage/products/{}/candles", symbol.name());
        let params = CandlesParams {
            start: range.from.map(|ms| ms / 1000),
            end: range.to.map(|ms| ms / 1000),
            granularity: SmolStr::new(granularity),
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: CandlesResponse = self
                .issue(
                    &endpoints::CANDLES,
                    CoinbaseRequest::get(path.clone(), params.clone()),
                    &mut profile,
                )
                .await?;
            let mut candles = response
                .candles
                .iter()
                .map(|raw| normalize::candle(raw, interval))
                .collect::<Result<Vec<_>, _>>()
                .map_err(AttemptError::Venue)?;
            candles.sort_by_key(|candle| candle.open_time);
            if let Some(count) = range.count {
                candles.truncate(count as usize);
            }
            Ok(candles)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_trades(&self, symbol: Symbol, limit: Option<u32>) -> CallOutcome<Vec<Trade>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let path = format!("/api/v3/brokerage/products/{}/ticker", symbol.name());
        let params = TickerParams {
            limit: limit.or(Some(100)),
        };
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: TickerResponse = self
                .issue(
                    &endpoints::TICKER,
                    CoinbaseRequest::get(path.clone(), params.clone()),
                    &mut profile,
                )
                .await?;
            Ok(response.trades.into_iter().map(normalize::trade).collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_exchange_info(&self, symbol: Symbol) -> CallOutcome<Instrument> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let path = format!("/api/v3/brokerage/products/{}", symbol.name());
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let product: requests::CoinbaseProduct = self
                .issue(&endpoints::PRODUCTS, CoinbaseRequest::get(path.clone(), NoParams {}), &mut profile)
                .await?;
            normalize::instrument(product).map_err(AttemptError::Venue)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_exchange_info(&self) -> CallOutcome<Vec<Instrument>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: ProductsResponse = self
                .issue(
                    &endpoints::PRODUCTS,
                    CoinbaseRequest::get("/api/v3/brokerage/products", NoParams {}),
                    &mut profile,
                )
                .await?;
            response
                .products
                .into_iter()
                .map(|product| normalize::instrument(product).map_err(AttemptError::Venue))
                .collect()
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_user_fees(&self, _symbol: Symbol) -> CallOutcome<UserFee> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let summary: TransactionSummary = self
                .issue(
                    &endpoints::TRANSACTION_SUMMARY,
                    CoinbaseRequest::get("/api/v3/brokerage/transaction_summary", NoParams {}),
                    &mut profile,
                )
                .await?;
            Ok(UserFee::new(
                summary.fee_tier.maker_fee_rate,
                summary.fee_tier.taker_fee_rate,
            ))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_user_fees(&self) -> CallOutcome<Vec<PairUserFee>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            // The fee tier is account-wide; one summary prices every pair
            let summary: TransactionSummary = self
                .issue(
                    &endpoints::TRANSACTION_SUMMARY,
                    CoinbaseRequest::get("/api/v3/brokerage/transaction_summary", NoParams {}),
                    &mut profile,
                )
                .await?;
            let fee = UserFee::new(
                summary.fee_tier.maker_fee_rate,
                summary.fee_tier.taker_fee_rate,
            );

            let response: ProductsResponse = self
                .issue(
                    &endpoints::PRODUCTS,
                    CoinbaseRequest::get("/api/v3/brokerage/products", NoParams {}),
                    &mut profile,
                )
                .await?;
            Ok(response
                .products
                .into_iter()
                .map(|product| PairUserFee::new(Symbol::new(product.product_id), fee))
                .collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn change_leverage(&self, _symbol: Symbol, _leverage: u32) -> CallOutcome<()> {
        self.futures_unsupported(TimeProfile::start(self.clock.now_ms()))
    }

    async fn change_margin_type(&self, _symbol: Symbol, _margin: MarginType) -> CallOutcome<()> {
        self.futures_unsupported(TimeProfile::start(self.clock.now_ms()))
    }

    async fn get_hedge(&self) -> CallOutcome<bool> {
        self.futures_unsupported(TimeProfile::start(self.clock.now_ms()))
    }

    async fn set_hedge(&self, _hedge: bool) -> CallOutcome<()> {
        self.futures_unsupported(TimeProfile::start(self.clock.now_ms()))
    }

    async fn get_positions(&self, _symbol: Option<Symbol>) -> CallOutcome<Vec<PositionInfo>> {
        self.futures_unsupported(TimeProfile::start(self.clock.now_ms()))
    }

    async fn leverage_bracket(&self, _symbol: Symbol) -> CallOutcome<Vec<LeverageBracket>> {
        self.futures_unsupported(TimeProfile::start(self.clock.now_ms()))
    }
}
