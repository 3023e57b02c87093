use self::{
    parser::KucoinParser,
    requests::{
        AllTickersEnvelope, BaseFee, ChangeLeverageBody, ChangeMarginModeBody, ClientOidParams,
        CurrencyParams, FuturesAccountOverview, FuturesCandlesParams, FuturesContract,
        FuturesOrder, FuturesPosition, FuturesTicker, KucoinHttpResponse, KucoinRequest,
        Level1Ticker, OpenOrdersParams, OrderAck, Paginated, PlaceOrderBody, RawFuturesCandle,
        RawSpotCandle, RiskLimitLevel, SpotCandlesParams, SpotOrder, SpotSymbol, SpotTradeHistory,
        SymbolFee, SymbolParams, SymbolsFeeParams, UserInfo,
    },
    signer::{KucoinRequestSigner, KucoinSigner, encrypt_passphrase},
};
use super::{Connector, acquire_slot, lookup_until_visible, seal_outcome};
use crate::{
    CallOutcome,
    config::ProviderConfig,
    error::{CallError, VenueError},
    governor::{Endpoint, kucoin::KucoinGovernor, registry},
    model::{
        balance::FreeAsset,
        fee::{PairUserFee, UserFee},
        market::{Candle, CandleRange, TickerPrice, Trade},
        order::{CanonicalOrder, OpenOrderRequest, OpenOrders, OrderIdQuery, OrderQuery},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
    retry::{AttemptError, kucoin::KucoinRetryPolicy, with_retry},
};
use hmac::Mac;
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use smol_str::SmolStr;
use std::{sync::Arc, time::Duration};
use tradegate_instrument::{
    FuturesMode, OrderType, Side, instrument::Instrument, interval::CandleInterval, symbol::Symbol,
    venue::VenueId,
};
use tradegate_integration::{
    clock::{SharedClock, system_clock},
    profile::TimeProfile,
    protocol::http::{private::encoder::Base64Encoder, rest::{NoParams, client::RestClient}},
};

mod parser;
mod requests;
mod signer;

pub mod normalize;

const HTTP_BASE_URL_SPOT: &str = "https://api.kucoin.com";
const HTTP_BASE_URL_FUTURES: &str = "https://api-futures.kucoin.com";

const SUCCESS_CODE: &str = "200000";

mod endpoints {
    use super::Endpoint;

    // Endpoint names carry the governor category prefix
    pub const ACCOUNTS: Endpoint = Endpoint::request("management/accounts", 5);
    pub const ACCOUNT_OVERVIEW: Endpoint = Endpoint::request("futures/account-overview", 5);
    pub const USER_INFO: Endpoint = Endpoint::request("management/user-info", 4);
    pub const SPOT_ORDER: Endpoint = Endpoint::order("spot/orders", 2);
    pub const SPOT_ORDER_LOOKUP: Endpoint = Endpoint::request("spot/order-lookup", 2);
    pub const FUTURES_ORDER: Endpoint = Endpoint::order("futures/orders", 2);
    pub const FUTURES_ORDER_LOOKUP: Endpoint = Endpoint::request("futures/order-lookup", 5);
    pub const MARKET: Endpoint = Endpoint::request("public/market", 3);
    pub const CANDLES: Endpoint = Endpoint::request("public/candles", 3);
    pub const SYMBOLS: Endpoint = Endpoint::request("public/symbols", 4);
    pub const FEES: Endpoint = Endpoint::request("spot/trade-fees", 3);
    pub const FUTURES_FEES: Endpoint = Endpoint::request("futures/contract-fees", 3);
    pub const POSITIONS: Endpoint = Endpoint::request("futures/positions", 5);
    pub const LEVERAGE: Endpoint = Endpoint::request("futures/leverage", 5);
    pub const MARGIN_MODE: Endpoint = Endpoint::request("futures/margin-mode", 5);
    pub const RISK_LIMIT: Endpoint = Endpoint::request("public/risk-limit", 5);
}

type KucoinRestClient = RestClient<'static, KucoinRequestSigner, KucoinParser>;

/// KuCoin connector. Spot and futures live on different hosts with the same
/// signing scheme; the user/account surface stays on the spot host for both
/// modes.
#[derive(Debug)]
pub struct KucoinConnector {
    venue: VenueId,
    futures: FuturesMode,
    rest: Option<KucoinRestClient>,
    spot_rest: Option<KucoinRestClient>,
    governor: Arc<KucoinGovernor>,
    policy: KucoinRetryPolicy,
    clock: SharedClock,
    timeout: Duration,
}

impl KucoinConnector {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_parts(config, registry::kucoin(), system_clock())
    }

    pub fn with_parts(
        config: ProviderConfig,
        governor: Arc<KucoinGovernor>,
        clock: SharedClock,
    ) -> Self {
        let venue = if config.futures.is_futures() {
            VenueId::KucoinFutures
        } else {
            VenueId::KucoinSpot
        };

        let mode_url = config.host.clone().unwrap_or_else(|| {
            if config.futures.is_futures() {
                HTTP_BASE_URL_FUTURES
            } else {
                HTTP_BASE_URL_SPOT
            }
            .to_string()
        });

        let rest_client = |base: String| {
            config.credentials.as_ref().map(|credentials| {
                let hmac = hmac::Hmac::new_from_slice(credentials.secret.as_bytes())
                    .expect("ApiCredentials secret invalid length");
                let passphrase = config.passphrase.clone().unwrap_or_default();
                RestClient::new(
                    base,
                    KucoinRequestSigner::new(
                        KucoinSigner::new(
                            credentials.key.clone(),
                            encrypt_passphrase(&credentials.secret, &passphrase),
                        ),
                        hmac,
                        Base64Encoder,
                    ),
                    KucoinParser,
                )
            })
        };

        Self {
            venue,
            futures: config.futures,
            rest: rest_client(mode_url),
            spot_rest: rest_client(HTTP_BASE_URL_SPOT.to_string()),
            governor,
            policy: KucoinRetryPolicy::new(config.retry),
            clock,
            timeout: config.timeout,
        }
    }

    fn is_futures(&self) -> bool {
        self.futures.is_futures()
    }

    fn is_inverse(&self) -> bool {
        matches!(self.futures, FuturesMode::Coinm)
    }

    fn require_futures(&self) -> Result<(), CallError> {
        if self.is_futures() {
            Ok(())
        } else {
            Err(CallError::FuturesModeMissing)
        }
    }

    fn native_symbol(&self, symbol: &Symbol) -> SmolStr {
        if self.is_futures() {
            SmolStr::new(normalize::encode_futures_symbol(symbol).name())
        } else {
            SmolStr::new(symbol.name())
        }
    }

    fn decode_symbol(&self, native: &str) -> Symbol {
        if self.is_futures() {
            normalize::decode_futures_symbol(native)
        } else {
            Symbol::new(native)
        }
    }

    async fn issue_on<Params, Data>(
        rest: &Option<KucoinRestClient>,
        governor: &Arc<KucoinGovernor>,
        endpoint: &Endpoint,
        request: KucoinRequest<Params, Data>,
        clock: &SharedClock,
        timeout: Duration,
        profile: &mut TimeProfile,
    ) -> Result<Data, AttemptError>
    where
        Params: Serialize + Send + Sync,
        Data: DeserializeOwned + Send + Sync,
    {
        let rest = rest
            .as_ref()
            .ok_or(CallError::ClientMissing("KuCoin"))?;

        acquire_slot(governor.as_ref(), endpoint, clock, timeout, profile).await?;

        let (response, _meta): (KucoinHttpResponse<Data>, _) = rest
            .execute(request, profile)
            .await
            .map_err(AttemptError::Venue)?;

        if response.code != SUCCESS_CODE {
            return Err(AttemptError::Venue(VenueError {
                code: response.code.parse().ok(),
                status: None,
                message: response.msg.unwrap_or_else(|| response.code.to_string()),
                created_order_id: None,
            }));
        }

        response.data.ok_or_else(|| {
            AttemptError::Venue(VenueError::new("success envelope carried no data"))
        })
    }

    async fn issue<Params, Data>(
        &self,
        endpoint: &Endpoint,
        request: KucoinRequest<Params, Data>,
        profile: &mut TimeProfile,
    ) -> Result<Data, AttemptError>
    where
        Params: Serialize + Send + Sync,
        Data: DeserializeOwned + Send + Sync,
    {
        Self::issue_on(
            &self.rest,
            &self.governor,
            endpoint,
            request,
            &self.clock,
            self.timeout,
            profile,
        )
        .await
    }

    async fn issue_spot_host<Params, Data>(
        &self,
        endpoint: &Endpoint,
        request: KucoinRequest<Params, Data>,
        profile: &mut TimeProfile,
    ) -> Result<Data, AttemptError>
    where
        Params: Serialize + Send + Sync,
        Data: DeserializeOwned + Send + Sync,
    {
        Self::issue_on(
            &self.spot_rest,
            &self.governor,
            endpoint,
            request,
            &self.clock,
            self.timeout,
            profile,
        )
        .await
    }

    async fn query_order_attempt(
        &self,
        client_order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<CanonicalOrder, AttemptError> {
        if self.is_futures() {
            let raw: FuturesOrder = self
                .issue(
                    &endpoints::FUTURES_ORDER_LOOKUP,
                    KucoinRequest::get(
                        "/api/v1/orders/byClientOid",
                        ClientOidParams {
                            client_oid: client_order_id.clone(),
                        },
                    ),
                    profile,
                )
                .await?;
            normalize::futures_order(raw, self.is_inverse()).map_err(AttemptError::Venue)
        } else {
            let raw: SpotOrder = self
                .issue(
                    &endpoints::SPOT_ORDER_LOOKUP,
                    KucoinRequest::get(
                        format!("/api/v1/order/client-order/{client_order_id}"),
                        NoParams {},
                    ),
                    profile,
                )
                .await?;
            normalize::spot_order(raw).map_err(AttemptError::Venue)
        }
    }

    /// Post-create/cancel authoritative read; the venue's order read path
    /// lags writes by up to seconds.
    async fn confirm_order(
        &self,
        client_order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<CanonicalOrder, CallError> {
        lookup_until_visible(
            async || self.query_order_attempt(client_order_id, profile).await,
            |error: &AttemptError| {
                error.as_venue().is_some_and(|venue| {
                    venue.message_contains("order not exist")
                        || venue.message_contains("order does not exist")
                        || venue.code == Some(400100)
                })
            },
        )
        .await
        .map_err(AttemptError::into_call_error)
    }
}

impl Connector for KucoinConnector {
    fn venue(&self) -> VenueId {
        self.venue
    }

    async fn get_balance(&self) -> CallOutcome<Vec<FreeAsset>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let overview: FuturesAccountOverview = self
                    .issue(
                        &endpoints::ACCOUNT_OVERVIEW,
                        KucoinRequest::get(
                            "/api/v1/account-overview",
                            CurrencyParams {
                                currency: SmolStr::new_static(if self.is_inverse() {
                                    "XBT"
                                } else {
                                    "USDT"
                                }),
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                let locked = overview.order_margin + overview.position_margin + overview.frozen_funds;
                Ok(vec![FreeAsset::new(
                    overview.currency,
                    overview.available_balance,
                    locked,
                )])
            } else {
                let accounts: Vec<requests::SpotAccount> = self
                    .issue(
                        &endpoints::ACCOUNTS,
                        KucoinRequest::get("/api/v1/accounts", NoParams {}),
                        &mut profile,
                    )
                    .await?;
                Ok(accounts
                    .into_iter()
                    .filter(|account| account.kind == "trade")
                    .map(|account| FreeAsset::new(account.currency, account.available, account.holds))
                    .collect())
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_api_permission(&self) -> CallOutcome<bool> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            // No dedicated permission surface: a successful signed account
            // read proves the key is live and readable.
            if self.is_futures() {
                self.issue::<_, FuturesAccountOverview>(
                    &endpoints::ACCOUNT_OVERVIEW,
                    KucoinRequest::get(
                        "/api/v1/account-overview",
                        CurrencyParams {
                            currency: SmolStr::new_static("USDT"),
                        },
                    ),
                    &mut profile,
                )
                .await?;
            } else {
                self.issue::<_, Vec<requests::SpotAccount>>(
                    &endpoints::ACCOUNTS,
                    KucoinRequest::get("/api/v1/accounts", NoParams {}),
                    &mut profile,
                )
                .await?;
            }
            Ok(true)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_uid(&self) -> CallOutcome<SmolStr> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let info: UserInfo = self
                .issue_spot_host(
                    &endpoints::USER_INFO,
                    KucoinRequest::get("/api/v2/user-info", NoParams {}),
                    &mut profile,
                )
                .await?;
            match info.uid {
                serde_json::Value::String(uid) => Ok(SmolStr::new(uid)),
                serde_json::Value::Number(uid) => Ok(smol_str::format_smolstr!("{uid}")),
                other => Err(AttemptError::Venue(VenueError::new(format!(
                    "unexpected uid shape: {other}"
                )))),
            }
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
        let body = PlaceOrderBody {
            client_oid: client_order_id.clone(),
            side: SmolStr::new_static(match request.side {
                Side::Buy => "buy",
                Side::Sell => "sell",
            }),
            symbol: self.native_symbol(&request.symbol),
            kind: SmolStr::new_static(match request.order_type {
                OrderType::Limit => "limit",
                OrderType::Market => "market",
            }),
            price: request.price,
            size: request.quantity,
            leverage: self.is_futures().then(|| SmolStr::new_static("1")),
            reduce_only: request.reduce_only.filter(|_| self.is_futures()),
        };

        let endpoint = if self.is_futures() {
            &endpoints::FUTURES_ORDER
        } else {
            &endpoints::SPOT_ORDER
        };

        let (submitted, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, OrderAck>(
                endpoint,
                KucoinRequest::post("/api/v1/orders", body.clone()),
                &mut profile,
            )
            .await
        })
        .await;

        let result = match submitted {
            Ok(_) => self.confirm_order(&client_order_id, &mut profile).await,
            Err(error) => Err(error),
        };

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.query_order_attempt(&query.client_order_id, &mut profile).await
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn cancel_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (cancelled, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                self.issue::<_, serde_json::Value>(
                    &endpoints::FUTURES_ORDER,
                    KucoinRequest::delete(
                        "/api/v1/orders/byClientOid",
                        ClientOidParams {
                            client_oid: query.client_order_id.clone(),
                        },
                    ),
                    &mut profile,
                )
                .await
            } else {
                self.issue::<_, serde_json::Value>(
                    &endpoints::SPOT_ORDER,
                    KucoinRequest::delete(
                        format!("/api/v1/order/client-order/{}", query.client_order_id),
                        NoParams {},
                    ),
                    &mut profile,
                )
                .await
            }
        })
        .await;

        let result = match cancelled {
            Ok(_) => self.confirm_order(&query.client_order_id, &mut profile).await,
            Err(error) => Err(error),
        };

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn cancel_order_by_order_id(&self, query: OrderIdQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let endpoint = if self.is_futures() {
            &endpoints::FUTURES_ORDER
        } else {
            &endpoints::SPOT_ORDER
        };
        let lookup_endpoint = if self.is_futures() {
            &endpoints::FUTURES_ORDER_LOOKUP
        } else {
            &endpoints::SPOT_ORDER_LOOKUP
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, serde_json::Value>(
                endpoint,
                KucoinRequest::delete(format!("/api/v1/orders/{}", query.order_id), NoParams {}),
                &mut profile,
            )
            .await?;

            if self.is_futures() {
                let raw: FuturesOrder = self
                    .issue(
                        lookup_endpoint,
                        KucoinRequest::get(format!("/api/v1/orders/{}", query.order_id), NoParams {}),
                        &mut profile,
                    )
                    .await?;
                normalize::futures_order(raw, self.is_inverse()).map_err(AttemptError::Venue)
            } else {
                let raw: SpotOrder = self
                    .issue(
                        lookup_endpoint,
                        KucoinRequest::get(format!("/api/v1/orders/{}", query.order_id), NoParams {}),
                        &mut profile,
                    )
                    .await?;
                normalize::spot_order(raw).map_err(AttemptError::Venue)
            }
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

        let params = OpenOrdersParams {
            status: SmolStr::new_static("active"),
            symbol: symbol.as_ref().map(|symbol| self.native_symbol(symbol)),
        };
        let lookup_endpoint = if self.is_futures() {
            &endpoints::FUTURES_ORDER_LOOKUP
        } else {
            &endpoints::SPOT_ORDER_LOOKUP
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let page: Paginated<FuturesOrder> = self
                    .issue(
                        lookup_endpoint,
                        KucoinRequest::get("/api/v1/orders", params.clone()),
                        &mut profile,
                    )
                    .await?;
                if !return_orders {
                    return Ok(OpenOrders::Count(page.items.len() as u32));
                }
                let orders = page
                    .items
                    .into_iter()
                    .map(|raw| normalize::futures_order(raw, self.is_inverse()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(AttemptError::Venue)?;
                Ok(OpenOrders::Orders(orders))
            } else {
                let page: Paginated<SpotOrder> = self
                    .issue(
                        lookup_endpoint,
                        KucoinRequest::get("/api/v1/orders", params.clone()),
                        &mut profile,
                    )
                    .await?;
                if !return_orders {
                    return Ok(OpenOrders::Count(page.items.len() as u32));
                }
                let orders = page
                    .items
                    .into_iter()
                    .map(normalize::spot_order)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(AttemptError::Venue)?;
                Ok(OpenOrders::Orders(orders))
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn latest_price(&self, symbol: Symbol) -> CallOutcome<Decimal> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let native = self.native_symbol(&symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let ticker: FuturesTicker = self
                    .issue(
                        &endpoints::MARKET,
                        KucoinRequest::get("/api/v1/ticker", SymbolParams { symbol: native.clone() }),
                        &mut profile,
                    )
                    .await?;
                Ok(ticker.price)
            } else {
                let ticker: Level1Ticker = self
                    .issue(
                        &endpoints::MARKET,
                        KucoinRequest::get(
                            "/api/v1/market/orderbook/level1",
                            SymbolParams { symbol: native.clone() },
                        ),
                        &mut profile,
                    )
                    .await?;
                Ok(ticker.price)
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_prices(&self) -> CallOutcome<Vec<TickerPrice>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let envelope: AllTickersEnvelope = self
                .issue(
                    &endpoints::MARKET,
                    KucoinRequest::get("/api/v1/market/allTickers", NoParams {}),
                    &mut profile,
                )
                .await?;
            Ok(envelope
                .ticker
                .into_iter()
                .filter_map(|entry| {
                    let price = entry.last?;
                    Some(TickerPrice::new(self.decode_symbol(&entry.symbol), price))
                })
                .collect())
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

        let native = self.native_symbol(&symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let mut candles = if self.is_futures() {
                let rows: Vec<RawFuturesCandle> = self
                    .issue(
                        &endpoints::CANDLES,
                        KucoinRequest::get(
                            "/api/v1/kline/query",
                            FuturesCandlesParams {
                                symbol: native.clone(),
                                granularity: normalize::futures_granularity(interval),
                                from: range.from,
                                to: range.to,
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                rows.iter()
                    .map(|row| normalize::futures_candle(row, interval))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(AttemptError::Venue)?
            } else {
                let rows: Vec<RawSpotCandle> = self
                    .issue(
                        &endpoints::CANDLES,
                        KucoinRequest::get(
                            "/api/v1/market/candles",
                            SpotCandlesParams {
                                symbol: native.clone(),
                                interval: SmolStr::new(normalize::spot_interval(interval)),
                                // Spot candle bounds are in seconds
                                start_at: range.from.map(|ms| ms / 1000),
                                end_at: range.to.map(|ms| ms / 1000),
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                rows.iter()
                    .map(|row| normalize::spot_candle(row, interval))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(AttemptError::Venue)?
            };

            candles.sort_by_key(|candle| candle.open_time);
            if let Some(count) = range.count {
                candles.truncate(count as usize);
            }
            Ok(candles)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_trades(&self, symbol: Symbol, _limit: Option<u32>) -> CallOutcome<Vec<Trade>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let native = self.native_symbol(&symbol);
        let path = if self.is_futures() {
            "/api/v1/trade/history"
        } else {
            "/api/v1/market/histories"
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let trades: Vec<SpotTradeHistory> = self
                .issue(
                    &endpoints::MARKET,
                    KucoinRequest::get(path, SymbolParams { symbol: native.clone() }),
                    &mut profile,
                )
                .await?;
            Ok(trades.into_iter().map(normalize::trade).collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_exchange_info(&self, symbol: Symbol) -> CallOutcome<Instrument> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let native = self.native_symbol(&symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let contract: FuturesContract = self
                    .issue(
                        &endpoints::SYMBOLS,
                        KucoinRequest::get(format!("/api/v1/contracts/{native}"), NoParams {}),
                        &mut profile,
                    )
                    .await?;
                Ok(normalize::futures_instrument(contract))
            } else {
                let entry: SpotSymbol = self
                    .issue(
                        &endpoints::SYMBOLS,
                        KucoinRequest::get(format!("/api/v2/symbols/{native}"), NoParams {}),
                        &mut profile,
                    )
                    .await?;
                Ok(normalize::spot_instrument(entry))
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_exchange_info(&self) -> CallOutcome<Vec<Instrument>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let contracts: Vec<FuturesContract> = self
                    .issue(
                        &endpoints::SYMBOLS,
                        KucoinRequest::get("/api/v1/contracts/active", NoParams {}),
                        &mut profile,
                    )
                    .await?;
                Ok(contracts
                    .into_iter()
                    .map(normalize::futures_instrument)
                    .collect())
            } else {
                let symbols: Vec<SpotSymbol> = self
                    .issue(
                        &endpoints::SYMBOLS,
                        KucoinRequest::get("/api/v2/symbols", NoParams {}),
                        &mut profile,
                    )
                    .await?;
                Ok(symbols.into_iter().map(normalize::spot_instrument).collect())
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_user_fees(&self, symbol: Symbol) -> CallOutcome<UserFee> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let native = self.native_symbol(&symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let contract: FuturesContract = self
                    .issue(
                        &endpoints::FUTURES_FEES,
                        KucoinRequest::get(format!("/api/v1/contracts/{native}"), NoParams {}),
                        &mut profile,
                    )
                    .await?;
                match (contract.maker_fee_rate, contract.taker_fee_rate) {
                    (Some(maker), Some(taker)) => Ok(UserFee::new(maker, taker)),
                    _ => Err(AttemptError::Venue(VenueError::new(
                        "contract carried no fee rates",
                    ))),
                }
            } else {
                let fees: Vec<SymbolFee> = self
                    .issue(
                        &endpoints::FEES,
                        KucoinRequest::get(
                            "/api/v1/trade-fees",
                            SymbolsFeeParams {
                                symbols: native.clone(),
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                fees.into_iter()
                    .next()
                    .map(|fee| UserFee::new(fee.maker_fee_rate, fee.taker_fee_rate))
                    .ok_or_else(|| AttemptError::Venue(VenueError::new("empty trade-fees response")))
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_user_fees(&self) -> CallOutcome<Vec<PairUserFee>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let contracts: Vec<FuturesContract> = self
                    .issue(
                        &endpoints::SYMBOLS,
                        KucoinRequest::get("/api/v1/contracts/active", NoParams {}),
                        &mut profile,
                    )
                    .await?;
                Ok(contracts
                    .into_iter()
                    .filter_map(|contract| {
                        let fee = UserFee::new(contract.maker_fee_rate?, contract.taker_fee_rate?);
                        Some(PairUserFee::new(
                            normalize::decode_futures_symbol(&contract.symbol),
                            fee,
                        ))
                    })
                    .collect())
            } else {
                // The base fee applies to every pair outside promo tiers
                let base: BaseFee = self
                    .issue(
                        &endpoints::FEES,
                        KucoinRequest::get("/api/v1/base-fee", NoParams {}),
                        &mut profile,
                    )
                    .await?;
                let symbols: Vec<SpotSymbol> = self
                    .issue(
                        &endpoints::SYMBOLS,
                        KucoinRequest::get("/api/v2/symbols", NoParams {}),
                        &mut profile,
                    )
                    .await?;
                Ok(symbols
                    .into_iter()
                    .map(|entry| {
                        PairUserFee::new(
                            Symbol::new(entry.symbol),
                            UserFee::new(base.maker_fee_rate, base.taker_fee_rate),
                        )
                    })
                    .collect())
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn change_leverage(&self, symbol: Symbol, leverage: u32) -> CallOutcome<()> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let body = ChangeLeverageBody {
            symbol: self.native_symbol(&symbol),
            leverage: smol_str::format_smolstr!("{leverage}"),
        };
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, serde_json::Value>(
                &endpoints::LEVERAGE,
                KucoinRequest::post("/api/v2/changeCrossUserLeverage", body.clone()),
                &mut profile,
            )
            .await?;
            Ok(())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn change_margin_type(&self, symbol: Symbol, margin: MarginType) -> CallOutcome<()> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let body = ChangeMarginModeBody {
            symbol: self.native_symbol(&symbol),
            margin_mode: SmolStr::new_static(match margin {
                MarginType::Isolated => "ISOLATED",
                MarginType::Crossed => "CROSS",
            }),
        };
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, serde_json::Value>(
                &endpoints::MARGIN_MODE,
                KucoinRequest::post("/api/v2/position/changeMarginMode", body.clone()),
                &mut profile,
            )
            .await?;
            Ok(())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_hedge(&self) -> CallOutcome<bool> {
        let profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        // Positions on this venue are one-way only
        seal_outcome(Ok(false), self.governor.as_ref(), &self.clock, profile, 0)
    }

    async fn set_hedge(&self, hedge: bool) -> CallOutcome<()> {
        let profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let result = if hedge {
            Err(CallError::Rejected(
                "hedge mode is not supported on this venue".to_string(),
            ))
        } else {
            Ok(())
        };
        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, 0)
    }

    async fn get_positions(&self, symbol: Option<Symbol>) -> CallOutcome<Vec<PositionInfo>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let native = symbol.as_ref().map(|symbol| self.native_symbol(symbol));
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let positions: Vec<FuturesPosition> = self
                .issue(
                    &endpoints::POSITIONS,
                    KucoinRequest::get("/api/v1/positions", NoParams {}),
                    &mut profile,
                )
                .await?;
            Ok(positions
                .into_iter()
                .filter(|position| {
                    native
                        .as_ref()
                        .is_none_or(|native| position.symbol == *native)
                })
                .map(normalize::position)
                .collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn leverage_bracket(&self, symbol: Symbol) -> CallOutcome<Vec<LeverageBracket>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let native = self.native_symbol(&symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let levels: Vec<RiskLimitLevel> = self
                .issue(
                    &endpoints::RISK_LIMIT,
                    KucoinRequest::get(format!("/api/v1/contracts/risk-limit/{native}"), NoParams {}),
                    &mut profile,
                )
                .await?;
            Ok(levels.into_iter().map(normalize::bracket).collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }
}
