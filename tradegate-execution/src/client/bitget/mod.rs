use self::{
    parser::BitgetParser,
    requests::{
        AccountInfo, BitgetHttpResponse, BitgetOrder, BitgetRequest, CandlesParams, FillEntry,
        MixAccount, MixContract, MixParams, MixPlaceOrderBody, MixPosition, OrderAck,
        OrderLookupParams, PendingOrders, PositionTier, RawBitgetCandle, SetLeverageBody,
        SetMarginModeBody, SetPositionModeBody, SpotAsset, SpotPlaceOrderBody, SpotSymbol,
        SpotSymbolParams, TickerEntry, TradeRate, TradeRateParams,
    },
    signer::{BitgetRequestSigner, BitgetSigner},
};
use super::{Connector, acquire_slot, lookup_until_visible, seal_outcome};
use crate::{
    CallOutcome,
    config::{ProviderConfig, bitget_demo_from_env},
    error::{CallError, VenueError},
    governor::{Endpoint, bitget::BitgetGovernor, registry},
    model::{
        balance::FreeAsset,
        fee::{PairUserFee, UserFee},
        market::{Candle, CandleRange, TickerPrice, Trade},
        order::{CanonicalOrder, OpenOrderRequest, OpenOrders, OrderIdQuery, OrderQuery},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
    retry::{AttemptError, bitget::BitgetRetryPolicy, with_retry},
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

const HTTP_BASE_URL: &str = "https://api.bitget.com";

const SUCCESS_CODE: &str = "00000";

mod endpoints {
    use super::Endpoint;

    // `weight` carries each endpoint's nominal per-second cap
    pub const ASSETS: Endpoint = Endpoint::request("spot/account/assets", 10);
    pub const MIX_ACCOUNTS: Endpoint = Endpoint::request("mix/account/accounts", 10);
    pub const ACCOUNT_INFO: Endpoint = Endpoint::request("spot/account/info", 10);
    pub const TRADE_RATE: Endpoint = Endpoint::request("common/trade-rate", 10);
    pub const SPOT_PLACE: Endpoint = Endpoint::order("spot/trade/place-order", 10);
    pub const SPOT_CANCEL: Endpoint = Endpoint::order("spot/trade/cancel-order", 10);
    pub const SPOT_ORDER_INFO: Endpoint = Endpoint::request("spot/trade/orderInfo", 20);
    pub const SPOT_UNFILLED: Endpoint = Endpoint::request("spot/trade/unfilled-orders", 20);
    pub const MIX_PLACE: Endpoint = Endpoint::order("mix/order/place-order", 10);
    pub const MIX_CANCEL: Endpoint = Endpoint::order("mix/order/cancel-order", 10);
    pub const MIX_DETAIL: Endpoint = Endpoint::request("mix/order/detail", 20);
    pub const MIX_PENDING: Endpoint = Endpoint::request("mix/order/orders-pending", 20);
    pub const TICKERS: Endpoint = Endpoint::request("market/tickers", 20);
    pub const CANDLES: Endpoint = Endpoint::request("market/candles", 20);
    pub const FILLS: Endpoint = Endpoint::request("market/fills", 10);
    pub const SYMBOLS: Endpoint = Endpoint::request("public/symbols", 20);
    pub const CONTRACTS: Endpoint = Endpoint::request("mix/market/contracts", 20);
    pub const POSITIONS: Endpoint = Endpoint::request("mix/position/all-position", 10);
    pub const SET_LEVERAGE: Endpoint = Endpoint::request("mix/account/set-leverage", 5);
    pub const SET_MARGIN_MODE: Endpoint = Endpoint::request("mix/account/set-margin-mode", 5);
    pub const SET_POSITION_MODE: Endpoint = Endpoint::request("mix/account/set-position-mode", 5);
    pub const POSITION_TIERS: Endpoint = Endpoint::request("mix/market/query-position-lever", 10);
}

type BitgetRestClient = RestClient<'static, BitgetRequestSigner, BitgetParser>;

/// Bitget V2 connector, forking between the spot and mix surfaces on the
/// constructor-provided futures mode. Demo instances route to the
/// `S`-prefixed product families.
#[derive(Debug)]
pub struct BitgetConnector {
    venue: VenueId,
    futures: FuturesMode,
    demo: bool,
    rest: Option<BitgetRestClient>,
    governor: Arc<BitgetGovernor>,
    policy: BitgetRetryPolicy,
    clock: SharedClock,
    timeout: Duration,
}

impl BitgetConnector {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_parts(config, registry::bitget(), system_clock())
    }

    pub fn with_parts(
        config: ProviderConfig,
        governor: Arc<BitgetGovernor>,
        clock: SharedClock,
    ) -> Self {
        let venue = if config.futures.is_futures() {
            VenueId::BitgetFutures
        } else {
            VenueId::BitgetSpot
        };
        let demo = config.demo || bitget_demo_from_env();

        let base_url = config
            .host
            .clone()
            .unwrap_or_else(|| HTTP_BASE_URL.to_string());

        let rest = config.credentials.as_ref().map(|credentials| {
            let hmac = hmac::Hmac::new_from_slice(credentials.secret.as_bytes())
                .expect("ApiCredentials secret invalid length");
            RestClient::new(
                base_url,
                BitgetRequestSigner::new(
                    BitgetSigner::new(
                        credentials.key.clone(),
                        config.passphrase.clone().unwrap_or_default(),
                        demo,
                    ),
                    hmac,
                    Base64Encoder,
                ),
                BitgetParser,
            )
        });

        Self {
            venue,
            futures: config.futures,
            demo,
            rest,
            governor,
            policy: BitgetRetryPolicy::new(config.retry),
            clock,
            timeout: config.timeout,
        }
    }

    fn is_futures(&self) -> bool {
        self.futures.is_futures()
    }

    fn require_futures(&self) -> Result<(), CallError> {
        if self.is_futures() {
            Ok(())
        } else {
            Err(CallError::FuturesModeMissing)
        }
    }

    /// Product family of the instance itself (symbol-independent queries).
    fn mode_product_type(&self) -> SmolStr {
        SmolStr::new_static(match (self.futures, self.demo) {
            (FuturesMode::Coinm, false) => "COIN-FUTURES",
            (FuturesMode::Coinm, true) => "SCOIN-FUTURES",
            (_, false) => "USDT-FUTURES",
            (_, true) => "SUSDT-FUTURES",
        })
    }

    fn product_type(&self, symbol: &Symbol) -> SmolStr {
        SmolStr::new_static(normalize::product_type(symbol, self.demo))
    }

    fn margin_coin(&self, symbol: &Symbol) -> SmolStr {
        SmolStr::new_static(normalize::margin_coin(symbol, self.demo))
    }

    async fn issue<Params, Data>(
        &self,
        endpoint: &Endpoint,
        request: BitgetRequest<Params, Data>,
        profile: &mut TimeProfile,
    ) -> Result<Data, AttemptError>
    where
        Params: Serialize + Send + Sync,
        Data: DeserializeOwned + Send + Sync,
    {
        let rest = self
            .rest
            .as_ref()
            .ok_or(CallError::ClientMissing("Bitget"))?;

        acquire_slot(self.governor.as_ref(), endpoint, &self.clock, self.timeout, profile).await?;

        let (response, _meta): (BitgetHttpResponse<Data>, _) = rest
            .execute(request, profile)
            .await
            .map_err(AttemptError::Venue)?;

        if response.code != SUCCESS_CODE {
            return Err(AttemptError::Venue(VenueError {
                code: response.code.parse().ok(),
                status: None,
                message: if response.msg.is_empty() {
                    response.code.to_string()
                } else {
                    response.msg
                },
                created_order_id: None,
            }));
        }

        response.data.ok_or_else(|| {
            AttemptError::Venue(VenueError::new("success envelope carried no data"))
        })
    }

    async fn query_order_attempt(
        &self,
        symbol: &Symbol,
        client_order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<BitgetOrder, AttemptError> {
        if self.is_futures() {
            self.issue(
                &endpoints::MIX_DETAIL,
                BitgetRequest::get(
                    "/api/v2/mix/order/detail",
                    OrderLookupParams {
                        symbol: Some(SmolStr::new(symbol.name())),
                        product_type: Some(self.product_type(symbol)),
                        client_oid: Some(client_order_id.clone()),
                        order_id: None,
                    },
                ),
                profile,
            )
            .await
        } else {
            let orders: Vec<BitgetOrder> = self
                .issue(
                    &endpoints::SPOT_ORDER_INFO,
                    BitgetRequest::get(
                        "/api/v2/spot/trade/orderInfo",
                        OrderLookupParams {
                            symbol: None,
                            product_type: None,
                            client_oid: Some(client_order_id.clone()),
                            order_id: None,
                        },
                    ),
                    profile,
                )
                .await?;
            orders
                .into_iter()
                .next()
                .ok_or_else(|| AttemptError::Venue(VenueError::new("The order cannot be found")))
        }
    }

    /// The venue's read path lags writes: "The order cannot be found" right
    /// after create/cancel is eventual consistency, not rejection.
    async fn confirm_order(
        &self,
        symbol: &Symbol,
        client_order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<CanonicalOrder, CallError> {
        let raw = lookup_until_visible(
            async || self.query_order_attempt(symbol, client_order_id, profile).await,
            |error: &AttemptError| {
                error.as_venue().is_some_and(|venue| {
                    venue.message_contains("order cannot be found")
                        || venue.message_contains("order does not exist")
                        || venue.code == Some(43001)
                })
            },
        )
        .await
        .map_err(AttemptError::into_call_error)?;

        normalize::order(raw).map_err(|error| CallError::Rejected(error.message))
    }
}

impl Connector for BitgetConnector {
    fn venue(&self) -> VenueId {
        self.venue
    }

    async fn get_balance(&self) -> CallOutcome<Vec<FreeAsset>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let accounts: Vec<MixAccount> = self
                    .issue(
                        &endpoints::MIX_ACCOUNTS,
                        BitgetRequest::get(
                            "/api/v2/mix/account/accounts",
                            MixParams {
                                product_type: self.mode_product_type(),
                                symbol: None,
                                margin_coin: None,
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                Ok(accounts
                    .into_iter()
                    .map(|account| {
                        FreeAsset::new(account.margin_coin, account.available, account.locked)
                    })
                    .collect())
            } else {
                let assets: Vec<SpotAsset> = self
                    .issue(
                        &endpoints::ASSETS,
                        BitgetRequest::get("/api/v2/spot/account/assets", NoParams {}),
                        &mut profile,
                    )
                    .await?;
                Ok(assets
                    .into_iter()
                    .map(|asset| {
                        FreeAsset::new(asset.coin, asset.available, asset.frozen + asset.locked)
                    })
                    .collect())
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_api_permission(&self) -> CallOutcome<bool> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let info: AccountInfo = self
                .issue(
                    &endpoints::ACCOUNT_INFO,
                    BitgetRequest::get("/api/v2/spot/account/info", NoParams {}),
                    &mut profile,
                )
                .await?;
            Ok(info.authorities.iter().any(|authority| authority == "trade")
                || info.authorities.is_empty())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_uid(&self) -> CallOutcome<SmolStr> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let info: AccountInfo = self
                .issue(
                    &endpoints::ACCOUNT_INFO,
                    BitgetRequest::get("/api/v2/spot/account/info", NoParams {}),
                    &mut profile,
                )
                .await?;
            Ok(info.user_id)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_affiliate(&self, uid: &str) -> CallOutcome<bool> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            // The referral channel code is surfaced on the account itself
            let info: AccountInfo = self
                .issue(
                    &endpoints::ACCOUNT_INFO,
                    BitgetRequest::get("/api/v2/spot/account/info", NoParams {}),
                    &mut profile,
                )
                .await?;
            Ok(info.channel_code == uid)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn open_order(&self, request: OpenOrderRequest) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let client_order_id = request.client_order_id_or_random();
        let symbol = request.symbol.clone();

        let (submitted, attempts) = if self.is_futures() {
            let body = MixPlaceOrderBody {
                symbol: SmolStr::new(symbol.name()),
                product_type: self.product_type(&symbol),
                margin_mode: SmolStr::new_static("crossed"),
                margin_coin: self.margin_coin(&symbol),
                size: request.quantity,
                price: request.price,
                side: SmolStr::new_static(match request.side {
                    Side::Buy => "buy",
                    Side::Sell => "sell",
                }),
                order_type: SmolStr::new_static(match request.order_type {
                    OrderType::Limit => "limit",
                    OrderType::Market => "market",
                }),
                force: matches!(request.order_type, OrderType::Limit)
                    .then(|| SmolStr::new_static("gtc")),
                client_oid: client_order_id.clone(),
                reduce_only: request
                    .reduce_only
                    .map(|reduce| SmolStr::new_static(if reduce { "yes" } else { "no" })),
            };
            with_retry(&self.policy, self.governor.as_ref(), async |_| {
                self.issue::<_, OrderAck>(
                    &endpoints::MIX_PLACE,
                    BitgetRequest::post("/api/v2/mix/order/place-order", body.clone()),
                    &mut profile,
                )
                .await
            })
            .await
        } else {
            let body = SpotPlaceOrderBody {
                symbol: SmolStr::new(symbol.name()),
                side: SmolStr::new_static(match request.side {
                    Side::Buy => "buy",
                    Side::Sell => "sell",
                }),
                order_type: SmolStr::new_static(match request.order_type {
                    OrderType::Limit => "limit",
                    OrderType::Market => "market",
                }),
                force: SmolStr::new_static("gtc"),
                price: request.price,
                size: request.quantity,
                client_oid: client_order_id.clone(),
            };
            with_retry(&self.policy, self.governor.as_ref(), async |_| {
                self.issue::<_, OrderAck>(
                    &endpoints::SPOT_PLACE,
                    BitgetRequest::post("/api/v2/spot/trade/place-order", body.clone()),
                    &mut profile,
                )
                .await
            })
            .await
        };

        let result = match submitted {
            Ok(_) => self.confirm_order(&symbol, &client_order_id, &mut profile).await,
            Err(error) => Err(error),
        };

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let raw = self
                .query_order_attempt(&query.symbol, &query.client_order_id, &mut profile)
                .await?;
            normalize::order(raw).map_err(AttemptError::Venue)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn cancel_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (cancelled, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                self.issue::<_, OrderAck>(
                    &endpoints::MIX_CANCEL,
                    BitgetRequest::post(
                        "/api/v2/mix/order/cancel-order",
                        OrderLookupParams {
                            symbol: Some(SmolStr::new(query.symbol.name())),
                            product_type: Some(self.product_type(&query.symbol)),
                            client_oid: Some(query.client_order_id.clone()),
                            order_id: None,
                        },
                    ),
                    &mut profile,
                )
                .await
            } else {
                self.issue::<_, OrderAck>(
                    &endpoints::SPOT_CANCEL,
                    BitgetRequest::post(
                        "/api/v2/spot/trade/cancel-order",
                        OrderLookupParams {
                            symbol: Some(SmolStr::new(query.symbol.name())),
                            product_type: None,
                            client_oid: Some(query.client_order_id.clone()),
                            order_id: None,
                        },
                    ),
                    &mut profile,
                )
                .await
            }
        })
        .await;

        let result = match cancelled {
            Ok(_) => {
                self.confirm_order(&query.symbol, &query.client_order_id, &mut profile)
                    .await
            }
            Err(error) => Err(error),
        };

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn cancel_order_by_order_id(&self, query: OrderIdQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let lookup = OrderLookupParams {
                symbol: Some(SmolStr::new(query.symbol.name())),
                product_type: self
                    .is_futures()
                    .then(|| self.product_type(&query.symbol)),
                client_oid: None,
                order_id: Some(query.order_id.clone()),
            };

            if self.is_futures() {
                self.issue::<_, OrderAck>(
                    &endpoints::MIX_CANCEL,
                    BitgetRequest::post("/api/v2/mix/order/cancel-order", lookup.clone()),
                    &mut profile,
                )
                .await?;
                let raw: BitgetOrder = self
                    .issue(
                        &endpoints::MIX_DETAIL,
                        BitgetRequest::get("/api/v2/mix/order/detail", lookup),
                        &mut profile,
                    )
                    .await?;
                normalize::order(raw).map_err(AttemptError::Venue)
            } else {
                self.issue::<_, OrderAck>(
                    &endpoints::SPOT_CANCEL,
                    BitgetRequest::post("/api/v2/spot/trade/cancel-order", lookup.clone()),
                    &mut profile,
                )
                .await?;
                let orders: Vec<BitgetOrder> = self
                    .issue(
                        &endpoints::SPOT_ORDER_INFO,
                        BitgetRequest::get("/api/v2/spot/trade/orderInfo", lookup),
                        &mut profile,
                    )
                    .await?;
                let raw = orders.into_iter().next().ok_or_else(|| {
                    AttemptError::Venue(VenueError::new("The order cannot be found"))
                })?;
                normalize::order(raw).map_err(AttemptError::Venue)
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

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let raw = if self.is_futures() {
                let pending: PendingOrders = self
                    .issue(
                        &endpoints::MIX_PENDING,
                        BitgetRequest::get(
                            "/api/v2/mix/order/orders-pending",
                            MixParams {
                                product_type: self.mode_product_type(),
                                symbol: symbol.as_ref().map(|symbol| SmolStr::new(symbol.name())),
                                margin_coin: None,
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                pending.entrusted_list.unwrap_or_default()
            } else {
                self.issue(
                    &endpoints::SPOT_UNFILLED,
                    BitgetRequest::get(
                        "/api/v2/spot/trade/unfilled-orders",
                        SpotSymbolParams {
                            symbol: symbol.as_ref().map(|symbol| SmolStr::new(symbol.name())),
                        },
                    ),
                    &mut profile,
                )
                .await?
            };

            if !return_orders {
                return Ok(OpenOrders::Count(raw.len() as u32));
            }

            let orders = raw
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

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let tickers: Vec<TickerEntry> = if self.is_futures() {
                self.issue(
                    &endpoints::TICKERS,
                    BitgetRequest::get(
                        "/api/v2/mix/market/ticker",
                        MixParams {
                            product_type: self.product_type(&symbol),
                            symbol: Some(SmolStr::new(symbol.name())),
                            margin_coin: None,
                        },
                    ),
                    &mut profile,
                )
                .await?
            } else {
                self.issue(
                    &endpoints::TICKERS,
                    BitgetRequest::get(
                        "/api/v2/spot/market/tickers",
                        SpotSymbolParams {
                            symbol: Some(SmolStr::new(symbol.name())),
                        },
                    ),
                    &mut profile,
                )
                .await?
            };
            tickers
                .into_iter()
                .next()
                .map(|ticker| ticker.last_pr)
                .ok_or_else(|| AttemptError::Venue(VenueError::new("empty ticker response")))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_prices(&self) -> CallOutcome<Vec<TickerPrice>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let tickers: Vec<TickerEntry> = if self.is_futures() {
                self.issue(
                    &endpoints::TICKERS,
                    BitgetRequest::get(
                        "/api/v2/mix/market/tickers",
                        MixParams {
                            product_type: self.mode_product_type(),
                            symbol: None,
                            margin_coin: None,
                        },
                    ),
                    &mut profile,
                )
                .await?
            } else {
                self.issue(
                    &endpoints::TICKERS,
                    BitgetRequest::get(
                        "/api/v2/spot/market/tickers",
                        SpotSymbolParams { symbol: None },
                    ),
                    &mut profile,
                )
                .await?
            };
            Ok(tickers.into_iter().map(normalize::ticker).collect())
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

        let path = if self.is_futures() {
            "/api/v2/mix/market/candles"
        } else {
            "/api/v2/spot/market/candles"
        };
        let params = CandlesParams {
            symbol: SmolStr::new(symbol.name()),
            product_type: self.is_futures().then(|| self.product_type(&symbol)),
            granularity: SmolStr::new(normalize::interval(interval, self.futures)),
            start_time: range.from,
            end_time: range.to,
            limit: range.count,
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let rows: Vec<RawBitgetCandle> = self
                .issue(&endpoints::CANDLES, BitgetRequest::get(path, params.clone()), &mut profile)
                .await?;
            let mut candles = rows
                .iter()
                .map(|row| normalize::candle(row, interval))
                .collect::<Result<Vec<_>, _>>()
                .map_err(AttemptError::Venue)?;
            candles.sort_by_key(|candle| candle.open_time);
            Ok(candles)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_trades(&self, symbol: Symbol, _limit: Option<u32>) -> CallOutcome<Vec<Trade>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let fills: Vec<FillEntry> = if self.is_futures() {
                self.issue(
                    &endpoints::FILLS,
                    BitgetRequest::get(
                        "/api/v2/mix/market/fills",
                        MixParams {
                            product_type: self.product_type(&symbol),
                            symbol: Some(SmolStr::new(symbol.name())),
                            margin_coin: None,
                        },
                    ),
                    &mut profile,
                )
                .await?
            } else {
                self.issue(
                    &endpoints::FILLS,
                    BitgetRequest::get(
                        "/api/v2/spot/market/fills",
                        SpotSymbolParams {
                            symbol: Some(SmolStr::new(symbol.name())),
                        },
                    ),
                    &mut profile,
                )
                .await?
            };
            Ok(fills.into_iter().map(normalize::trade).collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_exchange_info(&self, symbol: Symbol) -> CallOutcome<Instrument> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let contracts: Vec<MixContract> = self
                    .issue(
                        &endpoints::CONTRACTS,
                        BitgetRequest::get(
                            "/api/v2/mix/market/contracts",
                            MixParams {
                                product_type: self.product_type(&symbol),
                                symbol: Some(SmolStr::new(symbol.name())),
                                margin_coin: None,
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                let contract = contracts.into_iter().next().ok_or_else(|| {
                    AttemptError::Venue(VenueError::new(format!(
                        "contract {} not found",
                        symbol.name()
                    )))
                })?;
                normalize::mix_instrument(contract).map_err(AttemptError::Venue)
            } else {
                let symbols: Vec<SpotSymbol> = self
                    .issue(
                        &endpoints::SYMBOLS,
                        BitgetRequest::get(
                            "/api/v2/spot/public/symbols",
                            SpotSymbolParams {
                                symbol: Some(SmolStr::new(symbol.name())),
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                let entry = symbols.into_iter().next().ok_or_else(|| {
                    AttemptError::Venue(VenueError::new(format!(
                        "symbol {} not found",
                        symbol.name()
                    )))
                })?;
                normalize::spot_instrument(entry).map_err(AttemptError::Venue)
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_exchange_info(&self) -> CallOutcome<Vec<Instrument>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let contracts: Vec<MixContract> = self
                    .issue(
                        &endpoints::CONTRACTS,
                        BitgetRequest::get(
                            "/api/v2/mix/market/contracts",
                            MixParams {
                                product_type: self.mode_product_type(),
                                symbol: None,
                                margin_coin: None,
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                contracts
                    .into_iter()
                    .map(|contract| normalize::mix_instrument(contract).map_err(AttemptError::Venue))
                    .collect()
            } else {
                let symbols: Vec<SpotSymbol> = self
                    .issue(
                        &endpoints::SYMBOLS,
                        BitgetRequest::get(
                            "/api/v2/spot/public/symbols",
                            SpotSymbolParams { symbol: None },
                        ),
                        &mut profile,
                    )
                    .await?;
                symbols
                    .into_iter()
                    .map(|entry| normalize::spot_instrument(entry).map_err(AttemptError::Venue))
                    .collect()
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_user_fees(&self, symbol: Symbol) -> CallOutcome<UserFee> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let params = TradeRateParams {
            symbol: SmolStr::new(symbol.name()),
            business_type: SmolStr::new_static(if self.is_futures() { "mix" } else { "spot" }),
        };
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let rate: TradeRate = self
                .issue(
                    &endpoints::TRADE_RATE,
                    BitgetRequest::get("/api/v2/common/trade-rate", params.clone()),
                    &mut profile,
                )
                .await?;
            Ok(UserFee::new(rate.maker_fee_rate, rate.taker_fee_rate))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_user_fees(&self) -> CallOutcome<Vec<PairUserFee>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let business_type = SmolStr::new_static(if self.is_futures() { "mix" } else { "spot" });
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            // The fee tier is account-wide; one probe prices every pair
            let pairs: Vec<Symbol> = if self.is_futures() {
                let contracts: Vec<MixContract> = self
                    .issue(
                        &endpoints::CONTRACTS,
                        BitgetRequest::get(
                            "/api/v2/mix/market/contracts",
                            MixParams {
                                product_type: self.mode_product_type(),
                                symbol: None,
                                margin_coin: None,
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                contracts
                    .into_iter()
                    .map(|contract| Symbol::new(contract.symbol))
                    .collect()
            } else {
                let symbols: Vec<SpotSymbol> = self
                    .issue(
                        &endpoints::SYMBOLS,
                        BitgetRequest::get(
                            "/api/v2/spot/public/symbols",
                            SpotSymbolParams { symbol: None },
                        ),
                        &mut profile,
                    )
                    .await?;
                symbols.into_iter().map(|entry| Symbol::new(entry.symbol)).collect()
            };

            let Some(first) = pairs.first() else {
                return Ok(Vec::new());
            };

            let rate: TradeRate = self
                .issue(
                    &endpoints::TRADE_RATE,
                    BitgetRequest::get(
                        "/api/v2/common/trade-rate",
                        TradeRateParams {
                            symbol: SmolStr::new(first.name()),
                            business_type: business_type.clone(),
                        },
                    ),
                    &mut profile,
                )
                .await?;
            let fee = UserFee::new(rate.maker_fee_rate, rate.taker_fee_rate);

            Ok(pairs
                .into_iter()
                .map(|pair| PairUserFee::new(pair, fee))
                .collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn change_leverage(&self, symbol: Symbol, leverage: u32) -> CallOutcome<()> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let leverage = smol_str::format_smolstr!("{leverage}");
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            // Isolated hedge accounts take leverage per leg; read the
            // posture first, then set both legs.
            let accounts: Vec<MixAccount> = self
                .issue(
                    &endpoints::MIX_ACCOUNTS,
                    BitgetRequest::get(
                        "/api/v2/mix/account/accounts",
                        MixParams {
                            product_type: self.mode_product_type(),
                            symbol: None,
                            margin_coin: None,
                        },
                    ),
                    &mut profile,
                )
                .await?;
            let hedged = accounts
                .first()
                .is_some_and(|account| account.pos_mode == "hedge_mode");

            let hold_sides: &[Option<&str>] = if hedged {
                &[Some("long"), Some("short")]
            } else {
                &[None]
            };

            for hold_side in hold_sides {
                self.issue::<_, serde_json::Value>(
                    &endpoints::SET_LEVERAGE,
                    BitgetRequest::post(
                        "/api/v2/mix/account/set-leverage",
                        SetLeverageBody {
                            symbol: SmolStr::new(symbol.name()),
                            product_type: self.product_type(&symbol),
                            margin_coin: self.margin_coin(&symbol),
                            leverage: leverage.clone(),
                            hold_side: hold_side.map(SmolStr::new),
                        },
                    ),
                    &mut profile,
                )
                .await?;
            }
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

        let body = SetMarginModeBody {
            symbol: SmolStr::new(symbol.name()),
            product_type: self.product_type(&symbol),
            margin_coin: self.margin_coin(&symbol),
            margin_mode: SmolStr::new_static(match margin {
                MarginType::Isolated => "isolated",
                MarginType::Crossed => "crossed",
            }),
        };
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, serde_json::Value>(
                &endpoints::SET_MARGIN_MODE,
                BitgetRequest::post("/api/v2/mix/account/set-margin-mode", body.clone()),
                &mut profile,
            )
            .await?;
            Ok(())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_hedge(&self) -> CallOutcome<bool> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let accounts: Vec<MixAccount> = self
                .issue(
                    &endpoints::MIX_ACCOUNTS,
                    BitgetRequest::get(
                        "/api/v2/mix/account/accounts",
                        MixParams {
                            product_type: self.mode_product_type(),
                            symbol: None,
                            margin_coin: None,
                        },
                    ),
                    &mut profile,
                )
                .await?;
            Ok(accounts
                .first()
                .is_some_and(|account| account.pos_mode == "hedge_mode"))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn set_hedge(&self, hedge: bool) -> CallOutcome<()> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let body = SetPositionModeBody {
            product_type: self.mode_product_type(),
            pos_mode: SmolStr::new_static(if hedge { "hedge_mode" } else { "one_way_mode" }),
        };
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, serde_json::Value>(
                &endpoints::SET_POSITION_MODE,
                BitgetRequest::post("/api/v2/mix/account/set-position-mode", body.clone()),
                &mut profile,
            )
            .await?;
            Ok(())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_positions(&self, symbol: Option<Symbol>) -> CallOutcome<Vec<PositionInfo>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let positions: Vec<MixPosition> = self
                .issue(
                    &endpoints::POSITIONS,
                    BitgetRequest::get(
                        "/api/v2/mix/position/all-position",
                        MixParams {
                            product_type: self.mode_product_type(),
                            symbol: None,
                            margin_coin: None,
                        },
                    ),
                    &mut profile,
                )
                .await?;
            positions
                .into_iter()
                .filter(|position| {
                    symbol
                        .as_ref()
                        .is_none_or(|symbol| position.symbol == symbol.name())
                })
                .map(|entry| normalize::position(entry).map_err(AttemptError::Venue))
                .collect()
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn leverage_bracket(&self, symbol: Symbol) -> CallOutcome<Vec<LeverageBracket>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let params = MixParams {
            product_type: self.product_type(&symbol),
            symbol: Some(SmolStr::new(symbol.name())),
            margin_coin: None,
        };
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let tiers: Vec<PositionTier> = self
                .issue(
                    &endpoints::POSITION_TIERS,
                    BitgetRequest::get("/api/v2/mix/market/query-position-lever", params.clone()),
                    &mut profile,
                )
                .await?;
            tiers
                .into_iter()
                .map(|tier| normalize::bracket(tier).map_err(AttemptError::Venue))
                .collect()
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }
}
