use self::{
    parser::BybitParser,
    requests::{
        AccountInfo, AffiliateInfo, ApiKeyInfo, BybitHttpResponse, BybitOrder, BybitRequest,
        CancelOrderBody, CategoryParams, FeeRateEntry, InstrumentEntry, KlineParams, ListResult,
        OrderAck, OrderQueryParams, PlaceOrderBody, PositionEntry, RawBybitKline, RecentTrade,
        RiskLimitEntry, SetLeverageBody, SwitchIsolatedBody, SwitchModeBody, TickerEntry,
        UidParams, WalletBalanceEntry, WalletBalanceParams,
    },
    signer::{BybitRequestSigner, BybitSigner},
};
use super::{Connector, acquire_slot, lookup_until_visible, seal_outcome};
use crate::{
    CallOutcome,
    config::ProviderConfig,
    error::{CallError, VenueError},
    governor::{Endpoint, bybit::BybitGovernor, registry},
    model::{
        balance::FreeAsset,
        fee::{PairUserFee, UserFee},
        market::{Candle, CandleRange, TickerPrice, Trade},
        order::{CanonicalOrder, OpenOrderRequest, OpenOrders, OrderIdQuery, OrderQuery},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
    retry::{AttemptError, bybit::BybitRetryPolicy, with_retry},
};
use hmac::Mac;
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use smol_str::SmolStr;
use std::{sync::Arc, time::Duration};
use tokio::sync::OnceCell;
use tradegate_instrument::{
    FuturesMode, OrderType, Side, instrument::Instrument, interval::CandleInterval, symbol::Symbol,
    venue::VenueId,
};
use tradegate_integration::{
    clock::{SharedClock, system_clock},
    profile::TimeProfile,
    protocol::http::{private::encoder::HexEncoder, rest::{NoParams, client::RestClient}},
};
use tracing::debug;

mod parser;
mod requests;
mod signer;

pub mod normalize;

const HTTP_BASE_URL: &str = "https://api.bybit.com";
const HTTP_BASE_URL_TESTNET: &str = "https://api-testnet.bybit.com";

/// Position mode rejection the facade corrects itself (spec §4.4).
const POSITION_IDX_MISMATCH: &str = "position idx not match position mode";

/// Idempotent re-apply answer for set-leverage.
const CODE_LEVERAGE_NOT_MODIFIED: i64 = 110043;

/// Idempotent re-apply answers for switch-isolated / switch-mode.
const CODE_MARGIN_NOT_MODIFIED: i64 = 110026;
const CODE_POSITION_MODE_NOT_MODIFIED: i64 = 110025;

mod endpoints {
    use super::Endpoint;

    pub const ACCOUNT_INFO: Endpoint = Endpoint::request("account/info", 1);
    pub const WALLET_BALANCE: Endpoint = Endpoint::request("account/wallet-balance", 1);
    pub const QUERY_API: Endpoint = Endpoint::request("user/query-api", 1);
    pub const AFFILIATE: Endpoint = Endpoint::request("user/aff-customer-info", 1);
    pub const FEE_RATE: Endpoint = Endpoint::request("account/fee-rate", 1);
    pub const PLACE_ORDER: Endpoint = Endpoint::order("order/create", 1);
    pub const CANCEL_ORDER: Endpoint = Endpoint::order("order/cancel", 1);
    pub const QUERY_ORDER: Endpoint = Endpoint::request("order/realtime", 1);
    pub const TICKERS: Endpoint = Endpoint::request("market/tickers", 1);
    pub const KLINE: Endpoint = Endpoint::request("market/kline", 1);
    pub const RECENT_TRADE: Endpoint = Endpoint::request("market/recent-trade", 1);
    pub const INSTRUMENTS: Endpoint = Endpoint::request("market/instruments-info", 1);
    pub const POSITION_LIST: Endpoint = Endpoint::request("position/list", 1);
    pub const SET_LEVERAGE: Endpoint = Endpoint::request("position/set-leverage", 1);
    pub const SWITCH_ISOLATED: Endpoint = Endpoint::request("position/switch-isolated", 1);
    pub const SWITCH_MODE: Endpoint = Endpoint::request("position/switch-mode", 1);
    pub const RISK_LIMIT: Endpoint = Endpoint::request("market/risk-limit", 1);
}

type BybitRestClient = RestClient<'static, BybitRequestSigner, BybitParser>;

/// Bybit V5 connector. One client serves spot and derivatives; the V5
/// `category` parameter selects the product family.
#[derive(Debug)]
pub struct BybitConnector {
    venue: VenueId,
    futures: FuturesMode,
    rest: Option<BybitRestClient>,
    governor: Arc<BybitGovernor>,
    policy: BybitRetryPolicy,
    clock: SharedClock,
    timeout: Duration,

    /// Account posture is immutable per key; queried once and cached.
    account_info: OnceCell<CachedAccount>,
}

#[derive(Debug, Clone)]
struct CachedAccount {
    account_type: SmolStr,
    #[allow(dead_code)]
    margin_mode: SmolStr,
}

impl BybitConnector {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_parts(config, registry::bybit(), system_clock())
    }

    pub fn with_parts(
        config: ProviderConfig,
        governor: Arc<BybitGovernor>,
        clock: SharedClock,
    ) -> Self {
        let venue = if config.futures.is_futures() {
            VenueId::BybitFuturesUsd
        } else {
            VenueId::BybitSpot
        };

        let base_url = config.host.clone().unwrap_or_else(|| {
            match config.environment {
                crate::config::Environment::Live => HTTP_BASE_URL,
                crate::config::Environment::Sandbox => HTTP_BASE_URL_TESTNET,
            }
            .to_string()
        });

        let rest = config.credentials.as_ref().map(|credentials| {
            let hmac = hmac::Hmac::new_from_slice(credentials.secret.as_bytes())
                .expect("ApiCredentials secret invalid length");
            RestClient::new(
                base_url,
                BybitRequestSigner::new(BybitSigner::new(credentials.key.clone()), hmac, HexEncoder),
                BybitParser,
            )
        });

        Self {
            venue,
            futures: config.futures,
            rest,
            governor,
            policy: BybitRetryPolicy::new(config.retry),
            clock,
            timeout: config.timeout,
            account_info: OnceCell::new(),
        }
    }

    fn category(&self) -> SmolStr {
        SmolStr::new_static(match self.futures {
            FuturesMode::Spot => "spot",
            FuturesMode::Usdm => "linear",
            FuturesMode::Coinm => "inverse",
        })
    }

    fn require_futures(&self) -> Result<(), CallError> {
        if self.futures.is_futures() {
            Ok(())
        } else {
            Err(CallError::FuturesModeMissing)
        }
    }

    /// One governed, signed request; non-zero `retCode` becomes a venue
    /// error unless listed in `accept`.
    async fn issue<Params, Inner>(
        &self,
        endpoint: &Endpoint,
        request: BybitRequest<Params, Inner>,
        accept: &[i64],
        profile: &mut TimeProfile,
    ) -> Result<BybitHttpResponse<Inner>, AttemptError>
    where
        Params: Serialize + Send + Sync,
        Inner: DeserializeOwned + Send + Sync,
    {
        let rest = self
            .rest
            .as_ref()
            .ok_or(CallError::ClientMissing("Bybit"))?;

        acquire_slot(self.governor.as_ref(), endpoint, &self.clock, self.timeout, profile).await?;

        let (response, _meta) = rest
            .execute(request, profile)
            .await
            .map_err(AttemptError::Venue)?;

        if response.ret_code != 0 && !accept.contains(&response.ret_code) {
            return Err(AttemptError::Venue(VenueError::with_code(
                response.ret_code,
                response.ret_msg,
            )));
        }

        Ok(response)
    }

    async fn cached_account(
        &self,
        profile: &mut TimeProfile,
    ) -> Result<CachedAccount, AttemptError> {
        if let Some(cached) = self.account_info.get() {
            return Ok(cached.clone());
        }

        let response: BybitHttpResponse<AccountInfo> = self
            .issue(
                &endpoints::ACCOUNT_INFO,
                BybitRequest::get("/v5/account/info", NoParams {}),
                &[],
                profile,
            )
            .await?;

        let cached = CachedAccount {
            account_type: SmolStr::new_static(if response.result.unified_margin_status >= 3 {
                "UNIFIED"
            } else {
                "CONTRACT"
            }),
            margin_mode: response.result.margin_mode,
        };
        debug!(account_type = %cached.account_type, "cached Bybit account posture");
        let _ = self.account_info.set(cached.clone());
        Ok(cached)
    }

    async fn query_order_attempt(
        &self,
        symbol: &Symbol,
        client_order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<BybitOrder, AttemptError> {
        let response: BybitHttpResponse<ListResult<BybitOrder>> = self
            .issue(
                &endpoints::QUERY_ORDER,
                BybitRequest::get(
                    "/v5/order/realtime",
                    OrderQueryParams {
                        category: self.category(),
                        symbol: Some(SmolStr::new(symbol.name())),
                        order_link_id: Some(client_order_id.clone()),
                        open_only: None,
                    },
                ),
                &[],
                profile,
            )
            .await?;

        response
            .result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| AttemptError::Venue(VenueError::new("Order does not exist")))
    }

    async fn confirm_order(
        &self,
        symbol: &Symbol,
        client_order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<CanonicalOrder, CallError> {
        let raw = lookup_until_visible(
            async || self.query_order_attempt(symbol, client_order_id, profile).await,
            |error: &AttemptError| {
                error
                    .as_venue()
                    .is_some_and(|venue| venue.message_contains("order does not exist"))
            },
        )
        .await
        .map_err(AttemptError::into_call_error)?;

        normalize::order(raw).map_err(|error| CallError::Rejected(error.message))
    }

    async fn submit_order(
        &self,
        body: PlaceOrderBody,
        profile: &mut TimeProfile,
    ) -> (Result<OrderAck, CallError>, u32) {
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<OrderAck> = self
                .issue(
                    &endpoints::PLACE_ORDER,
                    BybitRequest::post("/v5/order/create", body.clone()),
                    &[],
                    profile,
                )
                .await?;
            Ok(response.result)
        })
        .await;
        (result, attempts)
    }
}

impl Connector for BybitConnector {
    fn venue(&self) -> VenueId {
        self.venue
    }

    async fn get_balance(&self) -> CallOutcome<Vec<FreeAsset>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let account = self.cached_account(&mut profile).await?;

            let response: BybitHttpResponse<ListResult<WalletBalanceEntry>> = self
                .issue(
                    &endpoints::WALLET_BALANCE,
                    BybitRequest::get(
                        "/v5/account/wallet-balance",
                        WalletBalanceParams {
                            account_type: account.account_type.clone(),
                            coin: None,
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;

            let Some(wallet) = response
                .result
                .list
                .into_iter()
                .find(|entry| entry.account_type == account.account_type)
            else {
                return Ok(Vec::new());
            };

            wallet
                .coin
                .into_iter()
                .map(|coin| {
                    let locked = normalize_locked(&coin.locked)?;
                    Ok(FreeAsset::new(
                        coin.coin,
                        coin.wallet_balance - locked,
                        locked,
                    ))
                })
                .collect::<Result<Vec<_>, VenueError>>()
                .map_err(AttemptError::Venue)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_api_permission(&self) -> CallOutcome<bool> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ApiKeyInfo> = self
                .issue(
                    &endpoints::QUERY_API,
                    BybitRequest::get("/v5/user/query-api", NoParams {}),
                    &[],
                    &mut profile,
                )
                .await?;
            Ok(response.result.read_only == 0)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_uid(&self) -> CallOutcome<SmolStr> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ApiKeyInfo> = self
                .issue(
                    &endpoints::QUERY_API,
                    BybitRequest::get("/v5/user/query-api", NoParams {}),
                    &[],
                    &mut profile,
                )
                .await?;
            Ok(smol_str::format_smolstr!("{}", response.result.user_id))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_affiliate(&self, uid: &str) -> CallOutcome<bool> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let uid = SmolStr::new(uid);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<AffiliateInfo> = self
                .issue(
                    &endpoints::AFFILIATE,
                    BybitRequest::get("/v5/user/aff-customer-info", UidParams { uid: uid.clone() }),
                    &[],
                    &mut profile,
                )
                .await?;
            Ok(response.result.is_affiliate)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn open_order(&self, request: OpenOrderRequest) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let client_order_id = request.client_order_id_or_random();
        let symbol = request.symbol.clone();
        let reduce_only = request.reduce_only.unwrap_or(false);
        let futures = self.futures.is_futures();

        let body = PlaceOrderBody {
            category: self.category(),
            symbol: SmolStr::new(symbol.name()),
            side: SmolStr::new_static(match request.side {
                Side::Buy => "Buy",
                Side::Sell => "Sell",
            }),
            order_type: SmolStr::new_static(match request.order_type {
                OrderType::Limit => "Limit",
                OrderType::Market => "Market",
            }),
            qty: request.quantity,
            price: request.price,
            time_in_force: matches!(request.order_type, OrderType::Limit)
                .then(|| SmolStr::new_static("GTC")),
            order_link_id: client_order_id.clone(),
            reduce_only: request.reduce_only.filter(|_| futures),
            position_idx: futures.then(|| {
                request
                    .position_side
                    .map(|side| match side {
                        tradegate_instrument::PositionSide::Long => 1,
                        tradegate_instrument::PositionSide::Short => 2,
                        tradegate_instrument::PositionSide::Both => 0,
                    })
                    .unwrap_or(0)
            }),
        };

        let (submitted, attempts) = self.submit_order(body.clone(), &mut profile).await;

        // A hedge-mode account rejects positionIdx 0; recompute the leg from
        // (side, reduceOnly) and reissue exactly once.
        let (submitted, attempts) = match submitted {
            Err(CallError::Rejected(reason)) if reason.contains(POSITION_IDX_MISMATCH) => {
                let corrected = PlaceOrderBody {
                    position_idx: Some(normalize::hedge_position_idx(request.side, reduce_only)),
                    ..body
                };
                debug!(position_idx = ?corrected.position_idx, "reissuing with corrected positionIdx");
                let (retried, retry_attempts) = self.submit_order(corrected, &mut profile).await;
                (retried, attempts + retry_attempts)
            }
            other => (other, attempts),
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
            let response: BybitHttpResponse<OrderAck> = self
                .issue(
                    &endpoints::CANCEL_ORDER,
                    BybitRequest::post(
                        "/v5/order/cancel",
                        CancelOrderBody {
                            category: self.category(),
                            symbol: SmolStr::new(query.symbol.name()),
                            order_id: None,
                            order_link_id: Some(query.client_order_id.clone()),
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            Ok(response.result)
        })
        .await;

        // A 200 on cancel is not a confirmation on this venue; read back the
        // authoritative state.
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
            self.issue::<_, OrderAck>(
                &endpoints::CANCEL_ORDER,
                BybitRequest::post(
                    "/v5/order/cancel",
                    CancelOrderBody {
                        category: self.category(),
                        symbol: SmolStr::new(query.symbol.name()),
                        order_id: Some(query.order_id.clone()),
                        order_link_id: None,
                    },
                ),
                &[],
                &mut profile,
            )
            .await?;

            // Read back by venue order id via the open/closed listing
            let response: BybitHttpResponse<ListResult<BybitOrder>> = self
                .issue(
                    &endpoints::QUERY_ORDER,
                    BybitRequest::get(
                        "/v5/order/realtime",
                        OrderQueryParams {
                            category: self.category(),
                            symbol: Some(SmolStr::new(query.symbol.name())),
                            order_link_id: None,
                            open_only: None,
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;

            let raw = response
                .result
                .list
                .into_iter()
                .find(|order| order.order_id == query.order_id)
                .ok_or_else(|| AttemptError::Venue(VenueError::new("Order does not exist")))?;
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

        let symbol = symbol.map(|symbol| SmolStr::new(symbol.name()));
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ListResult<BybitOrder>> = self
                .issue(
                    &endpoints::QUERY_ORDER,
                    BybitRequest::get(
                        "/v5/order/realtime",
                        OrderQueryParams {
                            category: self.category(),
                            symbol: symbol.clone(),
                            order_link_id: None,
                            open_only: Some(0),
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;

            if !return_orders {
                return Ok(OpenOrders::Count(response.result.list.len() as u32));
            }

            let orders = response
                .result
                .list
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
            let response: BybitHttpResponse<ListResult<TickerEntry>> = self
                .issue(
                    &endpoints::TICKERS,
                    BybitRequest::get(
                        "/v5/market/tickers",
                        CategoryParams {
                            category: self.category(),
                            symbol: Some(SmolStr::new(symbol.name())),
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            response
                .result
                .list
                .into_iter()
                .next()
                .map(|ticker| ticker.last_price)
                .ok_or_else(|| AttemptError::Venue(VenueError::new("empty ticker response")))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_prices(&self) -> CallOutcome<Vec<TickerPrice>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ListResult<TickerEntry>> = self
                .issue(
                    &endpoints::TICKERS,
                    BybitRequest::get(
                        "/v5/market/tickers",
                        CategoryParams {
                            category: self.category(),
                            symbol: None,
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            Ok(response.result.list.into_iter().map(normalize::ticker).collect())
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

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ListResult<RawBybitKline>> = self
                .issue(
                    &endpoints::KLINE,
                    BybitRequest::get(
                        "/v5/market/kline",
                        KlineParams {
                            category: self.category(),
                            symbol: SmolStr::new(symbol.name()),
                            interval: SmolStr::new(normalize::interval(interval)),
                            start: range.from,
                            end: range.to,
                            limit: range.count.or(Some(200)),
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;

            // The venue serves newest-first; callers get ascending time
            let mut candles = response
                .result
                .list
                .iter()
                .map(|raw| normalize::candle(raw, interval))
                .collect::<Result<Vec<_>, _>>()
                .map_err(AttemptError::Venue)?;
            candles.sort_by_key(|candle| candle.open_time);
            Ok(candles)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_trades(&self, symbol: Symbol, limit: Option<u32>) -> CallOutcome<Vec<Trade>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ListResult<RecentTrade>> = self
                .issue(
                    &endpoints::RECENT_TRADE,
                    BybitRequest::get(
                        "/v5/market/recent-trade",
                        RecentTradeParams {
                            category: self.category(),
                            symbol: SmolStr::new(symbol.name()),
                            limit,
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            Ok(response.result.list.into_iter().map(normalize::trade).collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_exchange_info(&self, symbol: Symbol) -> CallOutcome<Instrument> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ListResult<InstrumentEntry>> = self
                .issue(
                    &endpoints::INSTRUMENTS,
                    BybitRequest::get(
                        "/v5/market/instruments-info",
                        CategoryParams {
                            category: self.category(),
                            symbol: Some(SmolStr::new(symbol.name())),
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            let entry = response.result.list.into_iter().next().ok_or_else(|| {
                AttemptError::Venue(VenueError::new(format!(
                    "symbol {} not found in instruments info",
                    symbol.name()
                )))
            })?;
            normalize::instrument(entry).map_err(AttemptError::Venue)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_exchange_info(&self) -> CallOutcome<Vec<Instrument>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ListResult<InstrumentEntry>> = self
                .issue(
                    &endpoints::INSTRUMENTS,
                    BybitRequest::get(
                        "/v5/market/instruments-info",
                        CategoryParams {
                            category: self.category(),
                            symbol: None,
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            response
                .result
                .list
                .into_iter()
                .map(|entry| normalize::instrument(entry).map_err(AttemptError::Venue))
                .collect()
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_user_fees(&self, symbol: Symbol) -> CallOutcome<UserFee> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ListResult<FeeRateEntry>> = self
                .issue(
                    &endpoints::FEE_RATE,
                    BybitRequest::get(
                        "/v5/account/fee-rate",
                        CategoryParams {
                            category: self.category(),
                            symbol: Some(SmolStr::new(symbol.name())),
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            response
                .result
                .list
                .into_iter()
                .next()
                .map(|entry| UserFee::new(entry.maker_fee_rate, entry.taker_fee_rate))
                .ok_or_else(|| AttemptError::Venue(VenueError::new("empty fee-rate response")))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_user_fees(&self) -> CallOutcome<Vec<PairUserFee>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ListResult<FeeRateEntry>> = self
                .issue(
                    &endpoints::FEE_RATE,
                    BybitRequest::get(
                        "/v5/account/fee-rate",
                        CategoryParams {
                            category: self.category(),
                            symbol: None,
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            Ok(response.result.list.into_iter().map(normalize::fee).collect())
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
            self.issue::<_, serde_json::Value>(
                &endpoints::SET_LEVERAGE,
                BybitRequest::post(
                    "/v5/position/set-leverage",
                    SetLeverageBody {
                        category: self.category(),
                        symbol: SmolStr::new(symbol.name()),
                        buy_leverage: leverage.clone(),
                        sell_leverage: leverage.clone(),
                    },
                ),
                &[CODE_LEVERAGE_NOT_MODIFIED],
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

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            // switch-isolated wants the leverage restated; read the live one
            let positions: BybitHttpResponse<ListResult<PositionEntry>> = self
                .issue(
                    &endpoints::POSITION_LIST,
                    BybitRequest::get(
                        "/v5/position/list",
                        CategoryParams {
                            category: self.category(),
                            symbol: Some(SmolStr::new(symbol.name())),
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            let leverage = positions
                .result
                .list
                .first()
                .map(|position| position.leverage.clone())
                .filter(|leverage| !leverage.is_empty())
                .unwrap_or_else(|| SmolStr::new_static("10"));

            self.issue::<_, serde_json::Value>(
                &endpoints::SWITCH_ISOLATED,
                BybitRequest::post(
                    "/v5/position/switch-isolated",
                    SwitchIsolatedBody {
                        category: self.category(),
                        symbol: SmolStr::new(symbol.name()),
                        trade_mode: match margin {
                            MarginType::Isolated => 1,
                            MarginType::Crossed => 0,
                        },
                        buy_leverage: leverage.clone(),
                        sell_leverage: leverage,
                    },
                ),
                &[CODE_MARGIN_NOT_MODIFIED],
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
            // The venue exposes no direct posture read; the position list's
            // positionIdx reveals it.
            let response: BybitHttpResponse<ListResult<PositionEntry>> = self
                .issue(
                    &endpoints::POSITION_LIST,
                    BybitRequest::get(
                        "/v5/position/list",
                        SettleCoinParams {
                            category: self.category(),
                            settle_coin: SmolStr::new_static("USDT"),
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            Ok(response
                .result
                .list
                .iter()
                .any(|position| position.position_idx != 0))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn set_hedge(&self, hedge: bool) -> CallOutcome<()> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, serde_json::Value>(
                &endpoints::SWITCH_MODE,
                BybitRequest::post(
                    "/v5/position/switch-mode",
                    SwitchModeBody {
                        category: self.category(),
                        symbol: None,
                        coin: Some(SmolStr::new_static("USDT")),
                        mode: if hedge { 3 } else { 0 },
                    },
                ),
                &[CODE_POSITION_MODE_NOT_MODIFIED],
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

        let symbol = symbol.map(|symbol| SmolStr::new(symbol.name()));
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ListResult<PositionEntry>> = match &symbol {
                Some(symbol) => {
                    self.issue(
                        &endpoints::POSITION_LIST,
                        BybitRequest::get(
                            "/v5/position/list",
                            CategoryParams {
                                category: self.category(),
                                symbol: Some(symbol.clone()),
                            },
                        ),
                        &[],
                        &mut profile,
                    )
                    .await?
                }
                None => {
                    self.issue(
                        &endpoints::POSITION_LIST,
                        BybitRequest::get(
                            "/v5/position/list",
                            SettleCoinParams {
                                category: self.category(),
                                settle_coin: SmolStr::new_static("USDT"),
                            },
                        ),
                        &[],
                        &mut profile,
                    )
                    .await?
                }
            };

            response
                .result
                .list
                .into_iter()
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

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: BybitHttpResponse<ListResult<RiskLimitEntry>> = self
                .issue(
                    &endpoints::RISK_LIMIT,
                    BybitRequest::get(
                        "/v5/market/risk-limit",
                        CategoryParams {
                            category: self.category(),
                            symbol: Some(SmolStr::new(symbol.name())),
                        },
                    ),
                    &[],
                    &mut profile,
                )
                .await?;
            Ok(response.result.list.into_iter().map(normalize::bracket).collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }
}

fn normalize_locked(raw: &str) -> Result<Decimal, VenueError> {
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    raw.parse()
        .map_err(|error| VenueError::new(format!("error parsing locked balance: {error}")))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecentTradeParams {
    category: SmolStr,
    symbol: SmolStr,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettleCoinParams {
    category: SmolStr,
    settle_coin: SmolStr,
}
