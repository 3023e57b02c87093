use self::{
    parser::BinanceParser,
    requests::{
        AccountResponse, ApiAgentParams, ApiRestrictions, BinanceOrder, BinanceRequest,
        BinanceTickerPrice, BinanceTrade, CommissionRate, DualSideParams, ExchangeInfoResponse,
        FuturesBalance, IfNewUserResponse, KlinesParams, LeverageParams, MarginTypeParams,
        NewOrderParams, OptionalSymbolParams, OrderLookupParams, PositionRisk, PositionSideDual,
        RawKline, SpotTradeFee, SymbolBrackets, SymbolParams, TradesParams,
    },
    signer::{BinanceRequestSigner, BinanceSigner},
};
use super::{Connector, acquire_slot, lookup_until_visible, seal_outcome};
use crate::{
    CallOutcome,
    config::{ProviderConfig, binance_domain_override, normalize_rsa_secret},
    error::{CallError, VenueError},
    governor::{Endpoint, binance::{BinanceDomain, BinanceGovernor}, registry},
    model::{
        balance::FreeAsset,
        fee::{PairUserFee, UserFee},
        market::{Candle, CandleRange, TickerPrice, Trade},
        order::{CanonicalOrder, OpenOrderRequest, OpenOrders, OrderIdQuery, OrderQuery},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
    retry::{AttemptError, binance::BinanceRetryPolicy, with_retry},
};
use hmac::Mac;
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use smol_str::SmolStr;
use std::{sync::Arc, time::Duration};
use tradegate_instrument::{
    FuturesMode, OrderType, instrument::Instrument, interval::CandleInterval, symbol::Symbol,
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

const HTTP_BASE_URL_SPOT_COM: &str = "https://api.binance.com";
const HTTP_BASE_URL_SPOT_US: &str = "https://api.binance.us";
const HTTP_BASE_URL_USDM: &str = "https://fapi.binance.com";
const HTTP_BASE_URL_COINM: &str = "https://dapi.binance.com";

const WEIGHT_HEADER: &str = "x-mbx-used-weight-1m";
const ORDER_COUNT_HEADERS: &[&str] = &["x-mbx-order-count-10s", "x-mbx-order-count-1m"];

/// Order lookups during the post-create window answer with this code until
/// the venue's read path catches up.
const CODE_ORDER_NOT_FOUND: i64 = -2013;

mod endpoints {
    use super::Endpoint;

    pub const ACCOUNT: Endpoint = Endpoint::request("account", 10);
    pub const API_RESTRICTIONS: Endpoint = Endpoint::request("apiRestrictions", 1);
    pub const IF_NEW_USER: Endpoint = Endpoint::request("ifNewUser", 1);
    pub const TRADE_FEE: Endpoint = Endpoint::request("tradeFee", 1);
    pub const NEW_ORDER: Endpoint = Endpoint::order("order.place", 1);
    pub const QUERY_ORDER: Endpoint = Endpoint::request("order.query", 2);
    pub const CANCEL_ORDER: Endpoint = Endpoint::request("order.cancel", 1);
    pub const OPEN_ORDERS: Endpoint = Endpoint::request("openOrders", 3);
    pub const TICKER: Endpoint = Endpoint::request("ticker.price", 1);
    pub const ALL_TICKERS: Endpoint = Endpoint::request("ticker.price.all", 2);
    pub const KLINES: Endpoint = Endpoint::request("klines", 1);
    pub const TRADES: Endpoint = Endpoint::request("trades", 1);
    pub const EXCHANGE_INFO: Endpoint = Endpoint::request("exchangeInfo", 10);

    pub const FUT_BALANCE: Endpoint = Endpoint::request("futures.balance", 5);
    pub const COMMISSION_RATE: Endpoint = Endpoint::request("commissionRate", 20);
    pub const LEVERAGE: Endpoint = Endpoint::request("leverage", 1);
    pub const MARGIN_TYPE: Endpoint = Endpoint::request("marginType", 1);
    pub const POSITION_SIDE: Endpoint = Endpoint::request("positionSide", 30);
    pub const POSITION_RISK: Endpoint = Endpoint::request("positionRisk", 5);
    pub const LEVERAGE_BRACKET: Endpoint = Endpoint::request("leverageBracket", 1);
}

type BinanceRestClient = RestClient<'static, BinanceRequestSigner, BinanceParser>;

/// Binance connector fronting one of the four API surfaces.
///
/// Futures instances keep a second REST handle against the spot host, since
/// account-scoped endpoints (uid, api restrictions, referral, spot fees)
/// only exist there; those calls debit the spot ledger.
#[derive(Debug)]
pub struct BinanceConnector {
    venue: VenueId,
    domain: BinanceDomain,
    futures: FuturesMode,
    rest: Option<BinanceRestClient>,
    spot_rest: Option<BinanceRestClient>,
    governor: Arc<BinanceGovernor>,
    spot_governor: Arc<BinanceGovernor>,
    policy: BinanceRetryPolicy,
    clock: SharedClock,
    timeout: Duration,
}

impl BinanceConnector {
    /// Construct against binance.com, surface selected by `config.futures`.
    pub fn new(config: ProviderConfig) -> Self {
        let domain = match config.futures {
            FuturesMode::Spot => BinanceDomain::SpotCom,
            FuturesMode::Usdm => BinanceDomain::Usdm,
            FuturesMode::Coinm => BinanceDomain::Coinm,
        };
        Self::with_parts(
            config,
            domain,
            registry::binance(domain),
            registry::binance(BinanceDomain::SpotCom),
            system_clock(),
        )
    }

    /// Construct against binance.us (spot only).
    pub fn new_us(config: ProviderConfig) -> Self {
        Self::with_parts(
            config,
            BinanceDomain::SpotUs,
            registry::binance(BinanceDomain::SpotUs),
            registry::binance(BinanceDomain::SpotUs),
            system_clock(),
        )
    }

    /// Construct with injected governors and clock. Tests use this to keep
    /// ledgers hermetic.
    pub fn with_parts(
        config: ProviderConfig,
        domain: BinanceDomain,
        governor: Arc<BinanceGovernor>,
        spot_governor: Arc<BinanceGovernor>,
        clock: SharedClock,
    ) -> Self {
        let venue = match domain {
            BinanceDomain::SpotCom => VenueId::BinanceSpot,
            BinanceDomain::SpotUs => VenueId::BinanceUs,
            BinanceDomain::Usdm => VenueId::BinanceFuturesUsd,
            BinanceDomain::Coinm => VenueId::BinanceFuturesCoin,
        };

        let base_url = config.host.clone().unwrap_or_else(|| match domain {
            BinanceDomain::SpotCom => {
                binance_domain_override().unwrap_or_else(|| HTTP_BASE_URL_SPOT_COM.to_string())
            }
            BinanceDomain::SpotUs => HTTP_BASE_URL_SPOT_US.to_string(),
            BinanceDomain::Usdm => HTTP_BASE_URL_USDM.to_string(),
            BinanceDomain::Coinm => HTTP_BASE_URL_COINM.to_string(),
        });
        let spot_base_url = match domain {
            BinanceDomain::SpotUs => HTTP_BASE_URL_SPOT_US.to_string(),
            _ => HTTP_BASE_URL_SPOT_COM.to_string(),
        };

        let rest_client = |base: String| {
            config.credentials.as_ref().map(|credentials| {
                let secret = normalize_rsa_secret(&credentials.secret);
                let hmac = hmac::Hmac::new_from_slice(secret.as_bytes())
                    .expect("ApiCredentials secret invalid length");
                RestClient::new(
                    base,
                    BinanceRequestSigner::new(
                        BinanceSigner::new(credentials.key.clone()),
                        hmac,
                        HexEncoder,
                    ),
                    BinanceParser,
                )
            })
        };

        Self {
            venue,
            domain,
            futures: config.futures,
            rest: rest_client(base_url),
            spot_rest: rest_client(spot_base_url),
            governor,
            spot_governor,
            policy: BinanceRetryPolicy::new(domain, Arc::clone(&clock), config.retry),
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

    /// Domain-surface path fork.
    fn path(&self, spot: &'static str, usdm: &'static str, coinm: &'static str) -> &'static str {
        match self.domain {
            BinanceDomain::SpotCom | BinanceDomain::SpotUs => spot,
            BinanceDomain::Usdm => usdm,
            BinanceDomain::Coinm => coinm,
        }
    }

    /// One governed, signed request against the domain surface.
    async fn issue<Params, Response>(
        &self,
        endpoint: &Endpoint,
        request: BinanceRequest<Params, Response>,
        profile: &mut TimeProfile,
    ) -> Result<Response, AttemptError>
    where
        Params: Serialize + Send + Sync,
        Response: DeserializeOwned + Send + Sync,
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

    /// Same, against the spot host (account-scoped endpoints).
    async fn issue_spot<Params, Response>(
        &self,
        endpoint: &Endpoint,
        request: BinanceRequest<Params, Response>,
        profile: &mut TimeProfile,
    ) -> Result<Response, AttemptError>
    where
        Params: Serialize + Send + Sync,
        Response: DeserializeOwned + Send + Sync,
    {
        Self::issue_on(
            &self.spot_rest,
            &self.spot_governor,
            endpoint,
            request,
            &self.clock,
            self.timeout,
            profile,
        )
        .await
    }

    async fn issue_on<Params, Response>(
        rest: &Option<BinanceRestClient>,
        governor: &Arc<BinanceGovernor>,
        endpoint: &Endpoint,
        request: BinanceRequest<Params, Response>,
        clock: &SharedClock,
        timeout: Duration,
        profile: &mut TimeProfile,
    ) -> Result<Response, AttemptError>
    where
        Params: Serialize + Send + Sync,
        Response: DeserializeOwned + Send + Sync,
    {
        let rest = rest
            .as_ref()
            .ok_or(CallError::ClientMissing("Binance"))?;

        acquire_slot(governor.as_ref(), endpoint, clock, timeout, profile).await?;

        let weight_marker = governor.weight_marker();
        let order_marker = governor.order_marker();

        let (response, meta) = rest
            .execute(request, profile)
            .await
            .map_err(AttemptError::Venue)?;

        if let Some(server_weight) = meta.header_parsed::<u64>(WEIGHT_HEADER) {
            governor.reconcile_used_weight(server_weight, weight_marker).await;
        }
        for header in ORDER_COUNT_HEADERS {
            if let Some(server_orders) = meta.header_parsed::<u64>(header) {
                governor.reconcile_order_count(server_orders, order_marker).await;
                break;
            }
        }

        Ok(response)
    }

    async fn query_order_attempt(
        &self,
        params: OrderLookupParams,
        profile: &mut TimeProfile,
    ) -> Result<BinanceOrder, AttemptError> {
        let path = self.path("/api/v3/order", "/fapi/v1/order", "/dapi/v1/order");
        self.issue(
            &endpoints::QUERY_ORDER,
            BinanceRequest::get(path, params),
            profile,
        )
        .await
    }

    /// Authoritative post-create/cancel read, tolerant of the venue's order
    /// propagation lag.
    async fn confirm_order(
        &self,
        symbol: &Symbol,
        client_order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<CanonicalOrder, CallError> {
        let raw = lookup_until_visible(
            async || {
                self.query_order_attempt(
                    OrderLookupParams {
                        symbol: SmolStr::new(symbol.name()),
                        orig_client_order_id: Some(client_order_id.clone()),
                        order_id: None,
                    },
                    profile,
                )
                .await
            },
            |error| {
                error
                    .as_venue()
                    .is_some_and(|venue| is_order_not_found(venue))
            },
        )
        .await
        .map_err(AttemptError::into_call_error)?;

        normalize::order(raw).map_err(|error| CallError::Rejected(error.message))
    }

    fn kline_limit(range: &CandleRange) -> Option<u32> {
        range.count.or(Some(500))
    }
}

fn is_order_not_found(error: &VenueError) -> bool {
    error.code == Some(CODE_ORDER_NOT_FOUND) || error.message_contains("order does not exist")
}

impl Connector for BinanceConnector {
    fn venue(&self) -> VenueId {
        self.venue
    }

    async fn get_balance(&self) -> CallOutcome<Vec<FreeAsset>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if self.is_futures() {
                let path = self.path("", "/fapi/v2/balance", "/dapi/v1/balance");
                let balances: Vec<FuturesBalance> = self
                    .issue(&endpoints::FUT_BALANCE, BinanceRequest::get(path, NoParams {}), &mut profile)
                    .await?;
                Ok(balances
                    .into_iter()
                    .map(|balance| {
                        let locked = balance.balance - balance.available_balance;
                        FreeAsset::new(balance.asset, balance.available_balance, locked)
                    })
                    .collect())
            } else {
                let account: AccountResponse = self
                    .issue(
                        &endpoints::ACCOUNT,
                        BinanceRequest::get("/api/v3/account", NoParams {}),
                        &mut profile,
                    )
                    .await?;
                Ok(account
                    .balances
                    .into_iter()
                    .map(|balance| FreeAsset::new(balance.asset, balance.free, balance.locked))
                    .collect())
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_api_permission(&self) -> CallOutcome<bool> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let futures = self.is_futures();
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let restrictions: ApiRestrictions = self
                .issue_spot(
                    &endpoints::API_RESTRICTIONS,
                    BinanceRequest::get("/sapi/v1/account/apiRestrictions", NoParams {}),
                    &mut profile,
                )
                .await?;
            Ok(if futures {
                restrictions.enable_futures
            } else {
                restrictions.enable_spot_and_margin_trading
            })
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_uid(&self) -> CallOutcome<SmolStr> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let account: AccountResponse = self
                .issue_spot(
                    &endpoints::ACCOUNT,
                    BinanceRequest::get("/api/v3/account", NoParams {}),
                    &mut profile,
                )
                .await?;
            match account.uid {
                Some(uid) => Ok(smol_str::format_smolstr!("{uid}")),
                None => Err(AttemptError::Venue(VenueError::new(
                    "account response carried no uid",
                ))),
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_affiliate(&self, uid: &str) -> CallOutcome<bool> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let agent_code = SmolStr::new(uid);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: IfNewUserResponse = self
                .issue_spot(
                    &endpoints::IF_NEW_USER,
                    BinanceRequest::get(
                        "/sapi/v1/apiReferral/ifNewUser",
                        ApiAgentParams {
                            api_agent_code: agent_code.clone(),
                        },
                    ),
                    &mut profile,
                )
                .await?;
            Ok(response.if_new_user)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn open_order(&self, request: OpenOrderRequest) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let client_order_id = request.client_order_id_or_random();
        let symbol = request.symbol.clone();
        let path = self.path("/api/v3/order", "/fapi/v1/order", "/dapi/v1/order");
        let spot = !self.is_futures();

        let params = NewOrderParams {
            symbol: SmolStr::new(symbol.name()),
            side: match request.side {
                tradegate_instrument::Side::Buy => SmolStr::new_static("BUY"),
                tradegate_instrument::Side::Sell => SmolStr::new_static("SELL"),
            },
            kind: match request.order_type {
                OrderType::Limit => SmolStr::new_static("LIMIT"),
                OrderType::Market => SmolStr::new_static("MARKET"),
            },
            time_in_force: matches!(request.order_type, OrderType::Limit)
                .then(|| SmolStr::new_static("GTC")),
            quantity: request.quantity,
            price: request.price,
            new_client_order_id: client_order_id.clone(),
            reduce_only: request.reduce_only.filter(|_| !spot),
            position_side: request.position_side.filter(|_| !spot).map(|side| {
                SmolStr::new_static(match side {
                    tradegate_instrument::PositionSide::Long => "LONG",
                    tradegate_instrument::PositionSide::Short => "SHORT",
                    tradegate_instrument::PositionSide::Both => "BOTH",
                })
            }),
            new_order_resp_type: spot.then(|| SmolStr::new_static("FULL")),
        };

        let (submitted, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, BinanceOrder>(
                &endpoints::NEW_ORDER,
                BinanceRequest::post(path, params.clone()),
                &mut profile,
            )
            .await
        })
        .await;

        // The immediate response is a minimal envelope; return the
        // authoritative order state instead.
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
                .query_order_attempt(
                    OrderLookupParams {
                        symbol: SmolStr::new(query.symbol.name()),
                        orig_client_order_id: Some(query.client_order_id.clone()),
                        order_id: None,
                    },
                    &mut profile,
                )
                .await?;
            normalize::order(raw).map_err(AttemptError::Venue)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn cancel_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let path = self.path("/api/v3/order", "/fapi/v1/order", "/dapi/v1/order");
        let (cancelled, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, BinanceOrder>(
                &endpoints::CANCEL_ORDER,
                BinanceRequest::delete(
                    path,
                    OrderLookupParams {
                        symbol: SmolStr::new(query.symbol.name()),
                        orig_client_order_id: Some(query.client_order_id.clone()),
                        order_id: None,
                    },
                ),
                &mut profile,
            )
            .await
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

        let path = self.path("/api/v3/order", "/fapi/v1/order", "/dapi/v1/order");
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let raw = self
                .issue::<_, BinanceOrder>(
                    &endpoints::CANCEL_ORDER,
                    BinanceRequest::delete(
                        path,
                        OrderLookupParams {
                            symbol: SmolStr::new(query.symbol.name()),
                            orig_client_order_id: None,
                            order_id: Some(query.order_id.clone()),
                        },
                    ),
                    &mut profile,
                )
                .await?;
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

        let path = self.path("/api/v3/openOrders", "/fapi/v1/openOrders", "/dapi/v1/openOrders");
        let params = OptionalSymbolParams {
            symbol: symbol.as_ref().map(|symbol| SmolStr::new(symbol.name())),
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let raw: Vec<BinanceOrder> = self
                .issue(
                    &endpoints::OPEN_ORDERS,
                    BinanceRequest::get(path, params.clone()),
                    &mut profile,
                )
                .await?;

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

        let path = self.path(
            "/api/v3/ticker/price",
            "/fapi/v1/ticker/price",
            "/dapi/v1/ticker/price",
        );
        let params = SymbolParams {
            symbol: SmolStr::new(symbol.name()),
        };

        let futures = self.is_futures();
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            // The futures surfaces answer symbol queries with a one-element list
            if futures {
                let tickers: Vec<BinanceTickerPrice> = self
                    .issue(&endpoints::TICKER, BinanceRequest::get(path, params.clone()), &mut profile)
                    .await?;
                tickers
                    .into_iter()
                    .next()
                    .map(|ticker| ticker.price)
                    .ok_or_else(|| {
                        AttemptError::Venue(VenueError::new("empty ticker response"))
                    })
            } else {
                let ticker: BinanceTickerPrice = self
                    .issue(&endpoints::TICKER, BinanceRequest::get(path, params.clone()), &mut profile)
                    .await?;
                Ok(ticker.price)
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_prices(&self) -> CallOutcome<Vec<TickerPrice>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let path = self.path(
            "/api/v3/ticker/price",
            "/fapi/v1/ticker/price",
            "/dapi/v1/ticker/price",
        );

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let tickers: Vec<BinanceTickerPrice> = self
                .issue(&endpoints::ALL_TICKERS, BinanceRequest::get(path, NoParams {}), &mut profile)
                .await?;
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

        let path = self.path("/api/v3/klines", "/fapi/v1/klines", "/dapi/v1/klines");

        // The coin-margined surface rejects ranges above 200 days; chunk and
        // concatenate there.
        let spans = match (self.domain, range.from, range.to) {
            (BinanceDomain::Coinm, Some(from), Some(to))
                if to - from > normalize::COINM_MAX_CANDLE_SPAN_MS =>
            {
                normalize::chunk_ranges(from, to, normalize::COINM_MAX_CANDLE_SPAN_MS)
                    .into_iter()
                    .map(|(from, to)| (Some(from), Some(to)))
                    .collect()
            }
            _ => vec![(range.from, range.to)],
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let mut candles = Vec::new();
            for (from, to) in &spans {
                let raw: Vec<RawKline> = self
                    .issue(
                        &endpoints::KLINES,
                        BinanceRequest::get(
                            path,
                            KlinesParams {
                                symbol: SmolStr::new(symbol.name()),
                                interval: SmolStr::new(normalize::interval(interval)),
                                start_time: *from,
                                end_time: *to,
                                limit: Self::kline_limit(&range),
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                for kline in raw {
                    candles.push(normalize::candle(kline).map_err(AttemptError::Venue)?);
                }
            }
            candles.sort_by_key(|candle| candle.open_time);
            Ok(candles)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_trades(&self, symbol: Symbol, limit: Option<u32>) -> CallOutcome<Vec<Trade>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let path = self.path("/api/v3/trades", "/fapi/v1/trades", "/dapi/v1/trades");
        let params = TradesParams {
            symbol: SmolStr::new(symbol.name()),
            limit,
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let raw: Vec<BinanceTrade> = self
                .issue(&endpoints::TRADES, BinanceRequest::get(path, params.clone()), &mut profile)
                .await?;
            Ok(raw.into_iter().map(normalize::trade).collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_exchange_info(&self, symbol: Symbol) -> CallOutcome<Instrument> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let path = self.path(
            "/api/v3/exchangeInfo",
            "/fapi/v1/exchangeInfo",
            "/dapi/v1/exchangeInfo",
        );

        let spot = !self.is_futures();
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            // Only the spot surface accepts a symbol parameter
            let response: ExchangeInfoResponse = if spot {
                self.issue(
                    &endpoints::EXCHANGE_INFO,
                    BinanceRequest::get(
                        path,
                        SymbolParams {
                            symbol: SmolStr::new(symbol.name()),
                        },
                    ),
                    &mut profile,
                )
                .await?
            } else {
                self.issue(&endpoints::EXCHANGE_INFO, BinanceRequest::get(path, NoParams {}), &mut profile)
                    .await?
            };

            let info = response
                .symbols
                .into_iter()
                .find(|entry| entry.symbol == symbol.name())
                .ok_or_else(|| {
                    AttemptError::Venue(VenueError::new(format!(
                        "symbol {} not found in exchange info",
                        symbol.name()
                    )))
                })?;
            normalize::instrument(info).map_err(AttemptError::Venue)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_exchange_info(&self) -> CallOutcome<Vec<Instrument>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let path = self.path(
            "/api/v3/exchangeInfo",
            "/fapi/v1/exchangeInfo",
            "/dapi/v1/exchangeInfo",
        );

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: ExchangeInfoResponse = self
                .issue(&endpoints::EXCHANGE_INFO, BinanceRequest::get(path, NoParams {}), &mut profile)
                .await?;
            response
                .symbols
                .into_iter()
                .map(|entry| normalize::instrument(entry).map_err(AttemptError::Venue))
                .collect()
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_user_fees(&self, symbol: Symbol) -> CallOutcome<UserFee> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let futures = self.is_futures();
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if futures {
                let path = self.path("", "/fapi/v1/commissionRate", "/dapi/v1/commissionRate");
                let rate: CommissionRate = self
                    .issue(
                        &endpoints::COMMISSION_RATE,
                        BinanceRequest::get(
                            path,
                            SymbolParams {
                                symbol: SmolStr::new(symbol.name()),
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                Ok(UserFee::new(
                    rate.maker_commission_rate,
                    rate.taker_commission_rate,
                ))
            } else {
                let fees: Vec<SpotTradeFee> = self
                    .issue_spot(
                        &endpoints::TRADE_FEE,
                        BinanceRequest::get(
                            "/sapi/v1/asset/tradeFee",
                            SymbolParams {
                                symbol: SmolStr::new(symbol.name()),
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                fees.into_iter()
                    .next()
                    .map(|fee| UserFee::new(fee.maker_commission, fee.taker_commission))
                    .ok_or_else(|| {
                        AttemptError::Venue(VenueError::new("empty tradeFee response"))
                    })
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_user_fees(&self) -> CallOutcome<Vec<PairUserFee>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let futures = self.is_futures();
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            if futures {
                // The commission tier is account-wide on the futures
                // surfaces; one probe prices every pair.
                let info_path = self.path("", "/fapi/v1/exchangeInfo", "/dapi/v1/exchangeInfo");
                let info: ExchangeInfoResponse = self
                    .issue(&endpoints::EXCHANGE_INFO, BinanceRequest::get(info_path, NoParams {}), &mut profile)
                    .await?;

                let Some(first) = info.symbols.first() else {
                    return Ok(Vec::new());
                };

                let rate_path = self.path("", "/fapi/v1/commissionRate", "/dapi/v1/commissionRate");
                let rate: CommissionRate = self
                    .issue(
                        &endpoints::COMMISSION_RATE,
                        BinanceRequest::get(
                            rate_path,
                            SymbolParams {
                                symbol: first.symbol.clone(),
                            },
                        ),
                        &mut profile,
                    )
                    .await?;
                let fee = UserFee::new(rate.maker_commission_rate, rate.taker_commission_rate);

                Ok(info
                    .symbols
                    .into_iter()
                    .map(|entry| PairUserFee::new(Symbol::new(entry.symbol), fee))
                    .collect())
            } else {
                let fees: Vec<SpotTradeFee> = self
                    .issue_spot(
                        &endpoints::TRADE_FEE,
                        BinanceRequest::get("/sapi/v1/asset/tradeFee", NoParams {}),
                        &mut profile,
                    )
                    .await?;
                Ok(fees
                    .into_iter()
                    .map(|fee| {
                        PairUserFee::new(
                            Symbol::new(fee.symbol),
                            UserFee::new(fee.maker_commission, fee.taker_commission),
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

        let path = self.path("", "/fapi/v1/leverage", "/dapi/v1/leverage");
        let params = LeverageParams {
            symbol: SmolStr::new(symbol.name()),
            leverage,
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, serde_json::Value>(
                &endpoints::LEVERAGE,
                BinanceRequest::post(path, params.clone()),
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

        let path = self.path("", "/fapi/v1/marginType", "/dapi/v1/marginType");
        let params = MarginTypeParams {
            symbol: SmolStr::new(symbol.name()),
            margin_type: SmolStr::new_static(match margin {
                MarginType::Isolated => "ISOLATED",
                MarginType::Crossed => "CROSSED",
            }),
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, serde_json::Value>(
                &endpoints::MARGIN_TYPE,
                BinanceRequest::post(path, params.clone()),
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

        let path = self.path("", "/fapi/v1/positionSide/dual", "/dapi/v1/positionSide/dual");
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let response: PositionSideDual = self
                .issue(&endpoints::POSITION_SIDE, BinanceRequest::get(path, NoParams {}), &mut profile)
                .await?;
            Ok(response.dual_side_position)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn set_hedge(&self, hedge: bool) -> CallOutcome<()> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let path = self.path("", "/fapi/v1/positionSide/dual", "/dapi/v1/positionSide/dual");
        let params = DualSideParams {
            dual_side_position: hedge,
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, serde_json::Value>(
                &endpoints::POSITION_SIDE,
                BinanceRequest::post(path, params.clone()),
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

        let path = self.path("", "/fapi/v2/positionRisk", "/dapi/v1/positionRisk");
        let params = OptionalSymbolParams {
            symbol: symbol.as_ref().map(|symbol| SmolStr::new(symbol.name())),
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let raw: Vec<PositionRisk> = self
                .issue(&endpoints::POSITION_RISK, BinanceRequest::get(path, params.clone()), &mut profile)
                .await?;
            Ok(raw.into_iter().map(normalize::position).collect())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn leverage_bracket(&self, symbol: Symbol) -> CallOutcome<Vec<LeverageBracket>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        if let Err(error) = self.require_futures() {
            return seal_outcome(Err(error), self.governor.as_ref(), &self.clock, profile, 0);
        }

        let path = self.path("", "/fapi/v1/leverageBracket", "/dapi/v2/leverageBracket");
        let params = SymbolParams {
            symbol: SmolStr::new(symbol.name()),
        };

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let raw: Vec<SymbolBrackets> = self
                .issue(
                    &endpoints::LEVERAGE_BRACKET,
                    BinanceRequest::get(path, params.clone()),
                    &mut profile,
                )
                .await?;
            Ok(raw
                .into_iter()
                .next()
                .map(normalize::brackets)
                .unwrap_or_default())
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }
}
