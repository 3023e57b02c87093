use self::{
    parser::OkxParser,
    requests::{
        AccountConfig, BalanceEnvelope, CandlesParams, InstParams, InstrumentEntry, OkxHttpResponse,
        OkxOrder, OkxRequest, OrderAck, OrderLookupParams, PlaceOrderBody, PositionEntry,
        PositionTier, PublicTrade, RawOkxCandle, SetLeverageBody, SetPositionModeBody, TickerEntry,
        TradeFee, UidParams,
    },
    signer::{OkxRequestSigner, OkxSigner},
};
use super::{Connector, acquire_slot, lookup_until_visible, seal_outcome};
use crate::{
    CallOutcome,
    config::{ProviderConfig, okx_sandbox_from_env},
    error::{CallError, VenueError},
    governor::{Endpoint, okx::OkxGovernor, registry},
    model::{
        balance::FreeAsset,
        fee::{PairUserFee, UserFee},
        market::{Candle, CandleRange, TickerPrice, Trade},
        order::{CanonicalOrder, OpenOrderRequest, OpenOrders, OrderIdQuery, OrderQuery},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
    retry::{AttemptError, okx::OkxRetryPolicy, with_retry},
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

const HTTP_BASE_URL: &str = "https://www.okx.com";

/// Ranges wider than this many bars route to the history endpoint.
const MAX_RECENT_BARS: i64 = 1_400;

mod endpoints {
    use super::Endpoint;

    pub const BALANCE: Endpoint = Endpoint::request("account/balance", 10);
    pub const CONFIG: Endpoint = Endpoint::request("account/config", 5);
    pub const AFFILIATE: Endpoint = Endpoint::request("affiliate/invitee-detail", 20);
    pub const TRADE_FEE: Endpoint = Endpoint::request("account/trade-fee", 5);
    pub const PLACE_ORDER: Endpoint = Endpoint::order("trade/order", 60);
    pub const CANCEL_ORDER: Endpoint = Endpoint::order("trade/cancel-order", 60);
    pub const QUERY_ORDER: Endpoint = Endpoint::request("trade/order.get", 60);
    pub const ORDERS_PENDING: Endpoint = Endpoint::request("trade/orders-pending", 60);
    pub const TICKER: Endpoint = Endpoint::request("market/ticker", 20);
    pub const TICKERS: Endpoint = Endpoint::request("market/tickers", 20);
    pub const CANDLES: Endpoint = Endpoint::request("market/candles", 40);
    pub const HISTORY_CANDLES: Endpoint = Endpoint::request("market/history-candles", 20);
    pub const TRADES: Endpoint = Endpoint::request("market/trades", 100);
    pub const INSTRUMENTS: Endpoint = Endpoint::request("public/instruments", 20);
    pub const POSITIONS: Endpoint = Endpoint::request("account/positions", 10);
    pub const SET_LEVERAGE: Endpoint = Endpoint::request("account/set-leverage", 20);
    pub const SET_POSITION_MODE: Endpoint = Endpoint::request("account/set-position-mode", 5);
    pub const POSITION_TIERS: Endpoint = Endpoint::request("public/position-tiers", 10);
}

type OkxRestClient = RestClient<'static, OkxRequestSigner, OkxParser>;

/// OKX V5 connector. No spot/futures fork: the same client serves both,
/// with `instId`/`instType` selecting the product and `-SWAP` symbol
/// translation for derivatives.
#[derive(Debug)]
pub struct OkxConnector {
    futures: FuturesMode,
    rest: Option<OkxRestClient>,
    governor: Arc<OkxGovernor>,
    policy: OkxRetryPolicy,
    clock: SharedClock,
    timeout: Duration,
}

impl OkxConnector {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_parts(config, registry::okx(), system_clock())
    }

    pub fn with_parts(
        config: ProviderConfig,
        governor: Arc<OkxGovernor>,
        clock: SharedClock,
    ) -> Self {
        let base_url = config
            .host
            .clone()
            .unwrap_or_else(|| HTTP_BASE_URL.to_string());
        let simulated = config.demo || okx_sandbox_from_env();

        let rest = config.credentials.as_ref().map(|credentials| {
            let hmac = hmac::Hmac::new_from_slice(credentials.secret.as_bytes())
                .expect("ApiCredentials secret invalid length");
            RestClient::new(
                base_url,
                OkxRequestSigner::new(
                    OkxSigner::new(
                        credentials.key.clone(),
                        config.passphrase.clone().unwrap_or_default(),
                        simulated,
                    ),
                    hmac,
                    Base64Encoder,
                ),
                OkxParser,
            )
        });

        Self {
            futures: config.futures,
            rest,
            governor,
            policy: OkxRetryPolicy::new(config.retry),
            clock,
            timeout: config.timeout,
        }
    }

    fn inst_type(&self) -> SmolStr {
        SmolStr::new_static(if self.futures.is_futures() {
            "SWAP"
        } else {
            "SPOT"
        })
    }

    fn td_mode(&self) -> SmolStr {
        SmolStr::new_static(if self.futures.is_futures() {
            "cross"
        } else {
            "cash"
        })
    }

    fn inst_id(&self, symbol: &Symbol) -> SmolStr {
        SmolStr::new(normalize::encode_symbol(symbol, self.futures).name())
    }

    fn require_futures(&self) -> Result<(), CallError> {
        if self.futures.is_futures() {
            Ok(())
        } else {
            Err(CallError::FuturesModeMissing)
        }
    }

    async fn issue<Params, Item>(
        &self,
        endpoint: &Endpoint,
        request: OkxRequest<Params, Item>,
        timeout: Duration,
        profile: &mut TimeProfile,
    ) -> Result<Vec<Item>, AttemptError>
    where
        Params: Serialize + Send + Sync,
        Item: DeserializeOwned + Send + Sync,
    {
        let rest = self.rest.as_ref().ok_or(CallError::ClientMissing("OKX"))?;

        acquire_slot(self.governor.as_ref(), endpoint, &self.clock, timeout, profile).await?;

        let (response, _meta): (OkxHttpResponse<Item>, _) = rest
            .execute(request, profile)
            .await
            .map_err(AttemptError::Venue)?;

        if response.code != "0" {
            return Err(AttemptError::Venue(VenueError {
                code: response.code.parse().ok(),
                status: None,
                message: response.msg,
                created_order_id: None,
            }));
        }

        Ok(response.data)
    }

    /// Order placement/cancel acks carry a second, per-item result code.
    fn check_ack(ack: OrderAck) -> Result<OrderAck, AttemptError> {
        if ack.s_code != "0" && !ack.s_code.is_empty() {
            return Err(AttemptError::Venue(VenueError {
                code: ack.s_code.parse().ok(),
                status: None,
                message: ack.s_msg,
                created_order_id: None,
            }));
        }
        Ok(ack)
    }

    async fn query_order_attempt(
        &self,
        inst_id: &SmolStr,
        client_order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<OkxOrder, AttemptError> {
        let orders: Vec<OkxOrder> = self
            .issue(
                &endpoints::QUERY_ORDER,
                OkxRequest::get(
                    "/api/v5/trade/order",
                    OrderLookupParams {
                        inst_id: inst_id.clone(),
                        cl_ord_id: Some(client_order_id.clone()),
                        ord_id: None,
                    },
                ),
                self.timeout,
                profile,
            )
            .await?;
        orders
            .into_iter()
            .next()
            .ok_or_else(|| AttemptError::Venue(VenueError::new("Order does not exist")))
    }

    async fn confirm_order(
        &self,
        inst_id: &SmolStr,
        client_order_id: &SmolStr,
        profile: &mut TimeProfile,
    ) -> Result<CanonicalOrder, CallError> {
        let raw = lookup_until_visible(
            async || self.query_order_attempt(inst_id, client_order_id, profile).await,
            |error: &AttemptError| {
                error.as_venue().is_some_and(|venue| {
                    venue.message_contains("order does not exist") || venue.code == Some(51603)
                })
            },
        )
        .await
        .map_err(AttemptError::into_call_error)?;

        normalize::order(raw).map_err(|error| CallError::Rejected(error.message))
    }
}

impl Connector for OkxConnector {
    fn venue(&self) -> VenueId {
        VenueId::Okx
    }

    async fn get_balance(&self) -> CallOutcome<Vec<FreeAsset>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let envelopes: Vec<BalanceEnvelope> = self
                .issue(
                    &endpoints::BALANCE,
                    OkxRequest::get("/api/v5/account/balance", NoParams {}),
                    self.timeout,
                    &mut profile,
                )
                .await?;

            envelopes
                .into_iter()
                .flat_map(|envelope| envelope.details)
                .map(|detail| {
                    let free = parse_decimal(&detail.avail_bal)?;
                    let locked = parse_decimal(&detail.frozen_bal)?;
                    Ok(FreeAsset::new(detail.ccy, free, locked))
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
            let configs: Vec<AccountConfig> = self
                .issue(
                    &endpoints::CONFIG,
                    OkxRequest::get("/api/v5/account/config", NoParams {}),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            Ok(configs
                .first()
                .is_some_and(|config| config.perm.contains("trade")))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_uid(&self) -> CallOutcome<SmolStr> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let configs: Vec<AccountConfig> = self
                .issue(
                    &endpoints::CONFIG,
                    OkxRequest::get("/api/v5/account/config", NoParams {}),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            configs
                .into_iter()
                .next()
                .map(|config| config.uid)
                .ok_or_else(|| AttemptError::Venue(VenueError::new("empty account config")))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_affiliate(&self, uid: &str) -> CallOutcome<bool> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let uid = SmolStr::new(uid);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let result: Result<Vec<serde_json::Value>, AttemptError> = self
                .issue(
                    &endpoints::AFFILIATE,
                    OkxRequest::get(
                        "/api/v5/affiliate/invitee/detail",
                        UidParams { uid: uid.clone() },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await;

            match result {
                Ok(data) => Ok(!data.is_empty()),
                // The venue answers with a dedicated code for "not an invitee"
                Err(AttemptError::Venue(error)) if error.code == Some(58002) => Ok(false),
                Err(error) => Err(error),
            }
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn open_order(&self, request: OpenOrderRequest) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let client_order_id = request.client_order_id_or_random();
        let inst_id = self.inst_id(&request.symbol);

        let body = PlaceOrderBody {
            inst_id: inst_id.clone(),
            td_mode: self.td_mode(),
            cl_ord_id: client_order_id.clone(),
            side: SmolStr::new_static(match request.side {
                Side::Buy => "buy",
                Side::Sell => "sell",
            }),
            ord_type: SmolStr::new_static(match request.order_type {
                OrderType::Limit => "limit",
                OrderType::Market => "market",
            }),
            sz: request.quantity,
            px: request.price,
            pos_side: request
                .position_side
                .filter(|_| self.futures.is_futures())
                .map(|side| {
                    SmolStr::new_static(match side {
                        tradegate_instrument::PositionSide::Long => "long",
                        tradegate_instrument::PositionSide::Short => "short",
                        tradegate_instrument::PositionSide::Both => "net",
                    })
                }),
            reduce_only: request.reduce_only.filter(|_| self.futures.is_futures()),
        };

        let (submitted, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let acks: Vec<OrderAck> = self
                .issue(
                    &endpoints::PLACE_ORDER,
                    OkxRequest::post("/api/v5/trade/order", body.clone()),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            let ack = acks
                .into_iter()
                .next()
                .ok_or_else(|| AttemptError::Venue(VenueError::new("empty order ack")))?;
            Self::check_ack(ack)
        })
        .await;

        let result = match submitted {
            Ok(_) => self.confirm_order(&inst_id, &client_order_id, &mut profile).await,
            Err(error) => Err(error),
        };

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let inst_id = self.inst_id(&query.symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let raw = self
                .query_order_attempt(&inst_id, &query.client_order_id, &mut profile)
                .await?;
            normalize::order(raw).map_err(AttemptError::Venue)
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn cancel_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let inst_id = self.inst_id(&query.symbol);
        let (cancelled, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let acks: Vec<OrderAck> = self
                .issue(
                    &endpoints::CANCEL_ORDER,
                    OkxRequest::post(
                        "/api/v5/trade/cancel-order",
                        OrderLookupParams {
                            inst_id: inst_id.clone(),
                            cl_ord_id: Some(query.client_order_id.clone()),
                            ord_id: None,
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            let ack = acks
                .into_iter()
                .next()
                .ok_or_else(|| AttemptError::Venue(VenueError::new("empty cancel ack")))?;
            Self::check_ack(ack)
        })
        .await;

        let result = match cancelled {
            Ok(_) => self.confirm_order(&inst_id, &query.client_order_id, &mut profile).await,
            Err(error) => Err(error),
        };

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn cancel_order_by_order_id(&self, query: OrderIdQuery) -> CallOutcome<CanonicalOrder> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let inst_id = self.inst_id(&query.symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let acks: Vec<OrderAck> = self
                .issue(
                    &endpoints::CANCEL_ORDER,
                    OkxRequest::post(
                        "/api/v5/trade/cancel-order",
                        OrderLookupParams {
                            inst_id: inst_id.clone(),
                            cl_ord_id: None,
                            ord_id: Some(query.order_id.clone()),
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            let ack = acks
                .into_iter()
                .next()
                .ok_or_else(|| AttemptError::Venue(VenueError::new("empty cancel ack")))?;
            Self::check_ack(ack)?;

            let orders: Vec<OkxOrder> = self
                .issue(
                    &endpoints::QUERY_ORDER,
                    OkxRequest::get(
                        "/api/v5/trade/order",
                        OrderLookupParams {
                            inst_id: inst_id.clone(),
                            cl_ord_id: None,
                            ord_id: Some(query.order_id.clone()),
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            let raw = orders
                .into_iter()
                .next()
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

        let inst_id = symbol.as_ref().map(|symbol| self.inst_id(symbol));
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let orders: Vec<OkxOrder> = self
                .issue(
                    &endpoints::ORDERS_PENDING,
                    OkxRequest::get(
                        "/api/v5/trade/orders-pending",
                        InstParams {
                            inst_id: inst_id.clone(),
                            inst_type: Some(self.inst_type()),
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;

            if !return_orders {
                return Ok(OpenOrders::Count(orders.len() as u32));
            }

            let orders = orders
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

        let inst_id = self.inst_id(&symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let tickers: Vec<TickerEntry> = self
                .issue(
                    &endpoints::TICKER,
                    OkxRequest::get(
                        "/api/v5/market/ticker",
                        InstParams {
                            inst_id: Some(inst_id.clone()),
                            inst_type: None,
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            tickers
                .into_iter()
                .next()
                .map(|ticker| ticker.last)
                .ok_or_else(|| AttemptError::Venue(VenueError::new("empty ticker response")))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_prices(&self) -> CallOutcome<Vec<TickerPrice>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let tickers: Vec<TickerEntry> = self
                .issue(
                    &endpoints::TICKERS,
                    OkxRequest::get(
                        "/api/v5/market/tickers",
                        InstParams {
                            inst_id: None,
                            inst_type: Some(self.inst_type()),
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
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

        let bar = match normalize::interval(interval) {
            Ok(bar) => bar,
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

        // Wide ranges live on the history endpoint; the recent endpoint only
        // holds the newest ~1400 bars.
        let use_history = matches!(
            (range.from, range.to),
            (Some(from), Some(to)) if to - from > interval.millis() * MAX_RECENT_BARS
        );
        let (endpoint, path) = if use_history {
            (&endpoints::HISTORY_CANDLES, "/api/v5/market/history-candles")
        } else {
            (&endpoints::CANDLES, "/api/v5/market/candles")
        };

        let inst_id = self.inst_id(&symbol);
        // Candle queries get double the usual deadline
        let timeout = self.timeout * 2;

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let rows: Vec<RawOkxCandle> = self
                .issue(
                    endpoint,
                    OkxRequest::get(
                        path,
                        CandlesParams {
                            inst_id: inst_id.clone(),
                            bar: SmolStr::new(bar),
                            after: range.to,
                            before: range.from,
                            limit: range.count,
                        },
                    ),
                    timeout,
                    &mut profile,
                )
                .await?;

            // Newest-first on the wire; ascending for callers
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

    async fn get_trades(&self, symbol: Symbol, limit: Option<u32>) -> CallOutcome<Vec<Trade>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let inst_id = self.inst_id(&symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let trades: Vec<PublicTrade> = self
                .issue(
                    &endpoints::TRADES,
                    OkxRequest::get(
                        "/api/v5/market/trades",
                        TradesParams {
                            inst_id: inst_id.clone(),
                            limit,
                        },
                    ),
                    self.timeout,
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

        let inst_id = self.inst_id(&symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let instruments: Vec<InstrumentEntry> = self
                .issue(
                    &endpoints::INSTRUMENTS,
                    OkxRequest::get(
                        "/api/v5/public/instruments",
                        InstParams {
                            inst_id: Some(inst_id.clone()),
                            inst_type: Some(self.inst_type()),
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            let entry = instruments.into_iter().next().ok_or_else(|| {
                AttemptError::Venue(VenueError::new(format!(
                    "instrument {inst_id} not found"
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
            let instruments: Vec<InstrumentEntry> = self
                .issue(
                    &endpoints::INSTRUMENTS,
                    OkxRequest::get(
                        "/api/v5/public/instruments",
                        InstParams {
                            inst_id: None,
                            inst_type: Some(self.inst_type()),
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            instruments
                .into_iter()
                .map(|entry| normalize::instrument(entry).map_err(AttemptError::Venue))
                .collect()
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_user_fees(&self, symbol: Symbol) -> CallOutcome<UserFee> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let inst_id = self.inst_id(&symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let fees: Vec<TradeFee> = self
                .issue(
                    &endpoints::TRADE_FEE,
                    OkxRequest::get(
                        "/api/v5/account/trade-fee",
                        FeeParams {
                            inst_type: self.inst_type(),
                            inst_id: Some(inst_id.clone()),
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            fees.into_iter()
                .next()
                // The venue reports rebates as negative rates
                .map(|fee| UserFee::new(fee.maker.abs(), fee.taker.abs()))
                .ok_or_else(|| AttemptError::Venue(VenueError::new("empty trade-fee response")))
        })
        .await;

        seal_outcome(result, self.governor.as_ref(), &self.clock, profile, attempts)
    }

    async fn get_all_user_fees(&self) -> CallOutcome<Vec<PairUserFee>> {
        let mut profile = TimeProfile::start(self.clock.now_ms());

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            // Fee tier is account-wide per instrument family
            let fees: Vec<TradeFee> = self
                .issue(
                    &endpoints::TRADE_FEE,
                    OkxRequest::get(
                        "/api/v5/account/trade-fee",
                        FeeParams {
                            inst_type: self.inst_type(),
                            inst_id: None,
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            let fee = fees
                .into_iter()
                .next()
                .map(|fee| UserFee::new(fee.maker.abs(), fee.taker.abs()))
                .ok_or_else(|| AttemptError::Venue(VenueError::new("empty trade-fee response")))?;

            let instruments: Vec<InstrumentEntry> = self
                .issue(
                    &endpoints::INSTRUMENTS,
                    OkxRequest::get(
                        "/api/v5/public/instruments",
                        InstParams {
                            inst_id: None,
                            inst_type: Some(self.inst_type()),
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;

            Ok(instruments
                .into_iter()
                .map(|entry| PairUserFee::new(normalize::decode_symbol(&entry.inst_id), fee))
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

        let inst_id = self.inst_id(&symbol);
        let lever = smol_str::format_smolstr!("{leverage}");
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            self.issue::<_, serde_json::Value>(
                &endpoints::SET_LEVERAGE,
                OkxRequest::post(
                    "/api/v5/account/set-leverage",
                    SetLeverageBody {
                        inst_id: inst_id.clone(),
                        lever: lever.clone(),
                        mgn_mode: SmolStr::new_static("cross"),
                    },
                ),
                self.timeout,
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

        let inst_id = self.inst_id(&symbol);
        let mgn_mode = SmolStr::new_static(match margin {
            MarginType::Isolated => "isolated",
            MarginType::Crossed => "cross",
        });

        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            // Margin posture is carried by set-leverage; restate the live
            // leverage under the new mode.
            let positions: Vec<PositionEntry> = self
                .issue(
                    &endpoints::POSITIONS,
                    OkxRequest::get(
                        "/api/v5/account/positions",
                        InstParams {
                            inst_id: Some(inst_id.clone()),
                            inst_type: None,
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            let lever = positions
                .first()
                .map(|position| position.lever.clone())
                .filter(|lever| !lever.is_empty())
                .unwrap_or_else(|| SmolStr::new_static("10"));

            self.issue::<_, serde_json::Value>(
                &endpoints::SET_LEVERAGE,
                OkxRequest::post(
                    "/api/v5/account/set-leverage",
                    SetLeverageBody {
                        inst_id: inst_id.clone(),
                        lever,
                        mgn_mode: mgn_mode.clone(),
                    },
                ),
                self.timeout,
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
            let configs: Vec<AccountConfig> = self
                .issue(
                    &endpoints::CONFIG,
                    OkxRequest::get("/api/v5/account/config", NoParams {}),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            Ok(configs
                .first()
                .is_some_and(|config| config.pos_mode == "long_short_mode"))
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
                &endpoints::SET_POSITION_MODE,
                OkxRequest::post(
                    "/api/v5/account/set-position-mode",
                    SetPositionModeBody {
                        pos_mode: SmolStr::new_static(if hedge {
                            "long_short_mode"
                        } else {
                            "net_mode"
                        }),
                    },
                ),
                self.timeout,
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

        let inst_id = symbol.as_ref().map(|symbol| self.inst_id(symbol));
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let positions: Vec<PositionEntry> = self
                .issue(
                    &endpoints::POSITIONS,
                    OkxRequest::get(
                        "/api/v5/account/positions",
                        InstParams {
                            inst_id: inst_id.clone(),
                            inst_type: Some(self.inst_type()),
                        },
                    ),
                    self.timeout,
                    &mut profile,
                )
                .await?;
            positions
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

        let inst_id = self.inst_id(&symbol);
        let (result, attempts) = with_retry(&self.policy, self.governor.as_ref(), async |_| {
            let tiers: Vec<PositionTier> = self
                .issue(
                    &endpoints::POSITION_TIERS,
                    OkxRequest::get(
                        "/api/v5/public/position-tiers",
                        TierParams {
                            inst_type: self.inst_type(),
                            inst_id: inst_id.clone(),
                            td_mode: SmolStr::new_static("cross"),
                        },
                    ),
                    self.timeout,
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

fn parse_decimal(raw: &str) -> Result<Decimal, VenueError> {
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    raw.parse()
        .map_err(|error| VenueError::new(format!("error parsing decimal {raw:?}: {error}")))
}

#[derive(Debug, Clone, Serialize)]
struct TradesParams {
    #[serde(rename = "instId")]
    inst_id: SmolStr,

    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct FeeParams {
    #[serde(rename = "instType")]
    inst_type: SmolStr,

    #[serde(rename = "instId", skip_serializing_if = "Option::is_none")]
    inst_id: Option<SmolStr>,
}

#[derive(Debug, Clone, Serialize)]
struct TierParams {
    #[serde(rename = "instType")]
    inst_type: SmolStr,

    #[serde(rename = "instId")]
    inst_id: SmolStr,

    #[serde(rename = "tdMode")]
    td_mode: SmolStr,
}
