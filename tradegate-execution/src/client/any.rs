use super::{
    Connector, binance::BinanceConnector, bitget::BitgetConnector, bybit::BybitConnector,
    coinbase::CoinbaseConnector, kucoin::KucoinConnector, okx::OkxConnector,
};
use crate::{
    CallOutcome,
    config::ProviderConfig,
    model::{
        balance::FreeAsset,
        fee::{PairUserFee, UserFee},
        market::{Candle, CandleRange, TickerPrice, Trade},
        order::{CanonicalOrder, OpenOrderRequest, OpenOrders, OrderIdQuery, OrderQuery},
        position::{LeverageBracket, MarginType, PositionInfo},
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tradegate_instrument::{
    instrument::Instrument, interval::CandleInterval, symbol::Symbol, venue::VenueId,
};

/// Provider selector for the [`AnyConnector`] factory.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Binance,
    BinanceUs,
    Bybit,
    Bitget,
    Kucoin,
    Okx,
    Coinbase,
}

/// Runtime-selected connector behind the provider-agnostic contract.
///
/// Callers that pick the venue at runtime hold this; callers generic over
/// [`Connector`] need not.
#[derive(Debug)]
pub enum AnyConnector {
    Binance(BinanceConnector),
    Bybit(BybitConnector),
    Bitget(BitgetConnector),
    Kucoin(KucoinConnector),
    Okx(OkxConnector),
    Coinbase(CoinbaseConnector),
}

impl AnyConnector {
    /// Construct the connector for `provider` from the shared configuration.
    pub fn new(provider: Provider, config: ProviderConfig) -> Self {
        match provider {
            Provider::Binance => AnyConnector::Binance(BinanceConnector::new(config)),
            Provider::BinanceUs => AnyConnector::Binance(BinanceConnector::new_us(config)),
            Provider::Bybit => AnyConnector::Bybit(BybitConnector::new(config)),
            Provider::Bitget => AnyConnector::Bitget(BitgetConnector::new(config)),
            Provider::Kucoin => AnyConnector::Kucoin(KucoinConnector::new(config)),
            Provider::Okx => AnyConnector::Okx(OkxConnector::new(config)),
            Provider::Coinbase => AnyConnector::Coinbase(CoinbaseConnector::new(config)),
        }
    }
}

macro_rules! delegate {
    ($self:ident, $connector:ident => $body:expr) => {
        match $self {
            AnyConnector::Binance($connector) => $body,
            AnyConnector::Bybit($connector) => $body,
            AnyConnector::Bitget($connector) => $body,
            AnyConnector::Kucoin($connector) => $body,
            AnyConnector::Okx($connector) => $body,
            AnyConnector::Coinbase($connector) => $body,
        }
    };
}

impl Connector for AnyConnector {
    fn venue(&self) -> VenueId {
        delegate!(self, connector => connector.venue())
    }

    async fn get_balance(&self) -> CallOutcome<Vec<FreeAsset>> {
        delegate!(self, connector => connector.get_balance().await)
    }

    async fn get_api_permission(&self) -> CallOutcome<bool> {
        delegate!(self, connector => connector.get_api_permission().await)
    }

    async fn get_uid(&self) -> CallOutcome<SmolStr> {
        delegate!(self, connector => connector.get_uid().await)
    }

    async fn get_affiliate(&self, uid: &str) -> CallOutcome<bool> {
        delegate!(self, connector => connector.get_affiliate(uid).await)
    }

    async fn open_order(&self, request: OpenOrderRequest) -> CallOutcome<CanonicalOrder> {
        delegate!(self, connector => connector.open_order(request).await)
    }

    async fn get_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        delegate!(self, connector => connector.get_order(query).await)
    }

    async fn cancel_order(&self, query: OrderQuery) -> CallOutcome<CanonicalOrder> {
        delegate!(self, connector => connector.cancel_order(query).await)
    }

    async fn cancel_order_by_order_id(&self, query: OrderIdQuery) -> CallOutcome<CanonicalOrder> {
        delegate!(self, connector => connector.cancel_order_by_order_id(query).await)
    }

    async fn get_all_open_orders(
        &self,
        symbol: Option<Symbol>,
        return_orders: bool,
    ) -> CallOutcome<OpenOrders> {
        delegate!(self, connector => connector.get_all_open_orders(symbol, return_orders).await)
    }

    async fn latest_price(&self, symbol: Symbol) -> CallOutcome<Decimal> {
        delegate!(self, connector => connector.latest_price(symbol).await)
    }

    async fn get_all_prices(&self) -> CallOutcome<Vec<TickerPrice>> {
        delegate!(self, connector => connector.get_all_prices().await)
    }

    async fn get_candles(
        &self,
        symbol: Symbol,
        interval: CandleInterval,
        range: CandleRange,
    ) -> CallOutcome<Vec<Candle>> {
        delegate!(self, connector => connector.get_candles(symbol, interval, range).await)
    }

    async fn get_trades(&self, symbol: Symbol, limit: Option<u32>) -> CallOutcome<Vec<Trade>> {
        delegate!(self, connector => connector.get_trades(symbol, limit).await)
    }

    async fn get_exchange_info(&self, symbol: Symbol) -> CallOutcome<Instrument> {
        delegate!(self, connector => connector.get_exchange_info(symbol).await)
    }

    async fn get_all_exchange_info(&self) -> CallOutcome<Vec<Instrument>> {
        delegate!(self, connector => connector.get_all_exchange_info().await)
    }

    async fn get_user_fees(&self, symbol: Symbol) -> CallOutcome<UserFee> {
        delegate!(self, connector => connector.get_user_fees(symbol).await)
    }

    async fn get_all_user_fees(&self) -> CallOutcome<Vec<PairUserFee>> {
        delegate!(self, connector => connector.get_all_user_fees().await)
    }

    async fn change_leverage(&self, symbol: Symbol, leverage: u32) -> CallOutcome<()> {
        delegate!(self, connector => connector.change_leverage(symbol, leverage).await)
    }

    async fn change_margin_type(&self, symbol: Symbol, margin: MarginType) -> CallOutcome<()> {
        delegate!(self, connector => connector.change_margin_type(symbol, margin).await)
    }

    async fn get_hedge(&self) -> CallOutcome<bool> {
        delegate!(self, connector => connector.get_hedge().await)
    }

    async fn set_hedge(&self, hedge: bool) -> CallOutcome<()> {
        delegate!(self, connector => connector.set_hedge(hedge).await)
    }

    async fn get_positions(&self, symbol: Option<Symbol>) -> CallOutcome<Vec<PositionInfo>> {
        delegate!(self, connector => connector.get_positions(symbol).await)
    }

    async fn leverage_bracket(&self, symbol: Symbol) -> CallOutcome<Vec<LeverageBracket>> {
        delegate!(self, connector => connector.leverage_bracket(symbol).await)
    }
}
