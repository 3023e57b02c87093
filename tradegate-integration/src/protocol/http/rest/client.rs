use crate::{
    error::TransportError,
    profile::TimeProfile,
    protocol::http::{BuildStrategy, HttpParser, rest::RestRequest},
};
use chrono::Utc;
use reqwest::header::HeaderMap;
use std::borrow::Cow;

/// Selected response envelope metadata surfaced alongside every parsed
/// response.
///
/// Venues report authoritative rate usage in response headers
/// (eg/ Binance `X-MBX-USED-WEIGHT-1M`); governors reconcile their local
/// ledgers against these.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: reqwest::StatusCode,
    pub headers: HeaderMap,
}

impl ResponseMeta {
    /// Read a header as the given type, ignoring malformed values.
    pub fn header_parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    }
}

/// Configurable REST client capable of executing signed [`RestRequest`]s. Each venue requires
/// a specific combination of [`Signer`](super::super::private::Signer), [`Mac`](hmac::Mac),
/// signature [`Encoder`](super::super::private::encoder::Encoder), and [`HttpParser`].
#[derive(Debug)]
pub struct RestClient<'a, Strategy, Parser> {
    /// HTTP [`reqwest::Client`] for executing signed [`reqwest::Request`]s.
    pub http_client: reqwest::Client,

    /// Base Url of the venue being interacted with.
    pub base_url: Cow<'a, str>,

    /// [`RestRequest`] build strategy for the venue that implements [`BuildStrategy`].
    pub strategy: Strategy,

    /// [`HttpParser`] that deserialises [`RestRequest::Response`]s, and upon failure parses
    /// venue errors returned from the server.
    pub parser: Parser,
}

impl<Strategy, Parser> RestClient<'_, Strategy, Parser>
where
    Strategy: BuildStrategy,
    Parser: HttpParser,
{
    /// Execute the provided [`RestRequest`], stamping the on-wire phase of
    /// the call's [`TimeProfile`].
    pub async fn execute<Request>(
        &self,
        request: Request,
        profile: &mut TimeProfile,
    ) -> Result<(Request::Response, ResponseMeta), Parser::OutputError>
    where
        Request: RestRequest,
    {
        // Use provided Request to construct a signed reqwest::Request
        let request = self.build(request)?;

        // Measure request execution
        profile.stamp_exchange_start(Utc::now().timestamp_millis());
        let result = self.http_client.execute(request).await;
        profile.stamp_exchange_end(Utc::now().timestamp_millis());

        let response = result.map_err(TransportError::from)?;
        let meta = ResponseMeta {
            status: response.status(),
            headers: response.headers().clone(),
        };
        let payload = response.bytes().await.map_err(TransportError::from)?;

        // Attempt to parse venue Success or Error response
        self.parser
            .parse::<Request::Response>(meta.status, &payload)
            .map(|response| (response, meta))
    }

    /// Use the provided [`RestRequest`] to construct a signed Http [`reqwest::Request`].
    pub fn build<Request>(&self, request: Request) -> Result<reqwest::Request, TransportError>
    where
        Request: RestRequest,
    {
        // Construct url
        let url = format!("{}{}", self.base_url, request.path());

        // Construct RequestBuilder with method & url
        let mut builder = self
            .http_client
            .request(request.method(), url)
            .timeout(Request::timeout());

        // Add optional query parameters
        if let Some(query_params) = request.query_params() {
            builder = builder.query(query_params);
        }

        // Add optional Body
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        // Use RequestBuilder (public or private strategy) to build reqwest::Request
        self.strategy.build(request, builder)
    }
}

impl<'a, Strategy, Parser> RestClient<'a, Strategy, Parser> {
    /// Construct a new [`Self`] using the provided configuration.
    pub fn new<Url: Into<Cow<'a, str>>>(base_url: Url, strategy: Strategy, parser: Parser) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            strategy,
            parser,
        }
    }
}
