use derive_more::Constructor;
use tradegate_integration::{
    error::TransportError,
    protocol::http::{
        private::{RequestSigner, Signer, encoder::HexEncoder},
        rest::RestRequest,
    },
};

pub type CoinbaseRequestSigner =
    RequestSigner<CoinbaseSigner, hmac::Hmac<sha2::Sha256>, HexEncoder>;

/// Coinbase signs `{ts_seconds}{METHOD}{path}{body}` (hex HMAC) with
/// `CB-ACCESS-*` headers. The query string is excluded from the signature.
#[derive(Debug, Clone, Constructor)]
pub struct CoinbaseSigner {
    pub api_key: String,
}

#[derive(Debug)]
pub struct CoinbaseSignConfig<'a> {
    api_key: &'a str,
    timestamp: i64,
    method: reqwest::Method,
    path: String,
    body: Option<String>,
}

impl Signer for CoinbaseSigner {
    type Config<'a>
        = CoinbaseSignConfig<'a>
    where
        Self: 'a;

    fn config<'a, Request>(
        &'a self,
        request: Request,
        _builder: &reqwest::RequestBuilder,
    ) -> Result<Self::Config<'a>, TransportError>
    where
        Request: RestRequest,
    {
        let body = request
            .body()
            .map(serde_json::to_string)
            .transpose()
            .map_err(TransportError::Serialise)?;

        Ok(Self::Config {
            api_key: self.api_key.as_str(),
            timestamp: chrono::Utc::now().timestamp(),
            method: request.method(),
            path: request.path().into_owned(),
            body,
        })
    }

    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: hmac::Mac,
    {
        mac.update(config.timestamp.to_string().as_bytes());
        mac.update(config.method.as_str().as_bytes());
        mac.update(config.path.as_bytes());
        if let Some(body) = &config.body {
            mac.update(body.as_bytes());
        }
    }

    fn build_signed_request(
        config: Self::Config<'_>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, TransportError> {
        builder
            .header("CB-ACCESS-KEY", config.api_key)
            .header("CB-ACCESS-SIGN", signature)
            .header("CB-ACCESS-TIMESTAMP", config.timestamp)
            .build()
            .map_err(TransportError::from)
    }
}
