use derive_more::Constructor;
use tradegate_integration::{
    error::TransportError,
    protocol::http::{
        private::{RequestSigner, Signer, encoder::Base64Encoder},
        rest::RestRequest,
    },
};

pub type BitgetRequestSigner = RequestSigner<BitgetSigner, hmac::Hmac<sha2::Sha256>, Base64Encoder>;

/// Bitget signs `{ts_ms}{METHOD}{path_with_query}{body}` (base64 HMAC) with
/// `ACCESS-*` headers. Demo-trading instances add `paptrading: 1`.
#[derive(Debug, Clone, Constructor)]
pub struct BitgetSigner {
    pub api_key: String,
    pub passphrase: String,
    pub demo: bool,
}

#[derive(Debug)]
pub struct BitgetSignConfig<'a> {
    api_key: &'a str,
    passphrase: &'a str,
    demo: bool,
    timestamp: i64,
    method: reqwest::Method,
    path_with_query: String,
    body: Option<String>,
}

impl Signer for BitgetSigner {
    type Config<'a>
        = BitgetSignConfig<'a>
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
        let query = match request.query_params() {
            Some(params) => serde_urlencoded::to_string(params)?,
            None => String::default(),
        };
        let path_with_query = if query.is_empty() {
            request.path().into_owned()
        } else {
            format!("{}?{query}", request.path())
        };

        let body = request
            .body()
            .map(serde_json::to_string)
            .transpose()
            .map_err(TransportError::Serialise)?;

        Ok(Self::Config {
            api_key: self.api_key.as_str(),
            passphrase: self.passphrase.as_str(),
            demo: self.demo,
            timestamp: chrono::Utc::now().timestamp_millis(),
            method: request.method(),
            path_with_query,
            body,
        })
    }

    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: hmac::Mac,
    {
        mac.update(config.timestamp.to_string().as_bytes());
        mac.update(config.method.as_str().as_bytes());
        mac.update(config.path_with_query.as_bytes());
        if let Some(body) = &config.body {
            mac.update(body.as_bytes());
        }
    }

    fn build_signed_request(
        config: Self::Config<'_>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, TransportError> {
        let mut builder = builder
            .header("ACCESS-KEY", config.api_key)
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", config.timestamp)
            .header("ACCESS-PASSPHRASE", config.passphrase)
            .header("Content-Type", "application/json")
            .header("locale", "en-US");

        if config.demo {
            builder = builder.header("paptrading", "1");
        }

        builder.build().map_err(TransportError::from)
    }
}
