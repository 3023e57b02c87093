use derive_more::Constructor;
use tradegate_integration::{
    error::TransportError,
    protocol::http::{
        private::{RequestSigner, Signer, encoder::Base64Encoder},
        rest::RestRequest,
    },
};

pub type OkxRequestSigner = RequestSigner<OkxSigner, hmac::Hmac<sha2::Sha256>, Base64Encoder>;

/// OKX signs `{iso_timestamp}{METHOD}{path_with_query}{body}` and carries the
/// base64 HMAC in `OK-ACCESS-SIGN`, alongside key, timestamp and passphrase
/// headers. Sandbox instances add `x-simulated-trading: 1`.
#[derive(Debug, Clone, Constructor)]
pub struct OkxSigner {
    pub api_key: String,
    pub passphrase: String,
    pub simulated: bool,
}

#[derive(Debug)]
pub struct OkxSignConfig<'a> {
    api_key: &'a str,
    passphrase: &'a str,
    simulated: bool,
    timestamp: String,
    method: reqwest::Method,
    path_with_query: String,
    body: Option<String>,
}

impl Signer for OkxSigner {
    type Config<'a>
        = OkxSignConfig<'a>
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
            simulated: self.simulated,
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            method: request.method(),
            path_with_query,
            body,
        })
    }

    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: hmac::Mac,
    {
        mac.update(config.timestamp.as_bytes());
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
            .header("OK-ACCESS-KEY", config.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", config.timestamp)
            .header("OK-ACCESS-PASSPHRASE", config.passphrase);

        if config.simulated {
            builder = builder.header("x-simulated-trading", "1");
        }

        builder.build().map_err(TransportError::from)
    }
}
