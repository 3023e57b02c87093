use derive_more::Constructor;
use tradegate_integration::{
    error::TransportError,
    protocol::http::{
        private::{RequestSigner, Signer, encoder::Base64Encoder},
        rest::RestRequest,
    },
};

pub type KucoinRequestSigner = RequestSigner<KucoinSigner, hmac::Hmac<sha2::Sha256>, Base64Encoder>;

/// KuCoin signs `{ts_ms}{METHOD}{path_with_query}{body}` (base64 HMAC) and
/// sends a v2 key set: the passphrase itself is HMAC-signed once at
/// construction and carried in `KC-API-PASSPHRASE`.
#[derive(Debug, Clone, Constructor)]
pub struct KucoinSigner {
    pub api_key: String,
    pub encrypted_passphrase: String,
}

#[derive(Debug)]
pub struct KucoinSignConfig<'a> {
    api_key: &'a str,
    encrypted_passphrase: &'a str,
    timestamp: i64,
    method: reqwest::Method,
    path_with_query: String,
    body: Option<String>,
}

impl Signer for KucoinSigner {
    type Config<'a>
        = KucoinSignConfig<'a>
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
            encrypted_passphrase: self.encrypted_passphrase.as_str(),
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
        builder
            .header("KC-API-KEY", config.api_key)
            .header("KC-API-SIGN", signature)
            .header("KC-API-TIMESTAMP", config.timestamp)
            .header("KC-API-PASSPHRASE", config.encrypted_passphrase)
            .header("KC-API-KEY-VERSION", "2")
            .build()
            .map_err(TransportError::from)
    }
}

/// Sign the passphrase for the v2 header, done once per client.
pub fn encrypt_passphrase(secret: &str, passphrase: &str) -> String {
    use base64::Engine;
    use hmac::Mac;

    let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes())
        .expect("ApiCredentials secret invalid length");
    mac.update(passphrase.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}
