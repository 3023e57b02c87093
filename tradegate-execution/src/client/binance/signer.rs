use derive_more::Constructor;
use tradegate_integration::{
    error::TransportError,
    protocol::http::{
        private::{RequestSigner, Signer, encoder::HexEncoder},
        rest::RestRequest,
    },
};

const RECV_WINDOW: &str = "5000";

pub type BinanceRequestSigner = RequestSigner<BinanceSigner, hmac::Hmac<sha2::Sha256>, HexEncoder>;

/// Binance signs the full query string (`{params}&timestamp={ts}&recvWindow={rw}`)
/// and appends the hex HMAC as the `signature` parameter, with the API key in
/// the `X-MBX-APIKEY` header.
#[derive(Debug, Clone, Constructor)]
pub struct BinanceSigner {
    pub api_key: String,
}

#[derive(Debug)]
pub struct BinanceSignConfig<'a> {
    api_key: &'a str,
    timestamp: i64,
    params_to_sign: String,
}

impl Signer for BinanceSigner {
    type Config<'a>
        = BinanceSignConfig<'a>
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
        let timestamp = chrono::Utc::now().timestamp_millis();

        let params = match request.query_params() {
            Some(params) => serde_urlencoded::to_string(params)?,
            None => String::default(),
        };

        // The signed payload must match the final query string exactly,
        // `signature` excluded.
        let params_to_sign = if params.is_empty() {
            format!("timestamp={timestamp}&recvWindow={RECV_WINDOW}")
        } else {
            format!("{params}&timestamp={timestamp}&recvWindow={RECV_WINDOW}")
        };

        Ok(Self::Config {
            api_key: self.api_key.as_str(),
            timestamp,
            params_to_sign,
        })
    }

    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: hmac::Mac,
    {
        mac.update(config.params_to_sign.as_bytes());
    }

    fn build_signed_request(
        config: Self::Config<'_>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, TransportError> {
        const KEY_HEADER: &str = "X-MBX-APIKEY";

        builder
            .header(KEY_HEADER, config.api_key)
            .query(&[
                ("timestamp", config.timestamp.to_string().as_str()),
                ("recvWindow", RECV_WINDOW),
            ])
            .query(&[("signature", signature.as_str())])
            .build()
            .map_err(TransportError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::Mac;

    #[test]
    fn test_signature_matches_reference_vector() {
        // Reference vector from the venue's signed-endpoint documentation
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        let mut mac =
            hmac::Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }
}
