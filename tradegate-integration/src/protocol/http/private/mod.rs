use self::encoder::Encoder;
use super::{BuildStrategy, rest::RestRequest};
use crate::error::TransportError;
use derive_more::Constructor;
use hmac::Mac;

/// Signature byte encoders (hex, base64).
pub mod encoder;

/// Venue specific signing logic.
///
/// Produces a per-request [`Self::Config`] (timestamp, canonical
/// params/body), feeds the bytes-to-sign into the [`Mac`], and assembles the
/// final signed [`reqwest::Request`].
pub trait Signer {
    type Config<'a>
    where
        Self: 'a;

    /// Derive the per-request signing configuration.
    fn config<'a, Request>(
        &'a self,
        request: Request,
        builder: &reqwest::RequestBuilder,
    ) -> Result<Self::Config<'a>, TransportError>
    where
        Request: RestRequest;

    /// Feed the canonical bytes-to-sign into the [`Mac`].
    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: Mac;

    /// Assemble the signed [`reqwest::Request`] from the configuration and
    /// encoded signature.
    fn build_signed_request(
        config: Self::Config<'_>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, TransportError>;
}

/// [`BuildStrategy`] that signs every [`RestRequest`] with venue specific
/// [`Signer`] logic, a cloneable [`Mac`], and a signature [`Encoder`].
#[derive(Debug, Clone, Constructor)]
pub struct RequestSigner<Sig, Hmac, SignatureEncoder> {
    signer: Sig,
    mac: Hmac,
    encoder: SignatureEncoder,
}

impl<Sig, Hmac, SignatureEncoder> BuildStrategy for RequestSigner<Sig, Hmac, SignatureEncoder>
where
    Sig: Signer,
    Hmac: Mac + Clone,
    SignatureEncoder: Encoder,
{
    fn build<Request>(
        &self,
        request: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, TransportError>
    where
        Request: RestRequest,
    {
        let config = self.signer.config(request, &builder)?;

        let mut mac = self.mac.clone();
        Sig::add_bytes_to_sign(&mut mac, &config);
        let signature = self.encoder.encode(mac.finalize().into_bytes());

        Sig::build_signed_request(config, builder, signature)
    }
}
