use super::BuildStrategy;
use crate::error::TransportError;

/// [`RestRequest`](super::rest::RestRequest) [`BuildStrategy`] that builds a
/// non-authenticated Http request with no headers.
#[derive(Debug, Copy, Clone)]
pub struct PublicNoHeaders;

impl BuildStrategy for PublicNoHeaders {
    fn build<Request>(
        &self,
        _: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, TransportError> {
        builder.build().map_err(TransportError::from)
    }
}
