use crate::error::VenueError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tradegate_integration::protocol::http::HttpParser;

/// Error envelope. Order placement failures wrap their detail in
/// `error_response`, and a failed HTTP exchange can still carry a
/// `success_response.order_id` when the order itself was accepted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CoinbaseHttpApiError {
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub error_response: Option<CoinbaseErrorDetail>,

    #[serde(default)]
    pub success_response: Option<CoinbaseSuccessDetail>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CoinbaseErrorDetail {
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CoinbaseSuccessDetail {
    #[serde(default)]
    pub order_id: Option<SmolStr>,
}

#[derive(Debug, Clone)]
pub struct CoinbaseParser;

impl HttpParser for CoinbaseParser {
    type ApiError = CoinbaseHttpApiError;
    type OutputError = VenueError;

    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        let detail = error.error_response.unwrap_or_default();
        let message = error
            .message
            .or(detail.message)
            .or(error.error)
            .or(detail.error)
            .unwrap_or_else(|| format!("HTTP {status}"));

        VenueError {
            code: None,
            status: Some(status.as_u16()),
            message,
            // The write may have landed despite the failed exchange; the
            // facade must look it up instead of re-submitting.
            created_order_id: error.success_response.and_then(|success| success.order_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_order_id_survives_error_parse() {
        let raw = r#"{
            "success": false,
            "error": "unknown",
            "success_response": {"order_id": "1111-2222"},
            "error_response": {"message": "gateway timeout"}
        }"#;

        let error = CoinbaseParser.parse_api_error(
            reqwest::StatusCode::GATEWAY_TIMEOUT,
            serde_json::from_str(raw).unwrap(),
        );

        assert_eq!(error.created_order_id.as_deref(), Some("1111-2222"));
        assert!(error.message_contains("gateway timeout"));
        assert_eq!(error.status, Some(504));
    }
}
