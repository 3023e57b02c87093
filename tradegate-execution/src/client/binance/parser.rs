use crate::error::VenueError;
use serde::{Deserialize, Serialize};
use tradegate_integration::protocol::http::HttpParser;

/// Binance error envelope: `{"code": -1121, "msg": "Invalid symbol."}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinanceHttpApiError {
    pub code: i64,
    pub msg: String,
}

#[derive(Debug, Clone)]
pub struct BinanceParser;

impl HttpParser for BinanceParser {
    type ApiError = BinanceHttpApiError;
    type OutputError = VenueError;

    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        VenueError {
            code: Some(error.code),
            status: Some(status.as_u16()),
            message: error.msg,
            created_order_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_carries_code_and_status() {
        let raw = r#"{"code":-1003,"msg":"Too many requests; current limit is 1200 request weight per 1 MINUTE."}"#;

        let result = BinanceParser
            .parse::<serde_json::Value>(reqwest::StatusCode::TOO_MANY_REQUESTS, raw.as_bytes());

        // A Value parses anything, so drive parse_api_error directly
        assert!(result.is_ok());

        let error = BinanceParser.parse_api_error(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            serde_json::from_str(raw).unwrap(),
        );
        assert_eq!(error.code, Some(-1003));
        assert_eq!(error.status, Some(429));
        assert!(error.message_contains("too many requests"));
    }
}
