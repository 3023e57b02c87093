use crate::error::VenueError;
use serde::{Deserialize, Serialize};
use tradegate_integration::protocol::http::HttpParser;

/// V5 error envelope: `{"code": "50011", "msg": "Too Many Requests", "data": []}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OkxHttpApiError {
    pub code: String,
    pub msg: String,
}

#[derive(Debug, Clone)]
pub struct OkxParser;

impl HttpParser for OkxParser {
    type ApiError = OkxHttpApiError;
    type OutputError = VenueError;

    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        VenueError {
            code: error.code.parse().ok(),
            status: Some(status.as_u16()),
            message: error.msg,
            created_order_id: None,
        }
    }
}
