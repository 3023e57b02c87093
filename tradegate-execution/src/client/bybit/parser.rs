use crate::error::VenueError;
use serde::{Deserialize, Serialize};
use tradegate_integration::protocol::http::HttpParser;

/// Error envelope: `{"retCode": 10006, "retMsg": "Too many visits!", ...}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BybitHttpApiError {
    #[serde(rename = "retCode")]
    pub ret_code: i64,

    #[serde(rename = "retMsg")]
    pub ret_msg: String,
}

#[derive(Debug, Clone)]
pub struct BybitParser;

impl HttpParser for BybitParser {
    type ApiError = BybitHttpApiError;
    type OutputError = VenueError;

    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        VenueError {
            code: Some(error.ret_code),
            status: Some(status.as_u16()),
            message: error.ret_msg,
            created_order_id: None,
        }
    }
}
