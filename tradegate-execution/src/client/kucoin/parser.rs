use crate::error::VenueError;
use serde::{Deserialize, Serialize};
use tradegate_integration::protocol::http::HttpParser;

/// Error envelope: `{"code": "400100", "msg": "Invalid Parameter."}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KucoinHttpApiError {
    pub code: String,

    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone)]
pub struct KucoinParser;

impl HttpParser for KucoinParser {
    type ApiError = KucoinHttpApiError;
    type OutputError = VenueError;

    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        VenueError {
            code: error.code.parse().ok(),
            status: Some(status.as_u16()),
            message: if error.msg.is_empty() {
                error.code
            } else {
                error.msg
            },
            created_order_id: None,
        }
    }
}
