use crate::error::VenueError;
use serde::{Deserialize, Serialize};
use tradegate_integration::protocol::http::HttpParser;

/// Error envelope: `{"code": "43001", "msg": "The order cannot be found", ...}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BitgetHttpApiError {
    pub code: String,

    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone)]
pub struct BitgetParser;

impl HttpParser for BitgetParser {
    type ApiError = BitgetHttpApiError;
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
