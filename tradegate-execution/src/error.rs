use smol_str::SmolStr;
use thiserror::Error;
use tradegate_integration::error::TransportError;

/// Stable marker prefixing transport-level terminal failures, letting
/// upstream systems distinguish connector problems from venue business
/// rejections.
pub const EXCHANGE_PROBLEMS: &str = "exchange problems: ";

/// Terminal failure of one public gateway operation.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CallError {
    /// The facade has no transport handle (credentials were never supplied).
    #[error("Cannot connect to {0}")]
    ClientMissing(&'static str),

    /// Derivatives operation invoked on a spot-configured facade.
    #[error("Futures type missed")]
    FuturesModeMissing,

    /// Governor queue wait alone consumed the call deadline.
    #[error("Response timeout")]
    QueueTimeout,

    /// Transient failure that exhausted its retry budget.
    #[error("exchange problems: {0}")]
    ExchangeProblems(String),

    /// Venue business rejection, message preserved verbatim.
    #[error("{0}")]
    Rejected(String),
}

impl CallError {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Raw failure of one attempt, as consumed by retry classifiers.
///
/// A uniform projection of venue API errors and transport faults: venue
/// numeric code (if any), HTTP status (if any), and the message text that
/// classifier substring sets match against.
#[derive(Debug, Clone, Default, Error)]
#[error("{message}")]
pub struct VenueError {
    pub code: Option<i64>,
    pub status: Option<u16>,
    pub message: String,

    /// Order id recovered from an error body that nevertheless reports a
    /// created order (Coinbase reports these; the facade must follow up
    /// with a lookup instead of re-submitting).
    pub created_order_id: Option<SmolStr>,
}

impl VenueError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            ..Self::default()
        }
    }

    /// Case-insensitive substring match against the message text.
    pub fn message_contains(&self, needle: &str) -> bool {
        let haystack = self.message.to_ascii_lowercase();
        haystack.contains(&needle.to_ascii_lowercase())
    }
}

impl From<TransportError> for VenueError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::HttpResponse(status, body) => Self {
                status: Some(status.as_u16()),
                message: body,
                ..Self::default()
            },
            TransportError::HttpTimeout(error) => Self {
                message: format!("Server Timeout: {error}"),
                ..Self::default()
            },
            error => Self::new(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_problems_prefix_is_stable() {
        let error = CallError::ExchangeProblems("ETIMEDOUT".to_string());
        assert_eq!(error.to_string(), "exchange problems: ETIMEDOUT");
    }

    #[test]
    fn test_message_contains_is_case_insensitive() {
        let error = VenueError::new("Internal System Error, retry later");
        assert!(error.message_contains("internal system error"));
        assert!(!error.message_contains("recv_window"));
    }
}
