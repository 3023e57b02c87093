use crate::{
    error::{CallError, VenueError},
    governor::GovernorFeedback,
};
use std::time::Duration;
use tradegate_integration::clock::sleep_for;
use tracing::{debug, warn};

/// Binance retry policy (all four domains).
pub mod binance;

/// Bitget retry policy.
pub mod bitget;

/// Bybit retry policy.
pub mod bybit;

/// Coinbase retry policy.
pub mod coinbase;

/// KuCoin retry policy.
pub mod kucoin;

/// OKX retry policy.
pub mod okx;

/// Network fault substrings, matched case-insensitively. Covers both the
/// raw socket vocabulary venues echo back and the local HTTP stack's own
/// connect failures.
pub const NETWORK_FAULTS: &[&str] = &[
    "fetch failed",
    "etimedout",
    "econnreset",
    "eai_again",
    "getaddrinfo",
    "handshake",
    "dns error",
    "connection reset",
    "connection refused",
    "connection closed",
    "error sending request",
    "timed out",
];

/// Server saturation substrings: overloaded venues answer with these (or
/// with raw HTML error pages).
pub const SERVER_SATURATION: &[&str] = &[
    "internal system error",
    "internal server error",
    "server error",
    "server timeout",
    "too many visits",
    "too many requests",
    "possible ip block",
    "unknown error",
    "<html",
    "request throttled by system-level protection",
    "system busy",
    "service unavailable",
];

/// Clock skew substrings: the request was signed with a timestamp the venue
/// no longer accepts.
pub const CLOCK_SKEW: &[&str] = &[
    "outside of the recvwindow",
    "recv_window",
    "kc-api-timestamp",
    "request timestamp expired",
    "timestamp for this request",
];

/// Failure class derived from the error text, before venue code handling.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FailureClass {
    ClockSkew,
    SocketHangUp,
    GatewayTimeout,
    Network,
    Saturation,
}

/// Match the error text against the shared substring tables.
///
/// Specific classes are tested first so `socket hang up` is not swallowed
/// by the generic network table.
pub fn failure_class(error: &VenueError) -> Option<FailureClass> {
    if CLOCK_SKEW.iter().any(|needle| error.message_contains(needle)) {
        return Some(FailureClass::ClockSkew);
    }
    if error.message_contains("socket hang up") {
        return Some(FailureClass::SocketHangUp);
    }
    if error.message_contains("gateway timeout") || error.status == Some(504) {
        return Some(FailureClass::GatewayTimeout);
    }
    if NETWORK_FAULTS
        .iter()
        .any(|needle| error.message_contains(needle))
    {
        return Some(FailureClass::Network);
    }
    if SERVER_SATURATION
        .iter()
        .any(|needle| error.message_contains(needle))
    {
        return Some(FailureClass::Saturation);
    }
    None
}

/// Governor mutation commanded alongside a classification.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GovernorHint {
    /// Force the current window saturated so other inflight callers back
    /// off before the server tells them itself.
    Saturate,

    /// Record a server-declared ban expiry (unix-ms).
    BanUntil(i64),
}

impl GovernorHint {
    pub fn apply<G: GovernorFeedback + ?Sized>(self, governor: &G) {
        match self {
            GovernorHint::Saturate => governor.saturate(),
            GovernorHint::BanUntil(until_ms) => governor.record_ban_until(until_ms),
        }
    }
}

/// Outcome of classifying one failed attempt.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Decision {
    /// Sleep `delay`, apply the hint, and re-issue the attempt.
    Retry {
        delay: Duration,
        hint: Option<GovernorHint>,
    },

    /// Terminal; the venue message is surfaced verbatim.
    Fail {
        reason: String,
        hint: Option<GovernorHint>,
    },
}

impl Decision {
    pub fn retry(delay: Duration) -> Self {
        Decision::Retry { delay, hint: None }
    }

    pub fn retry_with(delay: Duration, hint: GovernorHint) -> Self {
        Decision::Retry {
            delay,
            hint: Some(hint),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Decision::Fail {
            reason: reason.into(),
            hint: None,
        }
    }
}

/// Per-venue failure classification.
pub trait RetryPolicy: Send + Sync {
    /// Classify one failed attempt. `attempt` is zero-based.
    fn classify(&self, error: &VenueError, attempt: u32) -> Decision;

    /// Retry budget for this error. Policies may stretch it per class
    /// (KuCoin doubles it for clock-skew).
    fn max_attempts(&self, error: &VenueError) -> u32;
}

/// Failure of one attempt inside [`with_retry`].
#[derive(Debug)]
pub enum AttemptError {
    /// Terminal without classification (client missing, queue timeout).
    Terminal(CallError),

    /// Venue/transport failure to be classified.
    Venue(VenueError),
}

impl AttemptError {
    /// Collapse into a terminal [`CallError`] without classification. Used
    /// by facade follow-up loops that sit outside [`with_retry`].
    pub fn into_call_error(self) -> CallError {
        match self {
            AttemptError::Terminal(error) => error,
            AttemptError::Venue(error) => CallError::Rejected(error.message),
        }
    }

    /// The venue failure, if this is one.
    pub fn as_venue(&self) -> Option<&VenueError> {
        match self {
            AttemptError::Venue(error) => Some(error),
            AttemptError::Terminal(_) => None,
        }
    }
}

impl From<CallError> for AttemptError {
    fn from(error: CallError) -> Self {
        AttemptError::Terminal(error)
    }
}

impl From<VenueError> for AttemptError {
    fn from(error: VenueError) -> Self {
        AttemptError::Venue(error)
    }
}

/// Run `attempt` under the venue's retry policy.
///
/// Owns the whole loop: classify the failure, apply the governor hint,
/// sleep the prescribed delay, re-issue. Returns the terminal result plus
/// the number of attempts issued (recorded into the call's TimeProfile by
/// the facade).
pub async fn with_retry<T, P, G, F>(
    policy: &P,
    governor: &G,
    mut attempt_fn: F,
) -> (Result<T, CallError>, u32)
where
    P: RetryPolicy,
    G: GovernorFeedback + ?Sized,
    F: AsyncFnMut(u32) -> Result<T, AttemptError>,
{
    let mut attempt: u32 = 0;
    loop {
        let error = match attempt_fn(attempt).await {
            Ok(value) => return (Ok(value), attempt + 1),
            Err(AttemptError::Terminal(error)) => return (Err(error), attempt + 1),
            Err(AttemptError::Venue(error)) => error,
        };

        match policy.classify(&error, attempt) {
            Decision::Fail { reason, hint } => {
                if let Some(hint) = hint {
                    hint.apply(governor);
                }
                return (Err(CallError::Rejected(reason)), attempt + 1);
            }
            Decision::Retry { delay, hint } => {
                if let Some(hint) = hint {
                    hint.apply(governor);
                }
                if attempt + 1 >= policy.max_attempts(&error) {
                    warn!(
                        attempts = attempt + 1,
                        error = %error,
                        "retry budget exhausted"
                    );
                    return (Err(CallError::ExchangeProblems(error.message)), attempt + 1);
                }
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "retrying");
                sleep_for(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Scan the message for a 13-digit unix-ms epoch (Binance embeds ban expiry
/// timestamps in `-1008` messages this way).
pub fn extract_epoch_ms(message: &str) -> Option<i64> {
    let bytes = message.as_bytes();
    let mut start = None;
    let mut len = 0usize;

    for (index, byte) in bytes.iter().enumerate() {
        if byte.is_ascii_digit() {
            if start.is_none() {
                start = Some(index);
                len = 0;
            }
            len += 1;
        } else {
            if len == 13 {
                break;
            }
            start = None;
        }
    }

    let start = start?;
    if len != 13 {
        return None;
    }
    message[start..start + 13].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_epoch_ms() {
        assert_eq!(
            extract_epoch_ms("IP banned until 1700000000000."),
            Some(1_700_000_000_000)
        );
        assert_eq!(extract_epoch_ms("code -1008, no epoch"), None);
        // 12 and 14 digit runs are not epochs
        assert_eq!(extract_epoch_ms("120000000000"), None);
        assert_eq!(extract_epoch_ms("17000000000001"), None);
    }

    #[test]
    fn test_failure_class_ordering() {
        let skew = VenueError::new("Timestamp outside of the recvWindow");
        assert_eq!(failure_class(&skew), Some(FailureClass::ClockSkew));

        let hang_up = VenueError::new("socket hang up");
        assert_eq!(failure_class(&hang_up), Some(FailureClass::SocketHangUp));

        let network = VenueError::new("ECONNRESET while reading");
        assert_eq!(failure_class(&network), Some(FailureClass::Network));

        let html = VenueError::new("<html><body>502 Bad Gateway</body></html>");
        assert_eq!(failure_class(&html), Some(FailureClass::Saturation));

        let business = VenueError::new("Insufficient balance");
        assert_eq!(failure_class(&business), None);
    }
}
