use super::{Decision, FailureClass, GovernorHint, RetryPolicy, failure_class};
use crate::error::VenueError;
use std::time::Duration;

const RETRY_CODES: &[i64] = &[429, 500, 502, 503, 504, 520, 521, 522];

/// Coinbase failure classifier.
#[derive(Debug)]
pub struct CoinbaseRetryPolicy {
    budget: u32,
}

impl CoinbaseRetryPolicy {
    pub fn new(budget: u32) -> Self {
        Self { budget }
    }

    /// 2, 4, 8 seconds, capped at 10.
    fn hang_up_delay(attempt: u32) -> Duration {
        let secs = (2u64 << attempt.min(4)).min(10);
        Duration::from_secs(secs)
    }
}

impl RetryPolicy for CoinbaseRetryPolicy {
    fn classify(&self, error: &VenueError, attempt: u32) -> Decision {
        if error.message_contains("unauthorized") {
            return Decision::fail(error.message.clone());
        }

        if error.message_contains("socket hang up") {
            return Decision::retry(Self::hang_up_delay(attempt));
        }

        if error.message_contains("service unavailable") {
            return Decision::retry(Duration::from_secs(5));
        }

        match error.code.or(error.status.map(i64::from)) {
            Some(429) => {
                return Decision::retry_with(Duration::from_secs(10), GovernorHint::Saturate);
            }
            Some(code) if RETRY_CODES.contains(&code) => {
                return Decision::retry(Duration::from_secs(10));
            }
            _ => {}
        }

        match failure_class(error) {
            Some(FailureClass::ClockSkew) => {
                Decision::retry(Duration::from_secs(u64::from(attempt) * 2))
            }
            Some(FailureClass::SocketHangUp) => Decision::retry(Self::hang_up_delay(attempt)),
            Some(FailureClass::GatewayTimeout) => Decision::retry(Duration::from_secs(10)),
            Some(FailureClass::Network) => Decision::retry(Duration::from_secs(10)),
            Some(FailureClass::Saturation) => {
                Decision::retry_with(Duration::from_secs(10), GovernorHint::Saturate)
            }
            None => Decision::fail(error.message.clone()),
        }
    }

    fn max_attempts(&self, _error: &VenueError) -> u32 {
        self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_is_terminal() {
        let policy = CoinbaseRetryPolicy::new(10);
        let error = VenueError::with_status(401, "Unauthorized");

        assert_eq!(policy.classify(&error, 0), Decision::fail("Unauthorized"));
    }

    #[test]
    fn test_hang_up_backoff_is_exponential_and_capped() {
        let policy = CoinbaseRetryPolicy::new(10);
        let error = VenueError::new("socket hang up");

        assert!(matches!(
            policy.classify(&error, 0),
            Decision::Retry { delay, .. } if delay == Duration::from_secs(2)
        ));
        assert!(matches!(
            policy.classify(&error, 1),
            Decision::Retry { delay, .. } if delay == Duration::from_secs(4)
        ));
        assert!(matches!(
            policy.classify(&error, 5),
            Decision::Retry { delay, .. } if delay == Duration::from_secs(10)
        ));
    }

    #[test]
    fn test_service_unavailable_has_short_cooldown() {
        let policy = CoinbaseRetryPolicy::new(10);
        let error = VenueError::with_status(503, "Service Unavailable");

        assert!(matches!(
            policy.classify(&error, 0),
            Decision::Retry { delay, .. } if delay == Duration::from_secs(5)
        ));
    }
}
