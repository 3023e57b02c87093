use super::{Decision, FailureClass, GovernorHint, RetryPolicy, failure_class};
use crate::error::VenueError;
use std::time::Duration;

const RETRY_CODES: &[i64] = &[10006, 12816, 12146, 12147, 5004, 10000, 10016, 502, 12149];

/// Rate-limit exceeded.
const CODE_RATE_LIMIT: i64 = 10006;

/// Bybit failure classifier.
#[derive(Debug)]
pub struct BybitRetryPolicy {
    budget: u32,
}

impl BybitRetryPolicy {
    pub fn new(budget: u32) -> Self {
        Self { budget }
    }
}

impl RetryPolicy for BybitRetryPolicy {
    fn classify(&self, error: &VenueError, attempt: u32) -> Decision {
        match error.code {
            Some(CODE_RATE_LIMIT) => {
                return Decision::retry_with(Duration::from_secs(10), GovernorHint::Saturate);
            }
            Some(code) if RETRY_CODES.contains(&code) => {
                return Decision::retry(Duration::from_secs(5));
            }
            _ => {}
        }

        match failure_class(error) {
            Some(FailureClass::ClockSkew) => {
                Decision::retry(Duration::from_secs(u64::from(attempt) * 2))
            }
            Some(FailureClass::SocketHangUp) => {
                Decision::retry(Duration::from_secs(2 + u64::from(attempt)))
            }
            Some(FailureClass::GatewayTimeout) => Decision::retry(Duration::from_secs(5)),
            Some(FailureClass::Network) => Decision::retry(Duration::from_secs(5)),
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
    fn test_rate_limit_saturates() {
        let policy = BybitRetryPolicy::new(10);
        let error = VenueError::with_code(10006, "Too many visits!");

        assert_eq!(
            policy.classify(&error, 0),
            Decision::Retry {
                delay: Duration::from_secs(10),
                hint: Some(GovernorHint::Saturate),
            }
        );
    }

    #[test]
    fn test_position_idx_mismatch_is_terminal_here() {
        // The facade corrects positionIdx itself; the classifier must not
        // blind-retry the identical request.
        let policy = BybitRetryPolicy::new(10);
        let error = VenueError::with_code(10001, "position idx not match position mode");

        assert_eq!(
            policy.classify(&error, 0),
            Decision::fail("position idx not match position mode")
        );
    }
}
