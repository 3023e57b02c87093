use super::{Decision, FailureClass, GovernorHint, RetryPolicy, failure_class};
use crate::error::VenueError;
use std::time::Duration;

const RETRY_CODES: &[i64] = &[
    10006, 12816, 12146, 12147, 5004, 10000, 10016, 502, 12149, 429,
];

/// Bitget failure classifier.
#[derive(Debug)]
pub struct BitgetRetryPolicy {
    budget: u32,
}

impl BitgetRetryPolicy {
    pub fn new(budget: u32) -> Self {
        Self { budget }
    }
}

impl RetryPolicy for BitgetRetryPolicy {
    fn classify(&self, error: &VenueError, attempt: u32) -> Decision {
        match error.code {
            Some(429) => {
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
    fn test_order_not_found_is_terminal_for_the_classifier() {
        // Post-create lookups hit eventual consistency; the facade's
        // follow-up loop owns that case, not the classifier.
        let policy = BitgetRetryPolicy::new(10);
        let error = VenueError::with_code(43001, "The order cannot be found");

        assert_eq!(
            policy.classify(&error, 0),
            Decision::fail("The order cannot be found")
        );
    }

    #[test]
    fn test_too_many_requests_saturates() {
        let policy = BitgetRetryPolicy::new(10);
        let error = VenueError::new("Too many requests");

        assert_eq!(
            policy.classify(&error, 0),
            Decision::Retry {
                delay: Duration::from_secs(10),
                hint: Some(GovernorHint::Saturate),
            }
        );
    }
}
