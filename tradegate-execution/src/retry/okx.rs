use super::{Decision, FailureClass, GovernorHint, RetryPolicy, failure_class};
use crate::error::VenueError;
use std::time::Duration;

const RETRY_CODES: &[i64] = &[1, 50001, 50004, 50005, 50011, 50013, 50026, 50057, 50102];

/// Too many requests.
const CODE_THROTTLED: i64 = 50011;

/// Request timestamp expired.
const CODE_TIMESTAMP_EXPIRED: i64 = 50102;

/// OKX failure classifier.
#[derive(Debug)]
pub struct OkxRetryPolicy {
    budget: u32,
}

impl OkxRetryPolicy {
    pub fn new(budget: u32) -> Self {
        Self { budget }
    }
}

impl RetryPolicy for OkxRetryPolicy {
    fn classify(&self, error: &VenueError, attempt: u32) -> Decision {
        match error.code {
            Some(CODE_THROTTLED) => {
                // Escalating cool-down: 10s, 20s, 30s...
                let delay = Duration::from_secs(u64::from(attempt + 1) * 10);
                return Decision::retry_with(delay, GovernorHint::Saturate);
            }
            Some(CODE_TIMESTAMP_EXPIRED) => {
                return Decision::retry(Duration::from_secs(u64::from(attempt) * 2));
            }
            Some(50001) | Some(50013) | Some(50026) => {
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
    fn test_throttle_delay_escalates_with_attempt() {
        let policy = OkxRetryPolicy::new(10);
        let error = VenueError::with_code(50011, "Too Many Requests");

        for (attempt, expected_secs) in [(0u32, 10u64), (1, 20), (4, 50)] {
            assert!(matches!(
                policy.classify(&error, attempt),
                Decision::Retry { delay, hint: Some(GovernorHint::Saturate) }
                    if delay == Duration::from_secs(expected_secs)
            ));
        }
    }

    #[test]
    fn test_unknown_code_is_terminal() {
        let policy = OkxRetryPolicy::new(10);
        let error = VenueError::with_code(51008, "Order amount exceeds balance");

        assert_eq!(
            policy.classify(&error, 0),
            Decision::fail("Order amount exceeds balance")
        );
    }
}
