use super::{Decision, FailureClass, GovernorHint, RetryPolicy, failure_class};
use crate::error::VenueError;
use std::time::Duration;

const RETRY_CODES: &[i64] = &[
    429, 403, 500, 502, 503, 504, 524, 1015, 520, 530, 429_000, 200_004, 400_000, 500_000,
];

/// KuCoin failure classifier.
///
/// KuCoin signs with a `KC-API-TIMESTAMP` header that drifts easily against
/// its servers, so clock-skew failures get twice the usual retry budget.
#[derive(Debug)]
pub struct KucoinRetryPolicy {
    budget: u32,
}

impl KucoinRetryPolicy {
    pub fn new(budget: u32) -> Self {
        Self { budget }
    }
}

impl RetryPolicy for KucoinRetryPolicy {
    fn classify(&self, error: &VenueError, attempt: u32) -> Decision {
        match error.code {
            Some(429) | Some(429_000) | Some(530) => {
                return Decision::retry_with(Duration::from_secs(30), GovernorHint::Saturate);
            }
            Some(403) => {
                return Decision::retry_with(Duration::from_secs(30), GovernorHint::Saturate);
            }
            Some(1015) => {
                return Decision::retry_with(Duration::from_secs(50), GovernorHint::Saturate);
            }
            Some(524) | Some(520) => {
                return Decision::retry(Duration::from_secs(10));
            }
            Some(502) => {
                return Decision::retry(Duration::from_secs(10));
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

    fn max_attempts(&self, error: &VenueError) -> u32 {
        match failure_class(error) {
            Some(FailureClass::ClockSkew) => self.budget * 2,
            _ => self.budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_codes_have_long_cooldowns() {
        let policy = KucoinRetryPolicy::new(10);

        let throttled = VenueError::with_code(429, "Too Many Requests");
        assert!(matches!(
            policy.classify(&throttled, 0),
            Decision::Retry { delay, hint: Some(GovernorHint::Saturate) } if delay == Duration::from_secs(30)
        ));

        let degraded = VenueError::with_code(1015, "Request is throttled by cloudflare");
        assert!(matches!(
            policy.classify(&degraded, 0),
            Decision::Retry { delay, .. } if delay == Duration::from_secs(50)
        ));
    }

    #[test]
    fn test_clock_skew_doubles_budget() {
        let policy = KucoinRetryPolicy::new(10);

        let skew = VenueError::new("Invalid KC-API-TIMESTAMP");
        assert_eq!(policy.max_attempts(&skew), 20);

        let other = VenueError::new("Balance insufficient!");
        assert_eq!(policy.max_attempts(&other), 10);
    }
}
