use super::{Decision, FailureClass, GovernorHint, RetryPolicy, extract_epoch_ms, failure_class};
use crate::{error::VenueError, governor::binance::BinanceDomain};
use std::time::Duration;
use tradegate_integration::clock::SharedClock;

/// Venue codes that indicate a transient condition worth retrying.
const RETRY_CODES: &[i64] = &[
    -1021, -1000, -1001, -1003, -1004, -1006, -1007, -1008, -1015, -1099, 502,
];

/// Binance failure classifier.
///
/// Needs the wall clock to turn `-1008` ban-expiry epochs into sleep
/// durations, and the domain to pick the `-1015` cool-down (spot and coinm
/// publish different order-rate windows).
#[derive(Debug)]
pub struct BinanceRetryPolicy {
    domain: BinanceDomain,
    clock: SharedClock,
    budget: u32,
}

impl BinanceRetryPolicy {
    pub fn new(domain: BinanceDomain, clock: SharedClock, budget: u32) -> Self {
        Self {
            domain,
            clock,
            budget,
        }
    }

    fn too_many_orders_delay(&self) -> Duration {
        match self.domain {
            BinanceDomain::Coinm => Duration::from_secs(61),
            _ => Duration::from_secs(11),
        }
    }
}

impl RetryPolicy for BinanceRetryPolicy {
    fn classify(&self, error: &VenueError, attempt: u32) -> Decision {
        // A 403 is a suspected IP block: terminal, and the ledger is
        // saturated so other callers stop feeding it.
        if error.status == Some(403) {
            return Decision::Fail {
                reason: error.message.clone(),
                hint: Some(GovernorHint::Saturate),
            };
        }

        match error.code {
            Some(-1008) => {
                return match extract_epoch_ms(&error.message) {
                    Some(banned_until) => {
                        let wait = (banned_until + 1 - self.clock.now_ms()).max(0);
                        Decision::retry_with(
                            Duration::from_millis(wait as u64),
                            GovernorHint::BanUntil(banned_until),
                        )
                    }
                    None => {
                        Decision::retry_with(Duration::from_secs(30), GovernorHint::Saturate)
                    }
                };
            }
            Some(-1015) => {
                return Decision::retry_with(self.too_many_orders_delay(), GovernorHint::Saturate);
            }
            Some(-1003) => {
                return Decision::retry_with(Duration::from_secs(10), GovernorHint::Saturate);
            }
            Some(-1021) => {
                return Decision::retry(Duration::from_secs(u64::from(attempt) * 2));
            }
            Some(code) if RETRY_CODES.contains(&code) => {
                return Decision::retry(Duration::from_secs(5));
            }
            _ => {}
        }

        if error.message_contains("request throttled by system-level protection") {
            return Decision::retry_with(Duration::from_secs(10), GovernorHint::Saturate);
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
    use tradegate_integration::clock::ManualClock;

    fn policy(domain: BinanceDomain, now_ms: i64) -> BinanceRetryPolicy {
        BinanceRetryPolicy::new(domain, ManualClock::new(now_ms) as SharedClock, 10)
    }

    #[test]
    fn test_ban_epoch_drives_sleep_and_governor() {
        let policy = policy(BinanceDomain::SpotCom, 1_700_000_000_000);
        let error =
            VenueError::with_code(-1008, "Way too much request weight used; IP banned until 1700000030000.");

        let decision = policy.classify(&error, 0);
        assert_eq!(
            decision,
            Decision::Retry {
                delay: Duration::from_millis(30_001),
                hint: Some(GovernorHint::BanUntil(1_700_000_030_000)),
            }
        );
    }

    #[test]
    fn test_ban_without_epoch_falls_back() {
        let policy = policy(BinanceDomain::SpotCom, 1_700_000_000_000);
        let error = VenueError::with_code(-1008, "Server is currently overloaded");

        assert_eq!(
            policy.classify(&error, 3),
            Decision::Retry {
                delay: Duration::from_secs(30),
                hint: Some(GovernorHint::Saturate),
            }
        );
    }

    #[test]
    fn test_too_many_orders_cooldown_by_domain() {
        let error = VenueError::with_code(-1015, "Too many new orders");

        let spot = policy(BinanceDomain::SpotCom, 0);
        assert!(matches!(
            spot.classify(&error, 0),
            Decision::Retry { delay, .. } if delay == Duration::from_secs(11)
        ));

        let coinm = policy(BinanceDomain::Coinm, 0);
        assert!(matches!(
            coinm.classify(&error, 0),
            Decision::Retry { delay, .. } if delay == Duration::from_secs(61)
        ));
    }

    #[test]
    fn test_forbidden_is_terminal_and_saturates() {
        let policy = policy(BinanceDomain::SpotCom, 0);
        let error = VenueError::with_status(403, "Forbidden");

        assert_eq!(
            policy.classify(&error, 0),
            Decision::Fail {
                reason: "Forbidden".to_string(),
                hint: Some(GovernorHint::Saturate),
            }
        );
    }

    #[test]
    fn test_business_rejection_is_terminal() {
        let policy = policy(BinanceDomain::SpotCom, 0);
        let error = VenueError::with_code(-2010, "Account has insufficient balance");

        assert_eq!(
            policy.classify(&error, 0),
            Decision::fail("Account has insufficient balance")
        );
    }
}
