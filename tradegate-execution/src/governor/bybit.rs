use super::{Endpoint, Governor, GovernorFeedback, SATURATED, UsageReading, Window, ledger_mutex};
use parking_lot::Mutex;
use std::time::Duration;
use tradegate_integration::clock::SharedClock;

/// Global request cap shared across every Bybit endpoint.
const REQUEST_LIMIT: u64 = 550;
const FRAME_MS: i64 = 5_500;

const LEDGER_KEY: &str = "bybit";

/// Single sliding-window Bybit governor: one `(count, frame_start)` pair
/// shared by spot and derivatives surfaces.
#[derive(Debug)]
pub struct BybitGovernor {
    clock: SharedClock,
    state: Mutex<Window>,
}

impl BybitGovernor {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: Mutex::new(Window::default()),
        }
    }
}

impl Governor for BybitGovernor {
    async fn check(&self, _endpoint: &Endpoint) -> Duration {
        let _guard = ledger_mutex().lock(LEDGER_KEY).await;
        let now = self.clock.now_ms();
        let mut window = self.state.lock();

        window.roll(now, FRAME_MS);

        if window.used + 1 > REQUEST_LIMIT {
            return Duration::from_millis(window.remaining_ms(now, FRAME_MS).max(1) as u64);
        }

        window.used += 1;
        Duration::ZERO
    }

    fn snapshot(&self) -> Vec<UsageReading> {
        let window = self.state.lock();
        vec![UsageReading::new("requests", window.fraction(REQUEST_LIMIT))]
    }
}

impl GovernorFeedback for BybitGovernor {
    fn saturate(&self) {
        self.state.lock().used = SATURATED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tradegate_integration::clock::ManualClock;

    const ENDPOINT: Endpoint = Endpoint::request("order/create", 1);

    #[tokio::test]
    async fn test_frame_cap_then_roll() {
        let clock = ManualClock::new(1_700_000_000_000);
        let governor = BybitGovernor::new(Arc::clone(&clock) as SharedClock);

        for _ in 0..550 {
            assert_eq!(governor.check(&ENDPOINT).await, Duration::ZERO);
        }
        let wait = governor.check(&ENDPOINT).await;
        assert_eq!(wait, Duration::from_millis(5_500));

        clock.advance(Duration::from_millis(5_501));
        assert_eq!(governor.check(&ENDPOINT).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_saturate_backs_everyone_off() {
        let clock = ManualClock::new(1_700_000_000_000);
        let governor = BybitGovernor::new(Arc::clone(&clock) as SharedClock);

        assert_eq!(governor.check(&ENDPOINT).await, Duration::ZERO);
        governor.saturate();
        assert!(governor.check(&ENDPOINT).await > Duration::ZERO);
    }
}
