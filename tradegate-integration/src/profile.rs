use serde::{Deserialize, Serialize};

/// Per-call timing record.
///
/// Created at facade entry, stamped as the call moves through the governor
/// queue and the HTTP transport, and sealed on return. All timestamps are
/// milliseconds since the Unix epoch; `None` means the phase was never
/// reached.
///
/// Stamps are monotonic: a later phase is clamped so it never precedes the
/// phase before it, keeping
/// `incoming <= queue_start <= queue_end <= exchange_start <= exchange_end <= outgoing`
/// for every populated subset.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct TimeProfile {
    pub incoming: Option<i64>,
    pub queue_start: Option<i64>,
    pub queue_end: Option<i64>,
    pub exchange_start: Option<i64>,
    pub exchange_end: Option<i64>,
    pub outgoing: Option<i64>,

    /// Retry attempts consumed by this call. Starts at zero.
    pub attempts: u32,
}

impl TimeProfile {
    /// Construct a profile stamped with its creation time.
    pub fn start(now_ms: i64) -> Self {
        Self {
            incoming: Some(now_ms),
            ..Self::default()
        }
    }

    fn clamp(prev: Option<i64>, now_ms: i64) -> i64 {
        match prev {
            Some(prev) if prev > now_ms => prev,
            _ => now_ms,
        }
    }

    pub fn stamp_queue_start(&mut self, now_ms: i64) {
        self.queue_start = Some(Self::clamp(self.incoming, now_ms));
    }

    pub fn stamp_queue_end(&mut self, now_ms: i64) {
        self.queue_end = Some(Self::clamp(self.queue_start, now_ms));
    }

    pub fn stamp_exchange_start(&mut self, now_ms: i64) {
        self.exchange_start = Some(Self::clamp(self.queue_end, now_ms));
    }

    pub fn stamp_exchange_end(&mut self, now_ms: i64) {
        self.exchange_end = Some(Self::clamp(self.exchange_start, now_ms));
    }

    /// Seal the profile at call return.
    pub fn seal(&mut self, now_ms: i64) {
        self.outgoing = Some(Self::clamp(self.exchange_end.or(self.incoming), now_ms));
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Milliseconds spent waiting on the rate governor, if both ends stamped.
    pub fn queue_wait_ms(&self) -> Option<i64> {
        Some(self.queue_end? - self.queue_start?)
    }

    /// Milliseconds spent on the wire, if both ends stamped.
    pub fn on_wire_ms(&self) -> Option<i64> {
        Some(self.exchange_end? - self.exchange_start?)
    }

    /// Total call duration, if sealed.
    pub fn total_ms(&self) -> Option<i64> {
        Some(self.outgoing? - self.incoming?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamps_are_monotonic() {
        let mut profile = TimeProfile::start(1000);
        profile.stamp_queue_start(900); // behind incoming, clamped forward
        profile.stamp_queue_end(1200);
        profile.stamp_exchange_start(1100); // behind queue_end, clamped
        profile.stamp_exchange_end(1500);
        profile.seal(1600);

        assert_eq!(profile.incoming, Some(1000));
        assert_eq!(profile.queue_start, Some(1000));
        assert_eq!(profile.queue_end, Some(1200));
        assert_eq!(profile.exchange_start, Some(1200));
        assert_eq!(profile.exchange_end, Some(1500));
        assert_eq!(profile.outgoing, Some(1600));
        assert_eq!(profile.total_ms(), Some(600));
        assert_eq!(profile.on_wire_ms(), Some(300));
    }

    #[test]
    fn test_unreached_phases_stay_unset() {
        let mut profile = TimeProfile::start(1000);
        profile.seal(1010);

        assert_eq!(profile.queue_start, None);
        assert_eq!(profile.queue_wait_ms(), None);
        assert_eq!(profile.on_wire_ms(), None);
        assert_eq!(profile.total_ms(), Some(10));
        assert_eq!(profile.attempts, 0);
    }
}
