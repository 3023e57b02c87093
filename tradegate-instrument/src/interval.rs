use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Canonical candle interval.
///
/// Each connector owns a hard mapping from this enum to its venue's string
/// encoding; intervals a venue does not serve are rejected there rather than
/// silently substituted.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl CandleInterval {
    /// Interval length in whole minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            CandleInterval::M1 => 1,
            CandleInterval::M3 => 3,
            CandleInterval::M5 => 5,
            CandleInterval::M15 => 15,
            CandleInterval::M30 => 30,
            CandleInterval::H1 => 60,
            CandleInterval::H2 => 120,
            CandleInterval::H4 => 240,
            CandleInterval::H8 => 480,
            CandleInterval::D1 => 1440,
            CandleInterval::W1 => 10_080,
        }
    }

    /// Interval length in milliseconds.
    pub fn millis(&self) -> i64 {
        i64::from(self.minutes()) * 60_000
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::M1 => "1m",
            CandleInterval::M3 => "3m",
            CandleInterval::M5 => "5m",
            CandleInterval::M15 => "15m",
            CandleInterval::M30 => "30m",
            CandleInterval::H1 => "1h",
            CandleInterval::H2 => "2h",
            CandleInterval::H4 => "4h",
            CandleInterval::H8 => "8h",
            CandleInterval::D1 => "1d",
            CandleInterval::W1 => "1w",
        }
    }
}

impl Display for CandleInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_are_strictly_increasing() {
        let intervals = [
            CandleInterval::M1,
            CandleInterval::M3,
            CandleInterval::M5,
            CandleInterval::M15,
            CandleInterval::M30,
            CandleInterval::H1,
            CandleInterval::H2,
            CandleInterval::H4,
            CandleInterval::H8,
            CandleInterval::D1,
            CandleInterval::W1,
        ];
        assert!(intervals.windows(2).all(|w| w[0].minutes() < w[1].minutes()));
    }

    #[test]
    fn test_serde_round_trip() {
        let interval: CandleInterval = serde_json::from_str("\"15m\"").unwrap();
        assert_eq!(interval, CandleInterval::M15);
        assert_eq!(serde_json::to_string(&interval).unwrap(), "\"15m\"");
    }
}
