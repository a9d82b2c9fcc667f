use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::str::FromStr;

// B3 trades on Brasília time, which has had no DST since 2019.
const BRT_OFFSET_SECS: i64 = -3 * 3600;

/// Which calendar the capture date is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureClock {
    /// UTC calendar date of the run.
    #[default]
    Utc,
    /// Exchange-local (UTC-3) calendar date of the run.
    B3Local,
}

impl FromStr for CaptureClock {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utc" => Ok(CaptureClock::Utc),
            "b3" | "brt" | "america/sao_paulo" => Ok(CaptureClock::B3Local),
            other => anyhow::bail!("CAPTURE_DATE_TZ must be one of utc, b3 (got {other})"),
        }
    }
}

/// Calendar date stamped on every record of a run.
pub fn capture_date(now_utc: DateTime<Utc>, clock: CaptureClock) -> NaiveDate {
    match clock {
        CaptureClock::Utc => now_utc.date_naive(),
        CaptureClock::B3Local => (now_utc + Duration::seconds(BRT_OFFSET_SECS)).date_naive(),
    }
}
