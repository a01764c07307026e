use std::time::Duration;

/// Time unit accepted by job `interval` shorthands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Seconds in `value` units, or None on overflow
    pub fn to_secs(&self, value: u64) -> Option<u64> {
        match self {
            TimeUnit::Seconds => Some(value),
            TimeUnit::Minutes => value.checked_mul(60),
            TimeUnit::Hours => value.checked_mul(3_600),
            TimeUnit::Days => value.checked_mul(86_400),
        }
    }

    pub fn to_duration(&self, value: u64) -> Option<Duration> {
        self.to_secs(value).map(Duration::from_secs)
    }

    /// Parse a duration string like "5s", "10m", "2h", "1d"
    /// Returns (value, TimeUnit) if successful
    ///
    /// Strict rules:
    /// - Only lowercase suffixes are accepted: "s", "m", "h", "d"
    /// - Format must be: <number><suffix> (e.g., "30s")
    /// - No spaces allowed between number and suffix
    pub fn parse_duration(s: &str) -> Option<(u64, TimeUnit)> {
        let s = s.trim();

        let split_pos = s.find(|c: char| !c.is_ascii_digit())?;
        if split_pos == 0 {
            return None;
        }

        let (num_str, unit_str) = s.split_at(split_pos);
        let value = num_str.parse::<u64>().ok()?;

        let time_unit = match unit_str {
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            _ => return None,
        };

        Some((value, time_unit))
    }

    /// Parse an interval given either as bare seconds ("600") or a shorthand ("10m").
    pub fn parse_interval(s: &str) -> Option<Duration> {
        let s = s.trim();
        if let Some((value, unit)) = Self::parse_duration(s) {
            return unit.to_duration(value);
        }
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
