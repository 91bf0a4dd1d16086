//! # Duration Validation
//!
//! Parses Kubernetes duration strings such as `spec.lifetime`.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static WHOLE_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+[smhd])+$")
        .expect("Failed to compile duration regex - this should never happen")
});

static DURATION_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<number>\d+)(?P<unit>[smhd])")
        .expect("Failed to compile duration segment regex - this should never happen")
});

/// Parse a Kubernetes duration string into `std::time::Duration`
///
/// Accepts one or more `<number><unit>` segments where unit is one of
/// `s`, `m`, `h` or `d` ("30s", "15m", "1h30m", "1d").
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration> {
    let trimmed = duration_str.trim();

    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let lower = trimmed.to_lowercase();
    if !WHOLE_DURATION.is_match(&lower) {
        return Err(anyhow::anyhow!(
            "Invalid duration format '{trimmed}'. Expected format: <number><unit> (e.g., '15m', '1h', '1h30m')"
        ));
    }

    let mut seconds: u64 = 0;
    for captures in DURATION_SEGMENT.captures_iter(&lower) {
        let number_str = captures
            .name("number")
            .ok_or_else(|| anyhow::anyhow!("Failed to extract number from duration '{trimmed}'"))?
            .as_str();
        let unit = captures
            .name("unit")
            .ok_or_else(|| anyhow::anyhow!("Failed to extract unit from duration '{trimmed}'"))?
            .as_str();

        let number: u64 = number_str.parse().map_err(|e| {
            anyhow::anyhow!("Invalid duration number '{number_str}' in '{trimmed}': {e}")
        })?;

        let multiplier = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            "d" => 86400,
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid unit '{unit}' in duration '{trimmed}'. Expected: s, m, h, or d"
                ));
            }
        };

        seconds = number
            .checked_mul(multiplier)
            .and_then(|s| seconds.checked_add(s))
            .ok_or_else(|| anyhow::anyhow!("Duration '{trimmed}' is too large"))?;
    }

    if seconds == 0 {
        return Err(anyhow::anyhow!(
            "Duration must be greater than 0, got '{trimmed}'"
        ));
    }

    Ok(Duration::from_secs(seconds))
}
