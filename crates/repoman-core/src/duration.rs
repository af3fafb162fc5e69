//! ISO-8601 durations (`P30D`, `PT12H`, `P1Y2M`, `P2W`) as used by the
//! pull request age filters.
//!
//! Years and months have no fixed length; they are approximated as 365 and
//! 30 days.

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;

use crate::error::RepomanError;

static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
        .expect("duration pattern is valid")
});

pub fn parse_iso8601(input: &str) -> Result<Duration, RepomanError> {
    let invalid = || RepomanError::Config {
        message: format!("invalid ISO 8601 duration: {input:?}"),
    };

    let trimmed = input.trim().to_uppercase();
    // "P" and "PT" match the pattern but carry no components.
    if trimmed == "P" || trimmed.ends_with('T') {
        return Err(invalid());
    }
    let caps = PATTERN.captures(&trimmed).ok_or_else(invalid)?;

    let field = |idx: usize| -> Result<i64, RepomanError> {
        caps.get(idx)
            .map(|m| m.as_str().parse::<i64>().map_err(|_| invalid()))
            .unwrap_or(Ok(0))
    };

    // Sum of `field(idx) * unit` over the given components, None on overflow.
    let weighted = |parts: &[(usize, i64)]| -> Result<Option<i64>, RepomanError> {
        let mut total = Some(0i64);
        for &(idx, unit) in parts {
            let value = field(idx)?;
            total = total.and_then(|t| value.checked_mul(unit)?.checked_add(t));
        }
        Ok(total)
    };

    let days = weighted(&[(1, 365), (2, 30), (3, 7), (4, 1)])?.ok_or_else(invalid)?;
    let seconds = weighted(&[(5, 3600), (6, 60), (7, 1)])?.ok_or_else(invalid)?;

    Duration::try_days(days)
        .and_then(|d| d.checked_add(&Duration::try_seconds(seconds)?))
        .ok_or_else(invalid)
}
