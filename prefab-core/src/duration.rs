//! ISO-8601 durations.
//!
//! Accepts `P[nY][nM][nW][nD][T[nH][nM][nS]]` where every component may carry
//! a fraction. Years count as 365 days and months as 30 days.

use crate::error::{PrefabError, Result};
use std::time::Duration;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;

/// Parse an ISO-8601 duration definition.
pub fn parse_iso8601(definition: &str) -> Result<Duration> {
    let invalid = || PrefabError::Parse(format!("invalid ISO-8601 duration: {definition:?}"));

    let body = definition
        .trim()
        .strip_prefix(['P', 'p'])
        .ok_or_else(invalid)?;
    if body.is_empty() {
        return Err(invalid());
    }

    // Whole seconds and nanoseconds are accumulated separately so that
    // second-level fractions survive without float rounding.
    let mut whole_secs: u64 = 0;
    let mut nanos: u64 = 0;
    let mut in_time = false;
    let mut number = String::new();
    let mut saw_component = false;

    for ch in body.chars() {
        match ch {
            '0'..='9' | '.' | ',' => number.push(if ch == ',' { '.' } else { ch }),
            'T' | 't' => {
                if in_time || !number.is_empty() {
                    return Err(invalid());
                }
                in_time = true;
            }
            unit => {
                if number.is_empty() {
                    return Err(invalid());
                }
                let unit_secs = match (in_time, unit.to_ascii_uppercase()) {
                    (false, 'Y') => 365.0 * DAY,
                    (false, 'M') => 30.0 * DAY,
                    (false, 'W') => 7.0 * DAY,
                    (false, 'D') => DAY,
                    (true, 'H') => HOUR,
                    (true, 'M') => MINUTE,
                    (true, 'S') => 1.0,
                    _ => return Err(invalid()),
                };
                let (int_part, frac_part) = split_number(&number).ok_or_else(invalid)?;
                whole_secs = whole_secs
                    .checked_add(int_part.checked_mul(unit_secs as u64).ok_or_else(invalid)?)
                    .ok_or_else(invalid)?;
                if let Some(frac) = frac_part {
                    if unit_secs == 1.0 {
                        nanos += fraction_nanos(frac).ok_or_else(invalid)?;
                    } else {
                        let extra = frac.parse::<f64>().map_err(|_| invalid())? * unit_secs;
                        whole_secs += extra.trunc() as u64;
                        nanos += (extra.fract() * 1e9).round() as u64;
                    }
                }
                number.clear();
                saw_component = true;
            }
        }
    }

    if !number.is_empty() || !saw_component {
        return Err(invalid());
    }

    Ok(Duration::from_secs(whole_secs) + Duration::from_nanos(nanos))
}

/// Render a duration as an ISO-8601 definition (`PT<seconds>S`).
pub fn to_iso8601(duration: Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if nanos == 0 {
        format!("PT{secs}S")
    } else {
        let frac = format!("{nanos:09}");
        format!("PT{secs}.{}S", frac.trim_end_matches('0'))
    }
}

fn split_number(number: &str) -> Option<(u64, Option<String>)> {
    match number.split_once('.') {
        Some((int_part, frac)) => {
            let int_value = if int_part.is_empty() {
                0
            } else {
                int_part.parse().ok()?
            };
            if frac.is_empty() || frac.contains('.') {
                return None;
            }
            Some((int_value, Some(format!("0.{frac}"))))
        }
        None => Some((number.parse().ok()?, None)),
    }
}

fn fraction_nanos(frac: String) -> Option<u64> {
    let digits = frac.strip_prefix("0.")?;
    let mut padded: String = digits.chars().take(9).collect();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_components() {
        assert_eq!(parse_iso8601("PT90S").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_iso8601("PT1H30M").unwrap(), Duration::from_secs(5400));
        assert_eq!(
            parse_iso8601("PT0.25S").unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_parse_date_components() {
        assert_eq!(parse_iso8601("P1D").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_iso8601("P1W").unwrap(), Duration::from_secs(604_800));
        assert_eq!(
            parse_iso8601("P1DT1S").unwrap(),
            Duration::from_secs(86_401)
        );
        assert_eq!(parse_iso8601("P0.5D").unwrap(), Duration::from_secs(43_200));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_iso8601("").is_err());
        assert!(parse_iso8601("P").is_err());
        assert!(parse_iso8601("PT").is_err());
        assert!(parse_iso8601("1H").is_err());
        assert!(parse_iso8601("PT5").is_err());
        assert!(parse_iso8601("P5H").is_err());
        assert!(parse_iso8601("PTT5S").is_err());
    }

    #[test]
    fn test_render_is_parseable() {
        let d = Duration::from_millis(1500);
        assert_eq!(to_iso8601(d), "PT1.5S");
        assert_eq!(parse_iso8601(&to_iso8601(d)).unwrap(), d);
        assert_eq!(to_iso8601(Duration::from_secs(3)), "PT3S");
    }
}
