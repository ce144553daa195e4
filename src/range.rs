//! Comma-separated numeric range expressions (`"1,2,4"`, `"3-7,3,7-10"`, `"5-N"`)
//!
//! One parser serves both page selection and positional file selection.
//! The open upper bound `N` is resolved against the caller's maximum at
//! evaluation time, never at parse time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const OPEN_END: &str = "N";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("invalid range token '{token}': {reason}")]
    InvalidRange { token: String, reason: String },

    #[error("range expression is empty")]
    Empty,
}

/// Upper bound of an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    At(u32),
    /// `N`: the caller-supplied maximum
    End,
}

/// Inclusive interval, `low >= 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub low: u32,
    pub high: Bound,
}

impl Interval {
    fn resolved_high(&self, max: u32) -> u32 {
        match self.high {
            Bound::At(high) => high.min(max),
            Bound::End => max,
        }
    }

    fn contains(&self, n: u32, max: u32) -> bool {
        n >= self.low && n <= self.resolved_high(max)
    }
}

/// Parsed range expression; membership is the union of its intervals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    intervals: Vec<Interval>,
}

impl RangeSpec {
    pub fn parse(text: &str) -> Result<Self, RangeError> {
        if text.trim().is_empty() {
            return Err(RangeError::Empty);
        }

        let intervals = text
            .split(',')
            .map(parse_token)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { intervals })
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Whether `n` (1-based) is selected when the domain is `1..=max`
    pub fn contains(&self, n: u32, max: u32) -> bool {
        n >= 1 && n <= max && self.intervals.iter().any(|i| i.contains(n, max))
    }

    /// All selected numbers in `1..=max`, ascending and deduplicated
    pub fn expand(&self, max: u32) -> BTreeSet<u32> {
        self.intervals
            .iter()
            .flat_map(|interval| interval.low..=interval.resolved_high(max))
            .collect()
    }
}

fn parse_token(raw: &str) -> Result<Interval, RangeError> {
    let token = raw.trim();
    let invalid = |reason: &str| RangeError::InvalidRange {
        token: token.to_string(),
        reason: reason.to_string(),
    };

    if token.is_empty() {
        return Err(invalid("empty token"));
    }

    if token == OPEN_END {
        return Err(invalid("bare 'N' has no low bound, use 'k-N'"));
    }

    let (low, high) = match token.split_once('-') {
        Some((low, high)) => (low.trim(), Some(high.trim())),
        None => (token, None),
    };

    let low = parse_number(low).map_err(|reason| invalid(&reason))?;
    let high = match high {
        None => Bound::At(low),
        Some(OPEN_END) => Bound::End,
        Some(high) => Bound::At(parse_number(high).map_err(|reason| invalid(&reason))?),
    };

    if let Bound::At(high) = high {
        if low > high {
            return Err(invalid("low bound exceeds high bound"));
        }
    }

    Ok(Interval { low, high })
}

fn parse_number(text: &str) -> Result<u32, String> {
    let value: i64 = text
        .parse()
        .map_err(|_| format!("'{text}' is not a number"))?;
    if value <= 0 {
        return Err(format!("'{text}' must be positive"));
    }
    u32::try_from(value).map_err(|_| format!("'{text}' is too large"))
}

impl FromStr for RangeSpec {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, interval) in self.intervals.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            match interval.high {
                Bound::At(high) if high == interval.low => write!(f, "{}", interval.low)?,
                Bound::At(high) => write!(f, "{}-{}", interval.low, high)?,
                Bound::End => write!(f, "{}-{OPEN_END}", interval.low)?,
            }
        }
        Ok(())
    }
}

impl Serialize for RangeSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RangeSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_values() {
        let range = RangeSpec::parse("1,2,4").unwrap();
        assert_eq!(range.expand(10), BTreeSet::from([1, 2, 4]));
    }

    #[test]
    fn test_overlapping_intervals_union() {
        let range = RangeSpec::parse("3-7,3,7-10").unwrap();
        assert_eq!(range.expand(10), (3..=10).collect::<BTreeSet<u32>>());
    }

    #[test]
    fn test_open_end_resolves_at_evaluation() {
        let range = RangeSpec::parse("2-N").unwrap();
        assert_eq!(range.expand(4), BTreeSet::from([2, 3, 4]));
        assert_eq!(range.expand(6).len(), 5);
        assert!(range.contains(6, 6));
        assert!(!range.contains(7, 6));
    }

    #[test]
    fn test_values_beyond_max_are_dropped() {
        let range = RangeSpec::parse("1,8-12").unwrap();
        assert_eq!(range.expand(9), BTreeSet::from([1, 8, 9]));
        assert!(!range.contains(10, 9));
    }

    #[test]
    fn test_whitespace_tolerated() {
        let range = RangeSpec::parse(" 1 , 3 - 4 ").unwrap();
        assert_eq!(range.expand(5), BTreeSet::from([1, 3, 4]));
    }

    #[test]
    fn test_invalid_ranges() {
        for bad in ["5-3", "0", "-1", "1,,2", "a-b", "1-", "N", "N-3", "2-0"] {
            let result = RangeSpec::parse(bad);
            assert!(
                matches!(result, Err(RangeError::InvalidRange { .. })),
                "expected InvalidRange for {bad:?}, got {result:?}"
            );
        }
        assert_eq!(RangeSpec::parse("  "), Err(RangeError::Empty));
    }

    #[test]
    fn test_display_round_trip() {
        let range = RangeSpec::parse("1,3-5,7-N").unwrap();
        assert_eq!(range.to_string(), "1,3-5,7-N");
    }
}
