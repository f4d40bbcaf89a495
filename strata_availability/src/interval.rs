//! Half-open time intervals and merged interval lists.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// The half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, Error> {
        if end < start {
            return Err(Error::InvalidInterval {
                interval: format!("{start}/{end}"),
                reason: "end is before start".to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Overlapping or touching intervals can be merged into one.
    fn mergeable(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

impl FromStr for Interval {
    type Err = Error;

    /// Parses ISO-8601 `start/end`, where each side is an RFC 3339 timestamp or a bare date.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidInterval {
            interval: s.to_string(),
            reason: reason.to_string(),
        };
        let (start, end) = s.split_once('/').ok_or_else(|| invalid("expected start/end"))?;
        let start = parse_instant(start.trim()).ok_or_else(|| invalid("unparseable start"))?;
        let end = parse_instant(end.trim()).ok_or_else(|| invalid("unparseable end"))?;
        Self::new(start, end)
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}",
            self.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A sorted list of disjoint, non-touching intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SimplifiedIntervalList(Vec<Interval>);

impl SimplifiedIntervalList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interval, merging it with any it overlaps or touches.
    pub fn insert(&mut self, interval: Interval) {
        if interval.is_empty() {
            return;
        }
        let mut merged = interval;
        self.0.retain(|existing| {
            if existing.mergeable(&merged) {
                merged = Interval {
                    start: existing.start.min(merged.start),
                    end: existing.end.max(merged.end),
                };
                false
            } else {
                true
            }
        });
        let idx = self.0.partition_point(|i| i.start < merged.start);
        self.0.insert(idx, merged);
    }

    /// Is every instant of `interval` inside this list?
    pub fn covers(&self, interval: &Interval) -> bool {
        interval.is_empty() || self.0.iter().any(|i| i.contains(interval))
    }

    pub fn intersects(&self, interval: &Interval) -> bool {
        self.0.iter().any(|i| i.overlaps(interval))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Interval> for SimplifiedIntervalList {
    fn from_iter<T: IntoIterator<Item = Interval>>(iter: T) -> Self {
        let mut list = Self::new();
        for interval in iter {
            list.insert(interval);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn interval(s: &str) -> Interval {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display() {
        let i = interval("2024-01-01/2024-01-02");
        assert_eq!(
            i.to_string(),
            "2024-01-01T00:00:00.000Z/2024-01-02T00:00:00.000Z"
        );
        assert_eq!(interval(&i.to_string()), i);
        assert_eq!(
            interval("2024-01-01T06:00:00+02:00/2024-01-01T05:00:00Z").start(),
            interval("2024-01-01T04:00:00Z/2024-01-02").start()
        );

        assert_matches!(
            "2024-01-02/2024-01-01".parse::<Interval>(),
            Err(Error::InvalidInterval { .. })
        );
        assert_matches!("2024-01-01".parse::<Interval>(), Err(Error::InvalidInterval { .. }));
        assert_matches!("yesterday/today".parse::<Interval>(), Err(Error::InvalidInterval { .. }));
    }

    #[test]
    fn half_open_overlap() {
        let a = interval("2024-01-01/2024-01-02");
        let b = interval("2024-01-02/2024-01-03");
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&interval("2024-01-01T23:00:00Z/2024-01-03")));
    }

    #[test]
    fn simplify_merges_touching_and_overlapping() {
        let list: SimplifiedIntervalList = [
            interval("2024-01-03/2024-01-04"),
            interval("2024-01-01/2024-01-02"),
            interval("2024-01-02/2024-01-03"),
            interval("2024-01-10/2024-01-12"),
            interval("2024-01-11/2024-01-11"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            list.iter().map(ToString::to_string).collect::<Vec<_>>(),
            [
                "2024-01-01T00:00:00.000Z/2024-01-04T00:00:00.000Z",
                "2024-01-10T00:00:00.000Z/2024-01-12T00:00:00.000Z",
            ]
        );
        assert!(list.covers(&interval("2024-01-01/2024-01-04")));
        assert!(!list.covers(&interval("2024-01-03/2024-01-11")));
        assert!(list.intersects(&interval("2024-01-03/2024-01-11")));
        assert!(!list.intersects(&interval("2024-01-05/2024-01-10")));
        assert!(list.covers(&interval("2024-02-01/2024-02-01")));
    }
}
