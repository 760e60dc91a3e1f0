use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// How a day partition is turned into its export key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScheme {
    /// Ordinal day of the year (1..=366). Jan 1st of two different years share
    /// the same key, so a sink that deduplicates by key skips the later year.
    #[default]
    DayOfYear,
    /// Days elapsed since 1970-01-01, unique across years.
    EpochDay,
}

impl KeyScheme {
    pub fn key_for(&self, day_start: DateTime<Utc>) -> i64 {
        match self {
            KeyScheme::DayOfYear => day_start.ordinal() as i64,
            KeyScheme::EpochDay => day_start.timestamp().div_euclid(86_400),
        }
    }
}

/// A one-day, half-open time range `[range_start, range_end)` of stored readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub key: i64,
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
}

impl Partition {
    pub fn for_day(day: NaiveDate, scheme: KeyScheme) -> Self {
        let range_start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
        Partition {
            key: scheme.key_for(range_start),
            range_start,
            range_end: range_start + TimeDelta::days(1),
        }
    }

    /// True if `ts` falls inside this partition.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.range_start <= ts && ts < self.range_end
    }
}

/// Lazy sequence of day partitions, see [`day_partitions`].
#[derive(Debug, Clone)]
pub struct DayPartitions {
    next_day: Option<NaiveDate>,
    end_day: NaiveDate,
    scheme: KeyScheme,
}

impl Iterator for DayPartitions {
    type Item = Partition;

    fn next(&mut self) -> Option<Partition> {
        let day = self.next_day.filter(|day| *day < self.end_day)?;
        self.next_day = day.succ_opt();
        Some(Partition::for_day(day, self.scheme))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next_day {
            Some(day) if day < self.end_day => (self.end_day - day).num_days() as usize,
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}

/// Every fully elapsed UTC day from the day containing `earliest` up to the day
/// before the one containing `now`.
///
/// The day containing `now` is still accumulating readings and is never yielded.
pub fn day_partitions(
    earliest: DateTime<Utc>,
    now: DateTime<Utc>,
    scheme: KeyScheme,
) -> DayPartitions {
    DayPartitions {
        next_day: Some(earliest.date_naive()),
        end_day: now.date_naive(),
        scheme,
    }
}
