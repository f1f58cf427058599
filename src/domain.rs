use std::collections::BTreeMap;

use chrono::{
    DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
    Utc,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Paused,
    Completed,
}

impl RecordStatus {
    pub fn label(self) -> &'static str {
        match self {
            RecordStatus::Paused => "paused",
            RecordStatus::Completed => "completed",
        }
    }
}

/// One finished stopwatch interval. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecord {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: RecordStatus,
}

impl TimeRecord {
    /// An `end` earlier than `start` is clamped so the interval is never negative.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, status: RecordStatus) -> Self {
        let end = end.max(start);
        Self {
            start,
            end,
            duration_ms: (end - start).num_milliseconds(),
            status,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }
}

/// Category -> task -> records, in append order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordLog {
    entries: BTreeMap<String, BTreeMap<String, Vec<TimeRecord>>>,
}

impl RecordLog {
    pub fn append_record(&mut self, category: &str, task: &str, record: TimeRecord) {
        self.entries
            .entry(category.to_string())
            .or_default()
            .entry(task.to_string())
            .or_default()
            .push(record);
    }

    /// Adds every record of `other` that this log does not already hold.
    pub fn merge(&mut self, other: RecordLog) {
        for (category, tasks) in other.entries {
            let known = self.entries.entry(category).or_default();
            for (task, records) in tasks {
                let existing = known.entry(task).or_default();
                let before = existing.len();
                for record in records {
                    if !existing.contains(&record) {
                        existing.push(record);
                    }
                }
                if existing.len() != before {
                    existing.sort_by_key(|record| record.end);
                }
            }
        }
    }

    pub fn records(&self, category: &str, task: &str) -> &[TimeRecord] {
        self.entries
            .get(category)
            .and_then(|tasks| tasks.get(task))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn last_status(&self, category: &str, task: &str) -> Option<RecordStatus> {
        self.records(category, task).last().map(|record| record.status)
    }

    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(|tasks| tasks.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sums durations per category for records whose start lies in `[day_start, day_end)`.
    pub fn daily_totals(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> BTreeMap<String, Duration> {
        let mut totals = BTreeMap::new();
        for (category, tasks) in &self.entries {
            for record in tasks.values().flatten() {
                if record.start < day_start || record.start >= day_end {
                    continue;
                }
                *totals
                    .entry(category.clone())
                    .or_insert_with(Duration::zero) += record.duration();
            }
        }
        totals
    }
}

/// The custom day containing `now`: `day_start_hour:00` local time until the
/// same hour on the following calendar day.
pub fn day_window(now: DateTime<Utc>, day_start_hour: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    day_window_in(now, day_start_hour, &Local)
}

pub fn day_window_in<Tz: TimeZone>(
    now: DateTime<Utc>,
    day_start_hour: u32,
    tz: &Tz,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = day_start_offset(day_start_hour);
    let day = day_for_timestamp(now, offset, tz);
    day_bounds_utc(day, offset, tz)
}

pub fn day_start_offset(day_start_hour: u32) -> Duration {
    Duration::hours(i64::from(day_start_hour.min(23)))
}

fn day_for_timestamp<Tz: TimeZone>(
    timestamp: DateTime<Utc>,
    day_start_offset: Duration,
    tz: &Tz,
) -> NaiveDate {
    (timestamp.with_timezone(tz).naive_local() - day_start_offset).date()
}

fn day_bounds_utc<Tz: TimeZone>(
    day: NaiveDate,
    day_start_offset: Duration,
    tz: &Tz,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_naive = day.and_time(NaiveTime::MIN) + day_start_offset;
    let end_naive = start_naive + Duration::days(1);
    (
        local_naive_to_utc_resolved(start_naive, tz),
        local_naive_to_utc_resolved(end_naive, tz),
    )
}

fn local_naive_to_utc<Tz: TimeZone>(naive: NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(datetime) => Some(datetime.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => {
            Some(first.with_timezone(&Utc).min(second.with_timezone(&Utc)))
        }
        LocalResult::None => None,
    }
}

// A boundary falling inside a DST gap moves forward to the first valid minute.
fn local_naive_to_utc_resolved<Tz: TimeZone>(naive: NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
    let mut cursor = naive;
    for _ in 0..=120 {
        if let Some(timestamp) = local_naive_to_utc(cursor, tz) {
            return timestamp;
        }
        cursor += Duration::minutes(1);
    }

    Utc.from_utc_datetime(&naive)
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// 12-hour wall clock, e.g. `" 9:05:03 PM"`.
pub fn format_clock(time: NaiveTime) -> String {
    let (is_pm, hour) = time.hour12();
    format!(
        "{hour:>2}:{:02}:{:02} {}",
        time.minute(),
        time.second(),
        if is_pm { "PM" } else { "AM" }
    )
}
