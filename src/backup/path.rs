use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

/// `DD-MM-YY`, fixed separator regardless of host locale.
const DATE_KEY_FORMAT: &str = "%d-%m-%y";
/// `HHMM`, 24-hour clock.
const TIME_KEY_FORMAT: &str = "%H%M";

pub const DATE_KEY_LEN: usize = 8;
pub const TIME_KEY_LEN: usize = 4;

/// Where a snapshot taken at a given instant lives: `root/dateKey/timeKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPath {
    pub date_key: String,
    pub time_key: String,
    pub full_path: PathBuf,
}

impl SnapshotPath {
    pub fn key(&self) -> Option<SnapshotKey> {
        SnapshotKey::parse(&self.date_key, &self.time_key)
    }
}

pub fn resolve_snapshot_path<Tz: TimeZone>(now: &DateTime<Tz>, root: &Path) -> SnapshotPath
where
    Tz::Offset: std::fmt::Display,
{
    let date_key = now.format(DATE_KEY_FORMAT).to_string();
    let time_key = now.format(TIME_KEY_FORMAT).to_string();
    let full_path = root.join(&date_key).join(&time_key);

    SnapshotPath {
        date_key,
        time_key,
        full_path,
    }
}

/// Chronological identity of a snapshot directory pair.
///
/// Day-first date keys do not sort chronologically as plain strings
/// (`01-02-26` < `31-01-26`), so ordering goes through the parsed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotKey {
    date: DateKey,
    time: TimeKey,
}

impl SnapshotKey {
    pub fn parse(date_key: &str, time_key: &str) -> Option<Self> {
        Some(Self {
            date: DateKey::parse(date_key)?,
            time: TimeKey::parse(time_key)?,
        })
    }
}

/// Parsed `DD-MM-YY`, ordered as (year, month, day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateKey {
    year: u8,
    month: u8,
    day: u8,
}

impl DateKey {
    pub fn parse(name: &str) -> Option<Self> {
        if name.len() != DATE_KEY_LEN {
            return None;
        }
        let mut parts = name.split('-');
        let day = parse_two_digits(parts.next()?)?;
        let month = parse_two_digits(parts.next()?)?;
        let year = parse_two_digits(parts.next()?)?;
        if parts.next().is_some() || !(1..=31).contains(&day) || !(1..=12).contains(&month) {
            return None;
        }
        Some(Self { year, month, day })
    }
}

/// Parsed `HHMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeKey {
    hour: u8,
    minute: u8,
}

impl TimeKey {
    pub fn parse(name: &str) -> Option<Self> {
        if name.len() != TIME_KEY_LEN || !name.is_ascii() {
            return None;
        }
        let hour = parse_two_digits(&name[..2])?;
        let minute = parse_two_digits(&name[2..])?;
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }
}

fn parse_two_digits(value: &str) -> Option<u8> {
    if value.len() != 2 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Orders directory names by their parsed key; names that fail to parse rank
/// below every parsed name and fall back to plain string order among
/// themselves.
pub(crate) fn compare_names<K: Ord>(
    a: &str,
    b: &str,
    parse: impl Fn(&str) -> Option<K>,
) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}
