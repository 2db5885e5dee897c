//! Build and revision metadata of the running release.
//!
//! `BuildInfo` is constructed once, eagerly, by whoever owns process startup
//! (see [`BuildInfo::from_env`]) and handed to the display layer by value.
//! Nothing here reads the environment lazily.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const GIT_REVISION_VAR: &str = "GIT_REVISION";
pub const BUILD_TIME_VAR: &str = "BUILD_TIME";

const SHORT_REVISION_LEN: usize = 7;

const MINUTES_IN_YEAR: i64 = 525_600;
const MINUTES_IN_QUARTER_YEAR: i64 = 131_400;
const MINUTES_IN_THREE_QUARTERS_YEAR: i64 = 394_200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Revision {
    Known(String),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub revision: Revision,
    pub build_time: Option<DateTime<Utc>>,
}

impl BuildInfo {
    /// Builds the metadata from `GIT_REVISION` and `BUILD_TIME`.
    pub fn from_env() -> Self {
        let revision = std::env::var(GIT_REVISION_VAR).ok();
        let build_time = std::env::var(BUILD_TIME_VAR).ok();
        Self::from_values(revision.as_deref(), build_time.as_deref())
    }

    /// Blank revisions count as unavailable; unparsable build times are dropped.
    pub fn from_values(revision: Option<&str>, build_time: Option<&str>) -> Self {
        let revision = match revision.map(str::trim) {
            Some(rev) if !rev.is_empty() => Revision::Known(rev.to_string()),
            _ => Revision::Unavailable,
        };

        Self {
            revision,
            build_time: build_time.and_then(parse_build_time),
        }
    }

    pub fn revision(&self) -> Option<&str> {
        match &self.revision {
            Revision::Known(rev) => Some(rev),
            Revision::Unavailable => None,
        }
    }

    pub fn revision_short(&self) -> Option<&str> {
        self.revision().map(|rev| match rev.char_indices().nth(SHORT_REVISION_LEN) {
            Some((idx, _)) => &rev[..idx],
            None => rev,
        })
    }

    pub fn build_time(&self) -> Option<DateTime<Utc>> {
        self.build_time
    }

    pub fn is_available(&self) -> bool {
        matches!(self.revision, Revision::Known(_))
    }

    /// "deployed 3 minutes ago", or `None` when the build time is unknown.
    pub fn deploy_timestamp(&self, now: DateTime<Utc>) -> Option<String> {
        self.build_time
            .map(|built| format!("deployed {} ago", distance_of_time_in_words(built, now)))
    }
}

fn parse_build_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = value.strip_suffix(" UTC").unwrap_or(value);
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Rails-style approximate distance between two instants.
pub fn distance_of_time_in_words(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    let (from, to) = if from <= to { (from, to) } else { (to, from) };
    let minutes = ((to - from).num_seconds() as f64 / 60.0).round() as i64;

    match minutes {
        0 => "less than a minute".to_string(),
        1 => "1 minute".to_string(),
        2..=44 => format!("{} minutes", minutes),
        45..=89 => "about 1 hour".to_string(),
        90..=1439 => format!("about {}", plural(rounded(minutes, 60), "hour")),
        1440..=2519 => "1 day".to_string(),
        2520..=43199 => plural(rounded(minutes, 1440), "day"),
        43200..=86399 => format!("about {}", plural(rounded(minutes, 43200), "month")),
        86400..=525599 => plural(rounded(minutes, 43200), "month"),
        _ => years_in_words(from, to, minutes),
    }
}

fn years_in_words(from: DateTime<Utc>, to: DateTime<Utc>, minutes: i64) -> String {
    let from_year = from.year() + i32::from(from.month() >= 3);
    let to_year = to.year() - i32::from(to.month() < 3);
    let leap_years = if from_year > to_year {
        0
    } else {
        (from_year..=to_year).filter(|y| is_leap_year(*y)).count() as i64
    };

    let minutes = minutes - leap_years * 1440;
    let remainder = minutes % MINUTES_IN_YEAR;
    let years = minutes / MINUTES_IN_YEAR;

    if remainder < MINUTES_IN_QUARTER_YEAR {
        format!("about {}", plural(years, "year"))
    } else if remainder < MINUTES_IN_THREE_QUARTERS_YEAR {
        format!("over {}", plural(years, "year"))
    } else {
        format!("almost {}", plural(years + 1, "year"))
    }
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

fn rounded(minutes: i64, unit: i64) -> i64 {
    (minutes as f64 / unit as f64).round() as i64
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}
