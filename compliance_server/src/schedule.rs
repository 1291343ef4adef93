//! Recurrence rules and daypart windows for compliance task templates.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// How often a template is materialized into instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    /// Created on demand only, never by the generator.
    Triggered,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Triggered => "triggered",
        }
    }

    /// Checks `schedule_day` against the range this frequency accepts.
    pub fn validate_schedule_day(&self, day: Option<i32>) -> Result<(), String> {
        match (self, day) {
            (_, None) => Ok(()),
            (Frequency::Weekly, Some(d)) if (0..=6).contains(&d) => Ok(()),
            (Frequency::Weekly, Some(d)) => {
                Err(format!("schedule_day {} is not a weekday (0 = Monday .. 6 = Sunday)", d))
            }
            (Frequency::Monthly, Some(d)) if (1..=31).contains(&d) => Ok(()),
            (Frequency::Monthly, Some(d)) => Err(format!("schedule_day {} is not a day of month", d)),
            (Frequency::Daily | Frequency::Triggered, Some(_)) => {
                Err(format!("schedule_day is not used by {} templates", self.as_str()))
            }
        }
    }

    /// Whether a template with this frequency produces an instance on `date`.
    pub fn is_due_on(&self, schedule_day: Option<i32>, date: NaiveDate) -> bool {
        match self {
            Frequency::Daily => true,
            Frequency::Weekly => date.weekday().num_days_from_monday() as i32 == schedule_day.unwrap_or(0),
            Frequency::Monthly => {
                let wanted = schedule_day.unwrap_or(1) as u32;
                date.day() == wanted.min(last_day_of_month(date))
            }
            Frequency::Triggered => false,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "triggered" => Ok(Frequency::Triggered),
            other => Err(ParseEnumError::new("frequency", other)),
        }
    }
}

fn last_day_of_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Named time window of the business day a task is scheduled within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Daypart {
    Opening,
    Midday,
    Afternoon,
    Evening,
    Closing,
    Anytime,
}

impl Daypart {
    pub fn as_str(&self) -> &'static str {
        match self {
            Daypart::Opening => "opening",
            Daypart::Midday => "midday",
            Daypart::Afternoon => "afternoon",
            Daypart::Evening => "evening",
            Daypart::Closing => "closing",
            Daypart::Anytime => "anytime",
        }
    }

    /// Start and end of the window, in site-local wall time.
    pub fn window(&self) -> (NaiveTime, NaiveTime) {
        let hm = |h, m, s| NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN);
        match self {
            Daypart::Opening => (hm(5, 0, 0), hm(11, 0, 0)),
            Daypart::Midday => (hm(11, 0, 0), hm(14, 0, 0)),
            Daypart::Afternoon => (hm(14, 0, 0), hm(17, 0, 0)),
            Daypart::Evening => (hm(17, 0, 0), hm(21, 0, 0)),
            Daypart::Closing => (hm(21, 0, 0), hm(23, 59, 59)),
            Daypart::Anytime => (NaiveTime::MIN, hm(23, 59, 59)),
        }
    }

    /// Deadline of an instance due on `date` in this daypart.
    pub fn due_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.window().1)
    }
}

impl fmt::Display for Daypart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Daypart {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opening" => Ok(Daypart::Opening),
            "midday" => Ok(Daypart::Midday),
            "afternoon" => Ok(Daypart::Afternoon),
            "evening" => Ok(Daypart::Evening),
            "closing" => Ok(Daypart::Closing),
            "anytime" => Ok(Daypart::Anytime),
            other => Err(ParseEnumError::new("daypart", other)),
        }
    }
}

/// Kind of proof a template asks staff to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Temperature,
    Photo,
    Signature,
    Checkbox,
    Note,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Completed,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::Completed => "completed",
        }
    }
}

impl FromStr for InstanceStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InstanceStatus::Pending),
            "completed" => Ok(InstanceStatus::Completed),
            other => Err(ParseEnumError::new("status", other)),
        }
    }
}

/// Business date at the configured UTC offset.
pub fn today(utc_offset_minutes: i32) -> NaiveDate {
    local_now(utc_offset_minutes).date()
}

/// Wall-clock time at the configured UTC offset, comparable with `due_at`.
pub fn local_now(utc_offset_minutes: i32) -> NaiveDateTime {
    Utc::now().naive_utc() + Duration::minutes(utc_offset_minutes as i64)
}
