// Date expressions over ISO-8601 strings
// Author: Gabriel Demetrios Lafis

use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone,
    Timelike, Utc,
};
use serde::{Deserialize, Serialize};

use crate::data::{get_path, Record, Value};

/// Calendar unit used by `add`, `diff`, `startOf` and `endOf`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateUnit {
    #[serde(alias = "days")]
    Day,
    #[serde(alias = "weeks")]
    Week,
    #[serde(alias = "months")]
    Month,
    #[serde(alias = "years")]
    Year,
    #[serde(alias = "hours")]
    Hour,
    #[serde(alias = "minutes")]
    Minute,
    #[serde(alias = "seconds")]
    Second,
}

fn default_diff_unit() -> DateUnit {
    DateUnit::Day
}

/// Date operation, discriminated by `operation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum DateExpression {
    Now,
    /// Render with a strftime pattern
    Format { field: String, format: String },
    Add {
        field: String,
        amount: i64,
        unit: DateUnit,
    },
    /// Whole `unit`s from `compareTo` to `field`
    Diff {
        field: String,
        #[serde(rename = "compareTo")]
        compare_to: String,
        #[serde(default = "default_diff_unit")]
        unit: DateUnit,
    },
    Parse {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    StartOf { field: String, unit: DateUnit },
    EndOf { field: String, unit: DateUnit },
}

impl DateExpression {
    pub fn evaluate(&self, record: &Record) -> Option<Value> {
        let read = |field: &str| get_path(record, field).and_then(datetime_from_value);

        match self {
            DateExpression::Now => Some(Value::String(to_iso(&Utc::now()))),
            DateExpression::Format { field, format } => {
                let dt = read(field)?;
                format_datetime(&dt, format).map(Value::String)
            }
            DateExpression::Add { field, amount, unit } => {
                let dt = read(field)?;
                add_units(dt, *amount, *unit).map(|d| Value::String(to_iso(&d)))
            }
            DateExpression::Diff {
                field,
                compare_to,
                unit,
            } => {
                let dt = read(field)?;
                let other = read(compare_to).or_else(|| parse_datetime(compare_to))?;
                Some(Value::Integer(diff_units(dt, other, *unit)))
            }
            DateExpression::Parse { field, format } => {
                let value = get_path(record, field)?;
                let dt = match (value, format) {
                    (Value::String(text), Some(format)) => parse_with_format(text, format)?,
                    (value, _) => datetime_from_value(value)?,
                };
                Some(Value::String(to_iso(&dt)))
            }
            DateExpression::StartOf { field, unit } => {
                let dt = read(field)?;
                start_of(dt, *unit).map(|d| Value::String(to_iso(&d)))
            }
            DateExpression::EndOf { field, unit } => {
                let dt = read(field)?;
                end_of(dt, *unit).map(|d| Value::String(to_iso(&d)))
            }
        }
    }
}

/// Render a timestamp as ISO-8601 UTC with millisecond precision
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse RFC 3339, a zone-less date-time (taken as UTC) or a plain date
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Strings are parsed, integers are epoch milliseconds
fn datetime_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_datetime(text),
        Value::Integer(millis) => Utc.timestamp_millis_opt(*millis).single(),
        _ => None,
    }
}

fn valid_pattern(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

fn format_datetime(dt: &DateTime<Utc>, pattern: &str) -> Option<String> {
    // An invalid pattern would make `Display` fail
    if !valid_pattern(pattern) {
        return None;
    }
    Some(dt.format(pattern).to_string())
}

fn parse_with_format(text: &str, pattern: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
        return Some(Utc.from_utc_datetime(&naive));
    }

    NaiveDate::parse_from_str(text, pattern)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn shift_months(dt: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        dt.checked_add_months(magnitude)
    } else {
        dt.checked_sub_months(magnitude)
    }
}

pub fn add_units(dt: DateTime<Utc>, amount: i64, unit: DateUnit) -> Option<DateTime<Utc>> {
    let delta = match unit {
        DateUnit::Second => Duration::try_seconds(amount)?,
        DateUnit::Minute => Duration::try_minutes(amount)?,
        DateUnit::Hour => Duration::try_hours(amount)?,
        DateUnit::Day => Duration::try_days(amount)?,
        DateUnit::Week => Duration::try_weeks(amount)?,
        DateUnit::Month => return shift_months(dt, amount),
        DateUnit::Year => return shift_months(dt, amount.checked_mul(12)?),
    };

    dt.checked_add_signed(delta)
}

/// Whole calendar months from `from` to `to`, truncated toward zero
fn months_between(to: DateTime<Utc>, from: DateTime<Utc>) -> i64 {
    let mut months =
        (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64);

    if months > 0 && shift_months(from, months).map_or(false, |d| d > to) {
        months -= 1;
    } else if months < 0 && shift_months(from, months).map_or(false, |d| d < to) {
        months += 1;
    }

    months
}

pub fn diff_units(to: DateTime<Utc>, from: DateTime<Utc>, unit: DateUnit) -> i64 {
    let delta = to - from;
    match unit {
        DateUnit::Second => delta.num_seconds(),
        DateUnit::Minute => delta.num_minutes(),
        DateUnit::Hour => delta.num_hours(),
        DateUnit::Day => delta.num_days(),
        DateUnit::Week => delta.num_weeks(),
        DateUnit::Month => months_between(to, from),
        DateUnit::Year => months_between(to, from) / 12,
    }
}

pub fn start_of(dt: DateTime<Utc>, unit: DateUnit) -> Option<DateTime<Utc>> {
    let date = dt.date_naive();
    let naive = match unit {
        DateUnit::Second => date.and_hms_opt(dt.hour(), dt.minute(), dt.second())?,
        DateUnit::Minute => date.and_hms_opt(dt.hour(), dt.minute(), 0)?,
        DateUnit::Hour => date.and_hms_opt(dt.hour(), 0, 0)?,
        DateUnit::Day => date.and_hms_opt(0, 0, 0)?,
        DateUnit::Week => {
            let monday = date
                .checked_sub_signed(Duration::try_days(date.weekday().num_days_from_monday() as i64)?)?;
            monday.and_hms_opt(0, 0, 0)?
        }
        DateUnit::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0)?,
        DateUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
    };

    Some(Utc.from_utc_datetime(&naive))
}

/// Last millisecond of the unit containing `dt`
pub fn end_of(dt: DateTime<Utc>, unit: DateUnit) -> Option<DateTime<Utc>> {
    let next = add_units(start_of(dt, unit)?, 1, unit)?;
    next.checked_sub_signed(Duration::try_milliseconds(1)?)
}
