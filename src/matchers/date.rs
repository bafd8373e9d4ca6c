use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Deserialize;

use super::Comparison;
use crate::record::Scalar;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Day-first `%d/%m/%Y` is tried after the US form, so ambiguous dates read month-first.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%b %d %Y",
];

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec";

static RE_MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}}),?\s+(\d{{4}})\b"))
        .expect("valid month-day-year regex")
});
static RE_DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(\d{{1,2}})\s+({MONTHS})\.?,?\s+(\d{{4}})\b"))
        .expect("valid day-month-year regex")
});

/// Calendar-date equality under a fixed set of accepted formats.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateMatcher {
    /// Extra chrono formats tried after the built-in ones.
    #[serde(default)]
    pub extra_formats: Vec<String>,
}

impl DateMatcher {
    pub fn compare(&self, gold: &Scalar, predicted: &Scalar) -> Comparison {
        let gold_date = self.parse(gold);
        let predicted_date = self.parse(predicted);

        let (Some(gold_date), Some(predicted_date)) = (gold_date, predicted_date) else {
            return Comparison::Unparseable {
                gold: gold_date.is_none(),
                predicted: predicted_date.is_none(),
            };
        };

        if gold_date == predicted_date {
            Comparison::scored(1.0, gold_date.to_string())
        } else {
            let days = (gold_date - predicted_date).num_days().abs();
            Comparison::scored(
                0.0,
                format!("off by {days} days | {gold_date} vs {predicted_date}"),
            )
        }
    }

    fn parse(&self, value: &Scalar) -> Option<NaiveDate> {
        parse_date(value).or_else(|| {
            let Scalar::Text(text) = value else {
                return None;
            };
            self.extra_formats
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text.trim(), format).ok())
        })
    }
}

/// Parses a scalar as a calendar date; `None` when no accepted format applies.
pub fn parse_date(value: &Scalar) -> Option<NaiveDate> {
    match value {
        Scalar::Date(date) => Some(*date),
        Scalar::Text(text) => parse_date_text(text.trim()),
        Scalar::Null | Scalar::Bool(_) | Scalar::Number(_) => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.date());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(text, format) {
            return Some(parsed);
        }
    }

    if let Some(captures) = RE_MONTH_DAY_YEAR.captures(text) {
        return date_from_parts(&captures[3], &captures[1], &captures[2]);
    }
    if let Some(captures) = RE_DAY_MONTH_YEAR.captures(text) {
        return date_from_parts(&captures[3], &captures[2], &captures[1]);
    }
    None
}

fn date_from_parts(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year = year.parse::<i32>().ok()?;
    if !(1900..=2100).contains(&year) {
        return None;
    }
    let month = month_number(month)?;
    let day = day.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    let lowered = name.to_lowercase();
    let prefix = lowered.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
