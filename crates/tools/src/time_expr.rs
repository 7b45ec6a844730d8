//! Natural-language time expressions → wall-clock timestamps.
//!
//! Resolution is always relative to a caller-supplied "now", so results are
//! deterministic under test. A missing date means today and a missing time
//! means midnight; text with neither is an error.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use regex_lite::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeParseError {
    #[error("no date or time expression found")]
    NoTimeExpression,

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("invalid time '{0}'")]
    InvalidTime(String),
}

/// Turns free text into a local start timestamp.
pub trait TimeExpressionParser: Send + Sync {
    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<NaiveDateTime, TimeParseError>;
}

/// Keyword and pattern based parser, tolerant of surrounding words.
///
/// Understands relative days (`today`, `tonight`, `tomorrow`,
/// `day after tomorrow`, `in 3 days`, `in 2 weeks`), weekday names (optionally
/// `next`), ISO dates, `MM/DD[/YYYY]`, `Month D[, YYYY]` and `D Month [YYYY]`,
/// plus times such as `3pm`, `3:30 pm`, `15:00`, `noon`, `midnight` and `at 3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyTimeParser;

impl FuzzyTimeParser {
    pub fn new() -> Self {
        Self
    }
}

impl TimeExpressionParser for FuzzyTimeParser {
    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<NaiveDateTime, TimeParseError> {
        let text = text.to_lowercase();
        let date = find_date(&text, now.date())?;
        let time = find_time(&text)?;

        // "tonight" pulls morning hours into the evening and defaults to 8pm
        let time = if is_match(&TONIGHT, &text) {
            match time {
                Some(t) if t.hour() < 12 => Some(hms(t.hour() + 12, t.minute(), t.second())?),
                Some(t) => Some(t),
                None => Some(hms(20, 0, 0)?),
            }
        } else {
            time
        };

        match (date, time) {
            (None, None) => Err(TimeParseError::NoTimeExpression),
            (date, time) => Ok(date
                .unwrap_or_else(|| now.date())
                .and_time(time.unwrap_or(NaiveTime::MIN))),
        }
    }
}

// ── Patterns ──────────────────────────────────────────────────────────────
//
// All patterns run against lowercased text. They are compiled lazily from
// constants; a pattern that fails to compile simply never matches.

const MONTHS: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

type Pattern = LazyLock<Option<Regex>>;

static ISO_DATE: Pattern = LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})").ok());
static MONTH_DAY: Pattern = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b{MONTHS}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?(?:,?\s+(\d{{4}}))?\b"
    ))
    .ok()
});
static DAY_MONTH: Pattern = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTHS}\b\.?(?:,?\s+(\d{{4}})\b)?"
    ))
    .ok()
});
static SLASH_DATE: Pattern =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b").ok());
static DAY_AFTER_TOMORROW: Pattern =
    LazyLock::new(|| Regex::new(r"\bday\s+after\s+tomorrow\b").ok());
static TOMORROW: Pattern = LazyLock::new(|| Regex::new(r"\btomorrow\b").ok());
static TODAY: Pattern = LazyLock::new(|| Regex::new(r"\btoday\b").ok());
static TONIGHT: Pattern = LazyLock::new(|| Regex::new(r"\btonight\b").ok());
static IN_N: Pattern =
    LazyLock::new(|| Regex::new(r"\bin\s+(\d{1,3})\s+(days?|weeks?)\b").ok());
static WEEKDAY: Pattern = LazyLock::new(|| {
    Regex::new(r"\b(next\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b").ok()
});

static NOON: Pattern = LazyLock::new(|| Regex::new(r"\b(noon|midday)\b").ok());
static MIDNIGHT: Pattern = LazyLock::new(|| Regex::new(r"\bmidnight\b").ok());
static AM_PM: Pattern =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?m\b").ok());
static CLOCK: Pattern = LazyLock::new(|| Regex::new(r"(\d{1,2}):(\d{2})(?::(\d{2}))?").ok());
static AT_HOUR: Pattern = LazyLock::new(|| Regex::new(r"\bat\s+(\d{1,2})\b").ok());

fn is_match(pattern: &Pattern, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

fn captures<'t>(pattern: &Pattern, text: &'t str) -> Option<regex_lite::Captures<'t>> {
    pattern.as_ref().and_then(|re| re.captures(text))
}

fn group_u32(caps: &regex_lite::Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, TimeParseError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| TimeParseError::InvalidDate(format!("{year:04}-{month:02}-{day:02}")))
}

fn hms(hour: u32, minute: u32, second: u32) -> Result<NaiveTime, TimeParseError> {
    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| TimeParseError::InvalidTime(format!("{hour:02}:{minute:02}")))
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
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

fn weekday_from_name(name: &str) -> Option<Weekday> {
    name.parse::<Weekday>().ok()
}

// ── Dates ─────────────────────────────────────────────────────────────────

fn find_date(text: &str, today: NaiveDate) -> Result<Option<NaiveDate>, TimeParseError> {
    if let Some(caps) = captures(&ISO_DATE, text) {
        let (Some(y), Some(m), Some(d)) = (group_u32(&caps, 1), group_u32(&caps, 2), group_u32(&caps, 3))
        else {
            return Err(TimeParseError::InvalidDate(caps[0].to_string()));
        };
        return ymd(y as i32, m, d).map(Some);
    }

    if let Some(caps) = captures(&MONTH_DAY, text) {
        let month = month_number(&caps[1]);
        let day = group_u32(&caps, 2);
        let year = group_u32(&caps, 3).map(|y| y as i32).unwrap_or(today.year());
        return match (month, day) {
            (Some(m), Some(d)) => ymd(year, m, d).map(Some),
            _ => Err(TimeParseError::InvalidDate(caps[0].to_string())),
        };
    }

    if let Some(caps) = captures(&DAY_MONTH, text) {
        let day = group_u32(&caps, 1);
        let month = month_number(&caps[2]);
        let year = group_u32(&caps, 3).map(|y| y as i32).unwrap_or(today.year());
        return match (month, day) {
            (Some(m), Some(d)) => ymd(year, m, d).map(Some),
            _ => Err(TimeParseError::InvalidDate(caps[0].to_string())),
        };
    }

    if let Some(caps) = captures(&SLASH_DATE, text) {
        let month = group_u32(&caps, 1);
        let day = group_u32(&caps, 2);
        let year = match caps.get(3).map(|m| m.as_str()) {
            Some(y) if y.len() == 2 => y.parse::<i32>().ok().map(|y| 2000 + y),
            Some(y) => y.parse::<i32>().ok(),
            None => Some(today.year()),
        };
        return match (year, month, day) {
            (Some(y), Some(m), Some(d)) => ymd(y, m, d).map(Some),
            _ => Err(TimeParseError::InvalidDate(caps[0].to_string())),
        };
    }

    if is_match(&DAY_AFTER_TOMORROW, text) {
        return Ok(Some(today + Duration::days(2)));
    }
    if is_match(&TOMORROW, text) {
        return Ok(Some(today + Duration::days(1)));
    }
    if is_match(&TODAY, text) || is_match(&TONIGHT, text) {
        return Ok(Some(today));
    }

    if let Some(caps) = captures(&IN_N, text) {
        let n = i64::from(group_u32(&caps, 1).unwrap_or(0));
        let days = if caps[2].starts_with("week") { n * 7 } else { n };
        return Ok(Some(today + Duration::days(days)));
    }

    if let Some(caps) = captures(&WEEKDAY, text) {
        if let Some(target) = weekday_from_name(&caps[2]) {
            let ahead = (i64::from(target.num_days_from_monday())
                - i64::from(today.weekday().num_days_from_monday()))
            .rem_euclid(7);
            // "next friday" never means today
            let ahead = if caps.get(1).is_some() && ahead == 0 { 7 } else { ahead };
            return Ok(Some(today + Duration::days(ahead)));
        }
    }

    Ok(None)
}

// ── Times ─────────────────────────────────────────────────────────────────

fn find_time(text: &str) -> Result<Option<NaiveTime>, TimeParseError> {
    if is_match(&NOON, text) {
        return hms(12, 0, 0).map(Some);
    }
    if is_match(&MIDNIGHT, text) {
        return Ok(Some(NaiveTime::MIN));
    }

    if let Some(caps) = captures(&AM_PM, text) {
        let hour = group_u32(&caps, 1).unwrap_or(0);
        let minute = group_u32(&caps, 2).unwrap_or(0);
        if !(1..=12).contains(&hour) {
            return Err(TimeParseError::InvalidTime(caps[0].to_string()));
        }
        let hour = match (&caps[3], hour) {
            ("a", 12) => 0,
            ("a", h) => h,
            ("p", 12) => 12,
            (_, h) => h + 12,
        };
        return hms(hour, minute, 0).map(Some);
    }

    if let Some(caps) = captures(&CLOCK, text) {
        let hour = group_u32(&caps, 1).unwrap_or(0);
        let minute = group_u32(&caps, 2).unwrap_or(0);
        let second = group_u32(&caps, 3).unwrap_or(0);
        return hms(hour, minute, second).map(Some);
    }

    if let Some(caps) = captures(&AT_HOUR, text) {
        let hour = group_u32(&caps, 1).unwrap_or(0);
        // A bare "at 3" is read as business hours, not 3am
        let hour = if (1..=7).contains(&hour) { hour + 12 } else { hour };
        return hms(hour, 0, 0).map(Some);
    }

    Ok(None)
}
