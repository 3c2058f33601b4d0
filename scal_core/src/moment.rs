//! This module turns loosely written date texts into precise moments.
//!
//! Collection dates on the status page come in many shapes, e.g. `15 July 2025`,
//! `Tuesday, 15th July`, or `Tuesday, 15th July at 11:10am (this collection was adjusted ...)`.
//! Parsing never fails loudly: an unrecognised text is reported as [`UnparseableDate`].

use std::{fmt, sync::OnceLock};

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use thiserror::Error;

static TIME_SEPARATOR: &str = " at ";
static ADJUSTMENT_NOTE: &str = "(this collection was adjusted";
static DATE_FORMAT: &str = "%d %B %Y";
static DATE_KEY_FORMAT: &str = "%Y%m%d";

/// A calendar day with an optional clock time.
///
/// Without a time the moment denotes the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParsedMoment {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl ParsedMoment {
    pub fn all_day(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    pub fn at(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            date,
            time: Some(time),
        }
    }

    /// Whether a time other than midnight is attached.
    pub fn has_explicit_time(&self) -> bool {
        self.time.is_some_and(|time| time != NaiveTime::MIN)
    }

    /// The key shared by all moments on the same calendar day.
    pub fn date_key(&self) -> String {
        self.date.format(DATE_KEY_FORMAT).to_string()
    }

    /// The date and time, if an explicit time is attached.
    pub fn date_time(&self) -> Option<NaiveDateTime> {
        self.time
            .filter(|_| self.has_explicit_time())
            .map(|time| self.date.and_time(time))
    }
}

impl fmt::Display for ParsedMoment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date_time() {
            Some(date_time) => write!(f, "{}", date_time.format("%Y-%m-%d %H:%M")),
            None => write!(f, "{}", self.date),
        }
    }
}

/// The text matches none of the recognised date shapes.
///
/// Such a fragment is informational text only and can't become an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable date text {text:?}")]
pub struct UnparseableDate {
    pub text: String,
}

type DateStrategy = fn(&str, i32) -> Option<NaiveDate>;

/// Date strategies in priority order, the first success wins.
static DATE_STRATEGIES: [(&str, DateStrategy); 2] = [
    ("day month year", day_month_year),
    ("day month", day_month_in_year),
];

type TimeStrategy = fn(&str) -> Option<NaiveTime>;

static TIME_STRATEGIES: [(&str, TimeStrategy); 2] = [
    ("12-hour", twelve_hour_time),
    ("24-hour", twenty_four_hour_time),
];

/// Parse a date text using the current year where the text has none.
pub fn parse_moment(text: &str) -> Result<ParsedMoment, UnparseableDate> {
    parse_moment_in_year(text, Local::now().year())
}

/// Parse a date text using `year` where the text has none.
pub fn parse_moment_in_year(text: &str, year: i32) -> Result<ParsedMoment, UnparseableDate> {
    let unparseable = || UnparseableDate {
        text: text.to_string(),
    };
    let trimmed = trim_trailing_punctuation(text);
    let (date_clause, time_clause) = match trimmed.split_once(TIME_SEPARATOR) {
        Some((date_clause, time_clause)) => (date_clause, Some(time_clause)),
        None => (trimmed, None),
    };
    let date_clause = weekday_free(strip_adjustment_note(date_clause));
    let date_clause = strip_ordinals(date_clause);
    let date = DATE_STRATEGIES
        .iter()
        .find_map(|(_, strategy)| strategy(&date_clause, year))
        .ok_or_else(unparseable)?;
    // The year of the time clause is never used, only the clock time.
    let time = time_clause
        .map(strip_adjustment_note)
        .and_then(parse_time);
    Ok(ParsedMoment { date, time })
}

/// Parse a clock time like `11:10am`, `8 pm` or `18:30`.
pub fn parse_time(clause: &str) -> Option<NaiveTime> {
    let clause = trim_trailing_punctuation(clause);
    TIME_STRATEGIES
        .iter()
        .find_map(|(_, strategy)| strategy(clause))
}

fn trim_trailing_punctuation(text: &str) -> &str {
    text.trim()
        .trim_end_matches(|c: char| matches!(c, ',' | '.' | ';') || c.is_whitespace())
}

fn strip_adjustment_note(clause: &str) -> &str {
    let clause = match clause.find(ADJUSTMENT_NOTE) {
        Some(index) => &clause[..index],
        None => clause,
    };
    trim_trailing_punctuation(clause)
}

/// Drop a leading weekday, i.e. keep the component after the first comma.
///
/// The first component isn't checked to be a weekday.
fn weekday_free(clause: &str) -> &str {
    let Some((_, rest)) = clause.split_once(',') else {
        return clause;
    };
    let rest = rest.trim_start();
    match rest.split_once(", ") {
        Some((component, _)) => component.trim(),
        None => rest.trim(),
    }
}

fn strip_ordinals(clause: &str) -> String {
    static ORDINAL: OnceLock<Regex> = OnceLock::new();
    let ordinal = ORDINAL
        .get_or_init(|| Regex::new(r"(?i)(\d+)(?:st|nd|rd|th)").expect("ordinal regex is valid"));
    ordinal.replace_all(clause, "${1}").into_owned()
}

fn has_four_digit_year(clause: &str) -> bool {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"\d{4}").expect("year regex is valid"))
        .is_match(clause)
}

fn day_month_year(clause: &str, _year: i32) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(clause, DATE_FORMAT).ok()
}

fn day_month_in_year(clause: &str, year: i32) -> Option<NaiveDate> {
    if has_four_digit_year(clause) {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{clause} {year}"), DATE_FORMAT).ok()
}

fn twelve_hour_time(clause: &str) -> Option<NaiveTime> {
    static TWELVE_HOUR: OnceLock<Regex> = OnceLock::new();
    let twelve_hour = TWELVE_HOUR.get_or_init(|| {
        Regex::new(
            r"(?xi)
                ^(?P<hour>\d{1,2})
                (?::(?P<minute>\d{2}))? # minutes are optional, e.g. 8am
                \s*
                (?P<meridiem>[ap])\.?m\.?
                \b",
        )
        .expect("12-hour regex is valid")
    });
    let captures = twelve_hour.captures(clause)?;
    let hour: u32 = captures["hour"].parse().ok()?;
    let minute: u32 = match captures.name("minute") {
        Some(minute) => minute.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match captures["meridiem"].to_ascii_lowercase().as_str() {
        "a" => hour % 12,
        _ => hour % 12 + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn twenty_four_hour_time(clause: &str) -> Option<NaiveTime> {
    static TWENTY_FOUR_HOUR: OnceLock<Regex> = OnceLock::new();
    let twenty_four_hour = TWENTY_FOUR_HOUR.get_or_init(|| {
        Regex::new(r"^(?P<hour>\d{1,2}):(?P<minute>\d{2})\b").expect("24-hour regex is valid")
    });
    let captures = twenty_four_hour.captures(clause)?;
    NaiveTime::from_hms_opt(
        captures["hour"].parse().ok()?,
        captures["minute"].parse().ok()?,
        0,
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use crate::moment::{parse_moment, parse_moment_in_year, parse_time, ParsedMoment};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn test_day_month_year() {
        for (text, expected) in [
            ("15 July 2024", date(2024, 7, 15)),
            ("1 January 2026", date(2026, 1, 1)),
            ("31 December 1999", date(1999, 12, 31)),
            ("29 February 2028", date(2028, 2, 29)),
        ] {
            let parsed = parse_moment_in_year(text, 2025).unwrap();
            assert_eq!(parsed, ParsedMoment::all_day(expected), "{text}");
        }
    }

    #[test]
    fn test_missing_year_uses_given_year() {
        let parsed = parse_moment_in_year("15th July", 2031).unwrap();
        assert_eq!(parsed, ParsedMoment::all_day(date(2031, 7, 15)));
    }

    #[test]
    fn test_missing_year_uses_current_year() {
        use chrono::{Datelike, Local};

        let parsed = parse_moment("15th July").unwrap();
        assert_eq!(parsed.date, date(Local::now().year(), 7, 15));
    }

    #[test]
    fn test_weekday_with_time() {
        let parsed = parse_moment_in_year("Tuesday, 3rd March at 8:05am", 2026).unwrap();
        assert_eq!(parsed, ParsedMoment::at(date(2026, 3, 3), time(8, 5)));
        assert!(parsed.has_explicit_time());
    }

    #[test]
    fn test_ordinals_are_stripped_for_every_day() {
        for day in 1..=31u32 {
            let suffix = match day {
                1 | 21 | 31 => "st",
                2 | 22 => "nd",
                3 | 23 => "rd",
                _ => "th",
            };
            let text = format!("{day}{suffix} January 2025");
            let parsed = parse_moment_in_year(&text, 2000).unwrap();
            assert_eq!(parsed.date, date(2025, 1, day), "{text}");
        }
    }

    #[test]
    fn test_adjustment_note_is_ignored() {
        let parsed = parse_moment_in_year(
            "Friday, 18th July (this collection was adjusted from its usual time)",
            2025,
        )
        .unwrap();
        assert_eq!(parsed, ParsedMoment::all_day(date(2025, 7, 18)));
        let parsed = parse_moment_in_year(
            "Friday, 18th July at 7:00am (this collection was adjusted from Thursday)",
            2025,
        )
        .unwrap();
        assert_eq!(parsed, ParsedMoment::at(date(2025, 7, 18), time(7, 0)));
    }

    #[test]
    fn test_trailing_punctuation() {
        let parsed = parse_moment_in_year("Monday, 4th August,", 2025).unwrap();
        assert_eq!(parsed, ParsedMoment::all_day(date(2025, 8, 4)));
        let parsed = parse_moment_in_year("15th July at 11:10am.", 2025).unwrap();
        assert_eq!(parsed, ParsedMoment::at(date(2025, 7, 15), time(11, 10)));
    }

    #[test]
    fn test_weekday_with_year() {
        let parsed = parse_moment_in_year("Wednesday, 1st October 2025", 2020).unwrap();
        assert_eq!(parsed, ParsedMoment::all_day(date(2025, 10, 1)));
    }

    #[test]
    fn test_text_after_first_comma_is_authoritative() {
        let parsed = parse_moment_in_year("Next pick-up, 9th May", 2025).unwrap();
        assert_eq!(parsed, ParsedMoment::all_day(date(2025, 5, 9)));
        let parsed = parse_moment_in_year("Tuesday, 15th July, 2024", 2025).unwrap();
        assert_eq!(parsed, ParsedMoment::all_day(date(2025, 7, 15)));
    }

    #[test]
    fn test_year_in_time_clause_is_ignored() {
        let parsed = parse_moment_in_year("15th July at 11:10am 2030", 2025).unwrap();
        assert_eq!(parsed, ParsedMoment::at(date(2025, 7, 15), time(11, 10)));
    }

    #[test]
    fn test_unparseable_time_keeps_the_date() {
        let parsed = parse_moment_in_year("15th July at lunchtime", 2025).unwrap();
        assert_eq!(parsed, ParsedMoment::all_day(date(2025, 7, 15)));
    }

    #[test]
    fn test_unparseable() {
        for text in [
            "",
            "Loading your bin days...",
            "15th Smarch 2025",
            "Tuesday, soon",
            "31st February 2025",
            "2025-07-15",
        ] {
            let error = parse_moment_in_year(text, 2025).unwrap_err();
            assert_eq!(error.text, text);
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("11:10am"), Some(time(11, 10)));
        assert_eq!(parse_time("11:10 PM"), Some(time(23, 10)));
        assert_eq!(parse_time("12:00am"), Some(time(0, 0)));
        assert_eq!(parse_time("12:30pm"), Some(time(12, 30)));
        assert_eq!(parse_time("8pm"), Some(time(20, 0)));
        assert_eq!(parse_time("7:15 a.m."), Some(time(7, 15)));
        assert_eq!(parse_time("18:30"), Some(time(18, 30)));
        assert_eq!(parse_time("0:05"), Some(time(0, 5)));
        assert_eq!(parse_time("13:00pm"), None);
        assert_eq!(parse_time("24:00"), None);
        assert_eq!(parse_time("noon"), None);
        assert_eq!(parse_time("1800"), None);
    }

    #[test]
    fn test_midnight_is_not_explicit() {
        let moment = ParsedMoment::at(date(2025, 7, 15), time(0, 0));
        assert!(!moment.has_explicit_time());
        assert_eq!(moment.date_time(), None);
        assert_eq!(moment.date_key(), "20250715");
    }
}
