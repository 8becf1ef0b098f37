use crate::convention::{compile, CONVENTIONS};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static RE_EIGHT_DIGITS: LazyLock<Regex> = LazyLock::new(|| compile(r"[0-9]{8}"));

/// Calendar date embedded in a filename. Known device conventions are tried
/// first, then each eight-digit run from left to right. Runs do not
/// overlap: after an illegal run the search resumes past its last digit.
pub fn parse_filename_date(name: &str) -> Option<NaiveDate> {
    for convention in CONVENTIONS {
        if let Some(date) = convention.date_digits(name).and_then(parse_yyyymmdd) {
            return Some(date);
        }
    }

    RE_EIGHT_DIGITS
        .find_iter(name)
        .find_map(|run| parse_yyyymmdd(run.as_str()))
}

pub(crate) fn parse_yyyymmdd(digits: &str) -> Option<NaiveDate> {
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = digits[0..4].parse::<i32>().ok()?;
    let month = digits[4..6].parse::<u32>().ok()?;
    let day = digits[6..8].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
