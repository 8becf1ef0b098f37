use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_FOLDER_TEMPLATE: &str = "YYYYMMDD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePart {
    Separator(char),
    Token(Token),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Year4,
    Year2,
    Month,
    Day,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("folder template is empty")]
    Empty,
    #[error("'{token}' must be repeated {expected} times, found {found}")]
    InvalidRun {
        token: char,
        expected: &'static str,
        found: usize,
    },
    #[error("unsupported character '{0}' in folder template")]
    UnexpectedChar(char),
    #[error("folder template needs at least one of YYYY, YY, MM, DD")]
    NoToken,
}

/// Destination subfolder layout, e.g. `YYYY-MM-DD` or `YY.MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FolderTemplate {
    raw: String,
    parts: Vec<TemplatePart>,
}

impl FolderTemplate {
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let parts = parse_template(input)?;
        Ok(Self {
            raw: input.to_string(),
            parts,
        })
    }

    /// Validates user input against the current template. On error the
    /// caller keeps `self`, the last valid value.
    pub fn revise(&self, input: &str) -> Result<Self, TemplateError> {
        Self::parse(input.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn apply(&self, date: NaiveDate) -> String {
        render_template(&self.parts, date)
    }
}

impl Default for FolderTemplate {
    fn default() -> Self {
        Self {
            raw: DEFAULT_FOLDER_TEMPLATE.to_string(),
            parts: vec![
                TemplatePart::Token(Token::Year4),
                TemplatePart::Token(Token::Month),
                TemplatePart::Token(Token::Day),
            ],
        }
    }
}

impl fmt::Display for FolderTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for FolderTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FolderTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FolderTemplate> for String {
    fn from(value: FolderTemplate) -> Self {
        value.raw
    }
}

pub fn is_valid(input: &str) -> bool {
    parse_template(input).is_ok()
}

pub fn parse_template(input: &str) -> Result<Vec<TemplatePart>, TemplateError> {
    if input.is_empty() {
        return Err(TemplateError::Empty);
    }

    let chars: Vec<char> = input.chars().collect();
    let mut parts = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '-' | '_' | '.' => {
                parts.push(TemplatePart::Separator(ch));
                i += 1;
            }
            'Y' | 'M' | 'D' => {
                let run = chars[i..].iter().take_while(|c| **c == ch).count();
                parts.push(TemplatePart::Token(token_for_run(ch, run)?));
                i += run;
            }
            other => return Err(TemplateError::UnexpectedChar(other)),
        }
    }

    if !parts.iter().any(|part| matches!(part, TemplatePart::Token(_))) {
        return Err(TemplateError::NoToken);
    }

    Ok(parts)
}

pub fn render_template(parts: &[TemplatePart], date: NaiveDate) -> String {
    let mut output = String::with_capacity(parts.len() * 2 + 4);
    for part in parts {
        match part {
            TemplatePart::Separator(ch) => output.push(*ch),
            TemplatePart::Token(Token::Year4) => output.push_str(&format!("{:04}", date.year())),
            TemplatePart::Token(Token::Year2) => {
                output.push_str(&format!("{:02}", date.year().rem_euclid(100)))
            }
            TemplatePart::Token(Token::Month) => output.push_str(&format!("{:02}", date.month())),
            TemplatePart::Token(Token::Day) => output.push_str(&format!("{:02}", date.day())),
        }
    }
    output
}

fn token_for_run(ch: char, run: usize) -> Result<Token, TemplateError> {
    match (ch, run) {
        ('Y', 4) => Ok(Token::Year4),
        ('Y', 2) => Ok(Token::Year2),
        ('M', 2) => Ok(Token::Month),
        ('D', 2) => Ok(Token::Day),
        ('Y', found) => Err(TemplateError::InvalidRun {
            token: 'Y',
            expected: "2 or 4",
            found,
        }),
        (token, found) => Err(TemplateError::InvalidRun {
            token,
            expected: "2",
            found,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn apply_renders_tokens_and_keeps_separators() {
        let date = ymd(2025, 1, 4);
        let apply = |t: &str| FolderTemplate::parse(t).expect("valid").apply(date);
        assert_eq!(apply("YYYY-MM-DD"), "2025-01-04");
        assert_eq!(apply("YY.MM.DD"), "25.01.04");
        assert_eq!(apply("YYYYMMDD"), "20250104");
        assert_eq!(apply("_YYYY__MM."), "_2025__01.");
        assert_eq!(apply("DDMMYY"), "040125");
    }

    #[test]
    fn small_years_are_zero_padded() {
        let template = FolderTemplate::parse("YYYY_YY").expect("valid");
        assert_eq!(template.apply(ymd(7, 3, 9)), "0007_07");
    }

    #[test]
    fn validation_rejects_bad_runs_characters_and_empty() {
        assert!(!is_valid("YYYYY"));
        assert!(!is_valid("YYYY/MM/DD"));
        assert!(!is_valid(""));
        assert!(!is_valid("Y"));
        assert!(!is_valid("MMM"));
        assert!(!is_valid("--.__"));
        assert!(!is_valid("yyyy"));
        assert!(is_valid("YYYYMMDD"));
        assert!(is_valid("YYYY_MM"));
        assert!(is_valid("DD"));
    }

    #[test]
    fn errors_name_the_offending_input() {
        assert_eq!(
            parse_template("YYYYY").expect_err("must fail"),
            TemplateError::InvalidRun {
                token: 'Y',
                expected: "2 or 4",
                found: 5
            }
        );
        assert_eq!(
            parse_template("YYYY/MM").expect_err("must fail"),
            TemplateError::UnexpectedChar('/')
        );
        assert_eq!(parse_template("-_-").expect_err("must fail"), TemplateError::NoToken);
        assert_eq!(parse_template("").expect_err("must fail"), TemplateError::Empty);
    }

    #[test]
    fn revise_keeps_last_valid_on_error() {
        let current = FolderTemplate::default();
        assert_eq!(current.as_str(), DEFAULT_FOLDER_TEMPLATE);

        let revised = current.revise(" YYYY-MM ").expect("valid");
        assert_eq!(revised.as_str(), "YYYY-MM");

        let kept = revised.revise("YYYY/MM").unwrap_or_else(|_| revised.clone());
        assert_eq!(kept, revised);
    }

    #[test]
    fn default_matches_parsed_default() {
        let parsed = FolderTemplate::parse(DEFAULT_FOLDER_TEMPLATE).expect("valid");
        assert_eq!(parsed, FolderTemplate::default());
    }
}
