use crate::convention::{find_convention, NamingConvention};
use regex::{Regex, RegexBuilder};

pub const MATCH_ALL_PATTERN: &str = "*.*";

/// Case-insensitive, whole-name wildcard matcher (`*` and `?`).
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: String,
    regex: Option<Regex>,
}

impl GlobMatcher {
    pub fn compile(pattern: &str) -> Self {
        let mut source = String::with_capacity(pattern.len() + 8);
        source.push('^');
        let mut literal = String::new();
        for ch in pattern.chars() {
            match ch {
                '*' | '?' => {
                    source.push_str(&regex::escape(&std::mem::take(&mut literal)));
                    source.push_str(if ch == '*' { ".*" } else { "." });
                }
                _ => literal.push(ch),
            }
        }
        source.push_str(&regex::escape(&literal));
        source.push('$');

        // Literals are escaped, so only the regex size limit can reject the
        // expression; such patterns degrade to plain case-insensitive equality.
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .ok();

        Self {
            pattern: pattern.to_string(),
            regex,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, name: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(name),
            None => name.to_lowercase() == self.pattern.to_lowercase(),
        }
    }
}

/// Trims the user pattern and substitutes `*.*` when nothing is left.
pub fn normalize_pattern(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        MATCH_ALL_PATTERN
    } else {
        trimmed
    }
}

/// The active filename filter of a run: either a detected naming convention
/// (by its label) or a user glob.
#[derive(Debug, Clone)]
pub enum NameFilter {
    Convention(&'static NamingConvention),
    Glob(GlobMatcher),
}

impl NameFilter {
    pub fn parse(raw: &str) -> Self {
        let pattern = normalize_pattern(raw);
        match find_convention(pattern) {
            Some(convention) => Self::Convention(convention),
            None => Self::Glob(GlobMatcher::compile(pattern)),
        }
    }

    pub fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Convention(convention) => convention.is_match(name),
            Self::Glob(glob) => glob.is_match(name),
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            Self::Convention(convention) => convention.label,
            Self::Glob(glob) => glob.pattern(),
        }
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::Glob(GlobMatcher::compile(MATCH_ALL_PATTERN))
    }
}
