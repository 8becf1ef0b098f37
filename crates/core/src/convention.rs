use regex::Regex;
use std::sync::LazyLock;

/// A device/camera filename shape. The first capture group of `regex` is the
/// eight-digit `YYYYMMDD` run.
#[derive(Debug)]
pub struct NamingConvention {
    pub label: &'static str,
    pub glob: &'static str,
    regex: &'static LazyLock<Regex>,
}

impl NamingConvention {
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn date_digits<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.regex
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

static RE_IMG: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)^IMG_([0-9]{8})"));
static RE_VID: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)^VID_([0-9]{8})"));
static RE_PXL: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)^PXL_([0-9]{8})"));
static RE_IMG_BARE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)^IMG([0-9]{8})"));
static RE_WP: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)^WP_([0-9]{8})"));
static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| compile(r"^([0-9]{8})"));

pub(crate) fn compile(source: &str) -> Regex {
    Regex::new(source).expect("failed to compile convention regex")
}

/// Evaluated top to bottom. Prefixed conventions stay ahead of the bare
/// digit shape, which matches any name that merely starts with eight digits.
pub static CONVENTIONS: &[NamingConvention] = &[
    NamingConvention {
        label: "IMG_YYYYMMDD",
        glob: "IMG_????????*",
        regex: &RE_IMG,
    },
    NamingConvention {
        label: "VID_YYYYMMDD",
        glob: "VID_????????*",
        regex: &RE_VID,
    },
    NamingConvention {
        label: "PXL_YYYYMMDD",
        glob: "PXL_????????*",
        regex: &RE_PXL,
    },
    NamingConvention {
        label: "IMGYYYYMMDD",
        glob: "IMG????????*",
        regex: &RE_IMG_BARE,
    },
    NamingConvention {
        label: "WP_YYYYMMDD",
        glob: "WP_????????*",
        regex: &RE_WP,
    },
    NamingConvention {
        label: "YYYYMMDD",
        glob: "????????*",
        regex: &RE_DIGITS,
    },
];

pub fn find_convention(label: &str) -> Option<&'static NamingConvention> {
    CONVENTIONS
        .iter()
        .find(|convention| convention.label.eq_ignore_ascii_case(label.trim()))
}

/// First convention, in catalog order, that at least one name satisfies.
pub fn detect_convention<S: AsRef<str>>(names: &[S]) -> Option<(&'static NamingConvention, usize)> {
    CONVENTIONS.iter().find_map(|convention| {
        let count = names
            .iter()
            .filter(|name| convention.is_match(name.as_ref()))
            .count();
        (count > 0).then_some((convention, count))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_conventions_win_over_bare_digits() {
        let names = ["20240101_120000.jpg", "PXL_20240101_1.jpg"];
        let (convention, count) = detect_convention(&names).expect("detected");
        assert_eq!(convention.label, "PXL_YYYYMMDD");
        assert_eq!(count, 1);
    }

    #[test]
    fn img_with_and_without_underscore_are_distinct() {
        let img = find_convention("IMG_YYYYMMDD").expect("known");
        let bare = find_convention("IMGYYYYMMDD").expect("known");
        assert!(img.is_match("img_20240101.mov"));
        assert!(!bare.is_match("IMG_20240101.jpg"));
        assert!(bare.is_match("IMG20240101123456.jpg"));
        assert_eq!(bare.date_digits("IMG20240101123456.jpg"), Some("20240101"));
    }

    #[test]
    fn extension_is_irrelevant() {
        let wp = find_convention("wp_yyyymmdd").expect("known");
        assert!(wp.is_match("WP_20140505_001"));
        assert!(wp.is_match("WP_20140505_001.mp4"));
        assert!(!wp.is_match("WP_2014050"));
    }

    #[test]
    fn no_convention_for_unrelated_names() {
        assert!(detect_convention(&["holiday.jpg", "notes.txt"]).is_none());
        let empty: [&str; 0] = [];
        assert!(detect_convention(&empty).is_none());
    }
}
