use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::time::SystemTime;

pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Zone used whenever an absolute instant has to become a calendar date.
/// Passed in explicitly so runs and tests can pin it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl HostZone {
    pub fn fixed_hours(hours: i32) -> Option<Self> {
        hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .map(Self::Fixed)
    }

    /// `+05:30`, `-0800`, `+09` or `Z` as accepted by [`parse_utc_offset`],
    /// or whole hours such as `9` and `-5`.
    pub fn parse(raw: &str) -> Option<Self> {
        parse_utc_offset(raw)
            .map(Self::Fixed)
            .or_else(|| raw.trim().parse::<i32>().ok().and_then(Self::fixed_hours))
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Local => instant.with_timezone(&Local).date_naive(),
            Self::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    pub fn date_of_system_time(&self, time: SystemTime) -> NaiveDate {
        self.date_of(DateTime::<Utc>::from(time))
    }
}

/// A timestamp read from metadata, either pinned to an instant or a bare
/// wall-clock reading with no zone information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Absolute(DateTime<Utc>),
    Naive(NaiveDateTime),
}

impl Timestamp {
    /// Absolute instants land on the host-zone day; naive readings keep
    /// their own day.
    pub fn date_in(&self, zone: &HostZone) -> NaiveDate {
        match self {
            Self::Absolute(instant) => zone.date_of(*instant),
            Self::Naive(naive) => naive.date(),
        }
    }

    /// Day of the reading taken as UTC.
    pub fn utc_date(&self) -> NaiveDate {
        match self {
            Self::Absolute(instant) => instant.date_naive(),
            Self::Naive(naive) => naive.date(),
        }
    }
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y:%m:%dT%H:%M:%S%.f%:z",
    "%Y:%m:%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y:%m:%dT%H:%M:%S%.f",
    "%Y/%m/%dT%H:%M:%S",
];

/// Permissive reading of XMP and container date strings, in order: UTC or
/// RFC 3339 instant, other offset layouts, naive date-time, bare date.
pub fn parse_timestamp_text(raw: &str) -> Option<Timestamp> {
    let trimmed = raw.trim().trim_end_matches('\0').trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(Timestamp::Absolute(dt.with_timezone(&Utc)));
    }

    let normalized = trimmed.replace(' ', "T");
    let normalized = match normalized.strip_suffix("TUTC") {
        Some(head) => format!("{head}Z"),
        None => normalized,
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(Timestamp::Absolute(dt.with_timezone(&Utc)));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(Timestamp::Absolute(dt.with_timezone(&Utc)));
        }
    }

    if let Some(without_z) = normalized.strip_suffix('Z') {
        if let Some(naive) = parse_naive(without_z) {
            return Some(Timestamp::Absolute(Utc.from_utc_datetime(&naive)));
        }
    }

    if let Some(naive) = parse_naive(&normalized) {
        return Some(Timestamp::Naive(naive));
    }

    for fmt in ["%Y-%m-%d", "%Y:%m:%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(&normalized, fmt) {
            return date.and_hms_opt(0, 0, 0).map(Timestamp::Naive);
        }
    }

    None
}

fn parse_naive(input: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
}

/// EXIF `YYYY:MM:DD HH:MM:SS`. Blank-filled or zeroed values are rejected.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim().trim_end_matches('\0').trim();
    NaiveDateTime::parse_from_str(trimmed, EXIF_DATETIME_FORMAT).ok()
}

/// Signed `HH:MM` offset as written to EXIF `OffsetTime*` tags. `Z`, `HHMM`
/// and `HH` forms are tolerated.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim().trim_end_matches('\0').trim();
    if trimmed.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match trimmed.as_bytes().first()? {
        b'+' => (1, &trimmed[1..]),
        b'-' => (-1, &trimmed[1..]),
        _ => return None,
    };
    if !rest.is_ascii() {
        return None;
    }
    let (hours, minutes) = match rest.len() {
        5 if rest.as_bytes()[2] == b':' => (&rest[0..2], &rest[3..5]),
        4 => (&rest[0..2], &rest[2..4]),
        2 => (rest, "00"),
        _ => return None,
    };
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours = hours.parse::<i32>().ok()?;
    let minutes = minutes.parse::<i32>().ok()?;
    if hours > 18 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Day of an EXIF local reading. A parsable offset moves the reading to its
/// instant and then to the host zone; otherwise the local day is kept.
pub fn exif_local_date(local: NaiveDateTime, offset: Option<&str>, zone: &HostZone) -> NaiveDate {
    let Some(offset) = offset.and_then(parse_utc_offset) else {
        return local.date();
    };
    match offset.from_local_datetime(&local).single() {
        Some(dt) => zone.date_of(dt.with_timezone(&Utc)),
        None => local.date(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn zone(hours: i32) -> HostZone {
        HostZone::fixed_hours(hours).expect("valid offset")
    }

    #[test]
    fn naive_exif_reading_keeps_its_day() {
        let local = parse_exif_datetime("2024:03:15 10:00:00").expect("parse");
        assert_eq!(exif_local_date(local, None, &zone(-11)), ymd(2024, 3, 15));
        assert_eq!(exif_local_date(local, None, &zone(14)), ymd(2024, 3, 15));
    }

    #[test]
    fn exif_offset_moves_reading_into_host_zone() {
        let local = parse_exif_datetime("2024:03:15 23:30:00").expect("parse");
        assert_eq!(
            exif_local_date(local, Some("+03:00"), &zone(9)),
            ymd(2024, 3, 16)
        );
        assert_eq!(
            exif_local_date(local, Some("+03:00"), &zone(3)),
            ymd(2024, 3, 15)
        );
    }

    #[test]
    fn unparsable_offset_is_ignored() {
        let local = parse_exif_datetime("2024:03:15 23:30:00").expect("parse");
        assert_eq!(
            exif_local_date(local, Some("   :  "), &zone(9)),
            ymd(2024, 3, 15)
        );
        assert_eq!(exif_local_date(local, Some("+25:00"), &zone(9)), ymd(2024, 3, 15));
    }

    #[test]
    fn offset_forms() {
        assert_eq!(parse_utc_offset("+05:30").map(|o| o.local_minus_utc()), Some(19800));
        assert_eq!(parse_utc_offset("-0800").map(|o| o.local_minus_utc()), Some(-28800));
        assert_eq!(parse_utc_offset("+09").map(|o| o.local_minus_utc()), Some(32400));
        assert_eq!(parse_utc_offset("Z").map(|o| o.local_minus_utc()), Some(0));
        assert!(parse_utc_offset("05:00").is_none());
        assert!(parse_utc_offset("+5:00").is_none());
        assert!(parse_utc_offset("").is_none());
    }

    #[test]
    fn host_zone_accepts_minutes_and_whole_hours() {
        let offset = |zone: Option<HostZone>| match zone {
            Some(HostZone::Fixed(offset)) => Some(offset.local_minus_utc()),
            _ => None,
        };
        assert_eq!(offset(HostZone::parse("+05:30")), Some(19800));
        assert_eq!(offset(HostZone::parse("+0930")), Some(34200));
        assert_eq!(offset(HostZone::parse("-03:30")), Some(-12600));
        assert_eq!(offset(HostZone::parse("9")), Some(32400));
        assert_eq!(offset(HostZone::parse("-5")), Some(-18000));
        assert_eq!(offset(HostZone::parse("Z")), Some(0));
        assert_eq!(HostZone::parse("+25:00"), None);
        assert_eq!(HostZone::parse("2147483647"), None);
        assert_eq!(HostZone::parse("half past"), None);

        // Instants land on the pinned half-hour zone's day.
        let instant = Utc
            .with_ymd_and_hms(2024, 3, 15, 18, 45, 0)
            .single()
            .expect("instant");
        let india = HostZone::parse("+05:30").expect("zone");
        assert_eq!(india.date_of(instant), ymd(2024, 3, 16));
        assert_eq!(zone(5).date_of(instant), ymd(2024, 3, 15));
    }

    #[test]
    fn exif_datetime_rejects_blank_fill() {
        assert!(parse_exif_datetime("    :  :     :  :  ").is_none());
        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_none());
        assert!(parse_exif_datetime("2024:03:15 10:00:00\0").is_some());
    }

    #[test]
    fn timestamp_text_strategies_in_order() {
        let utc = parse_timestamp_text("2025-01-04T22:15:48Z").expect("utc");
        assert!(matches!(utc, Timestamp::Absolute(_)));
        assert_eq!(utc.date_in(&zone(3)), ymd(2025, 1, 5));

        let offset = parse_timestamp_text("2025-01-04T13:15:48.355+03:00").expect("offset");
        assert_eq!(offset.date_in(&zone(-12)), ymd(2025, 1, 3));

        let compact = parse_timestamp_text("2024-06-01T19:30:00-0400").expect("compact offset");
        assert_eq!(compact.utc_date(), ymd(2024, 6, 1));
        assert_eq!(compact.date_in(&zone(9)), ymd(2024, 6, 2));

        let naive = parse_timestamp_text("2025-01-04 23:59:59").expect("naive");
        assert!(matches!(naive, Timestamp::Naive(_)));
        assert_eq!(naive.date_in(&zone(12)), ymd(2025, 1, 4));

        let bare = parse_timestamp_text("2024-03-15").expect("bare date");
        assert_eq!(bare.date_in(&zone(-5)), ymd(2024, 3, 15));

        let rfc2822 = parse_timestamp_text("Fri, 15 Mar 2024 23:00:00 +0000").expect("rfc2822");
        assert_eq!(rfc2822.date_in(&zone(2)), ymd(2024, 3, 16));

        assert!(parse_timestamp_text("").is_none());
        assert!(parse_timestamp_text("yesterday").is_none());
    }

    #[test]
    fn utc_suffix_word_is_an_instant() {
        let ts = parse_timestamp_text("2024-06-01 23:30:00 UTC").expect("utc word");
        assert!(matches!(ts, Timestamp::Absolute(_)));
        assert_eq!(ts.utc_date(), ymd(2024, 6, 1));
    }
}
