use crate::container::{ContainerFamily, ContainerTag, TagValue};
use crate::datetime::{exif_local_date, parse_exif_datetime, HostZone};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// EXIF 2.31 offset tags, addressed by number so older tag tables work too.
const OFFSET_TIME: Tag = Tag(exif::Context::Exif, 0x9010);
const OFFSET_TIME_ORIGINAL: Tag = Tag(exif::Context::Exif, 0x9011);
const OFFSET_TIME_DIGITIZED: Tag = Tag(exif::Context::Exif, 0x9012);

const DATE_TAGS: &[Tag] = &[Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];
const OFFSET_TAGS: &[Tag] = &[OFFSET_TIME_ORIGINAL, OFFSET_TIME_DIGITIZED, OFFSET_TIME];

pub fn read_exif(path: &Path) -> Result<Exif> {
    let file = File::open(path)
        .with_context(|| format!("failed to open for EXIF: {}", path.display()))?;
    let mut buf = BufReader::new(file);
    Reader::new()
        .read_from_container(&mut buf)
        .with_context(|| format!("failed to parse EXIF: {}", path.display()))
}

/// Capture date from `DateTimeOriginal`, `DateTimeDigitized`, then IFD0
/// `DateTime`, corrected by the first `OffsetTime*` tag present.
pub fn read_exif_date(path: &Path, zone: &HostZone) -> Result<Option<NaiveDate>> {
    let exif = read_exif(path)?;
    Ok(exif_capture_date(&exif, zone))
}

pub fn exif_capture_date(exif: &Exif, zone: &HostZone) -> Option<NaiveDate> {
    let offset = OFFSET_TAGS
        .iter()
        .find_map(|tag| ascii_value(exif, *tag).filter(|v| !v.trim().is_empty()));

    DATE_TAGS.iter().find_map(|tag| {
        let raw = ascii_value(exif, *tag)?;
        let local = parse_exif_datetime(&raw)?;
        Some(exif_local_date(local, offset.as_deref(), zone))
    })
}

/// Every ASCII EXIF field, named the way kamadak-exif prints tags.
pub fn exif_tags(exif: &Exif) -> Vec<ContainerTag> {
    exif.fields()
        .filter_map(|field| {
            let text = first_ascii(&field.value)?;
            Some(ContainerTag {
                family: ContainerFamily::Exif,
                name: field.tag.to_string(),
                value: TagValue::Text(text),
            })
        })
        .collect()
}

fn ascii_value(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    first_ascii(&field.value)
}

// display_value() quotes ASCII values, so read the raw bytes instead.
fn first_ascii(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    /// Little-endian TIFF with IFD0 `DateTime`, an Exif IFD holding
    /// `DateTimeOriginal` and an optional `OffsetTimeOriginal`.
    pub(crate) fn tiff_with_dates(
        ifd0_datetime: Option<&str>,
        original: Option<&str>,
        offset_original: Option<&str>,
    ) -> Vec<u8> {
        let mut ifd0: Vec<(u16, u16, Vec<u8>)> = Vec::new();
        if let Some(dt) = ifd0_datetime {
            ifd0.push((0x0132, 2, ascii(dt)));
        }
        let mut sub: Vec<(u16, u16, Vec<u8>)> = Vec::new();
        if let Some(dt) = original {
            sub.push((0x9003, 2, ascii(dt)));
        }
        if let Some(off) = offset_original {
            sub.push((0x9011, 2, ascii(off)));
        }

        let ifd0_len = 2 + 12 * (ifd0.len() + 1) + 4;
        let sub_offset = 8 + ifd0_len;
        let sub_len = 2 + 12 * sub.len() + 4;
        let mut data_offset = sub_offset + sub_len;

        let mut out = vec![b'I', b'I', 42, 0, 8, 0, 0, 0];
        let mut data = Vec::new();

        let mut write_ifd = |out: &mut Vec<u8>, entries: &[(u16, u16, Vec<u8>)], extra: Option<u32>| {
            let count = entries.len() + usize::from(extra.is_some());
            out.extend_from_slice(&(count as u16).to_le_bytes());
            for (tag, typ, bytes) in entries {
                out.extend_from_slice(&tag.to_le_bytes());
                out.extend_from_slice(&typ.to_le_bytes());
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                if bytes.len() <= 4 {
                    let mut inline = bytes.clone();
                    inline.resize(4, 0);
                    out.extend_from_slice(&inline);
                } else {
                    out.extend_from_slice(&(data_offset as u32).to_le_bytes());
                    data.extend_from_slice(bytes);
                    data_offset += bytes.len();
                }
            }
            if let Some(pointer) = extra {
                out.extend_from_slice(&0x8769u16.to_le_bytes());
                out.extend_from_slice(&4u16.to_le_bytes());
                out.extend_from_slice(&1u32.to_le_bytes());
                out.extend_from_slice(&pointer.to_le_bytes());
            }
            out.extend_from_slice(&0u32.to_le_bytes());
        };

        write_ifd(&mut out, &ifd0, Some(sub_offset as u32));
        write_ifd(&mut out, &sub, None);
        out.extend_from_slice(&data);
        out
    }

    fn ascii(value: &str) -> Vec<u8> {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        bytes
    }

    fn zone(hours: i32) -> HostZone {
        HostZone::fixed_hours(hours).expect("valid offset")
    }

    #[test]
    fn naive_original_date_has_no_zone_math() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("photo.tif");
        fs::write(&path, tiff_with_dates(None, Some("2024:03:15 10:00:00"), None)).expect("write");

        let date = read_exif_date(&path, &zone(-12)).expect("read");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn offset_tag_shifts_into_host_zone() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("photo.tif");
        fs::write(
            &path,
            tiff_with_dates(None, Some("2024:03:15 23:30:00"), Some("+03:00")),
        )
        .expect("write");

        assert_eq!(
            read_exif_date(&path, &zone(9)).expect("read"),
            NaiveDate::from_ymd_opt(2024, 3, 16)
        );
        assert_eq!(
            read_exif_date(&path, &zone(0)).expect("read"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }

    #[test]
    fn ifd0_datetime_is_the_last_resort() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("photo.tif");
        fs::write(&path, tiff_with_dates(Some("2021:12:31 08:00:00"), None, None)).expect("write");

        assert_eq!(
            read_exif_date(&path, &zone(0)).expect("read"),
            NaiveDate::from_ymd_opt(2021, 12, 31)
        );
    }

    #[test]
    fn original_wins_over_ifd0() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("photo.tif");
        fs::write(
            &path,
            tiff_with_dates(Some("2021:12:31 08:00:00"), Some("2020:06:01 12:00:00"), None),
        )
        .expect("write");

        assert_eq!(
            read_exif_date(&path, &zone(0)).expect("read"),
            NaiveDate::from_ymd_opt(2020, 6, 1)
        );
    }

    #[test]
    fn non_exif_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("notes.jpg");
        fs::write(&path, b"not an image").expect("write");
        assert!(read_exif_date(&path, &zone(0)).is_err());
    }
}
