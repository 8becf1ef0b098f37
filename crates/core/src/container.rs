use crate::datetime::{parse_timestamp_text, HostZone, Timestamp};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const ISO_TOP_LEVEL: &[&[u8; 4]] = &[b"ftyp", b"moov", b"mdat", b"wide", b"free", b"skip", b"pnot"];
const QT_TO_UNIX_OFFSET: i64 = 2_082_844_800;
const MAX_TEXT_CHUNK: u32 = 1 << 20;

/// Container a tag was read from. QuickTime/MP4 timestamps are UTC by
/// convention; the rest are read as host-local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFamily {
    QuickTime,
    Png,
    Exif,
}

impl ContainerFamily {
    pub fn is_utc(self) -> bool {
        matches!(self, Self::QuickTime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Instant(DateTime<Utc>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTag {
    pub family: ContainerFamily,
    pub name: String,
    pub value: TagValue,
}

impl ContainerTag {
    pub fn timestamp(&self) -> Option<Timestamp> {
        match &self.value {
            TagValue::Instant(instant) => Some(Timestamp::Absolute(*instant)),
            TagValue::Text(text) => parse_timestamp_text(text),
        }
    }

    /// Calendar day of this tag under its container's zone convention.
    pub fn calendar_date(&self, zone: &HostZone) -> Option<NaiveDate> {
        let timestamp = self.timestamp()?;
        Some(if self.family.is_utc() {
            timestamp.utc_date()
        } else {
            timestamp.date_in(zone)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    IsoBmff,
    Png,
    Other,
}

pub fn sniff_container<R: Read + Seek>(reader: &mut R) -> Result<ContainerKind> {
    reader.seek(SeekFrom::Start(0))?;
    let mut head = [0u8; 12];
    let mut filled = 0usize;
    while filled < head.len() {
        let n = reader.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled >= 8 && head[..8] == PNG_SIGNATURE {
        return Ok(ContainerKind::Png);
    }
    if filled >= 8 && ISO_TOP_LEVEL.iter().any(|kind| head[4..8] == kind[..]) {
        return Ok(ContainerKind::IsoBmff);
    }
    Ok(ContainerKind::Other)
}

/// Timestamp-bearing tags from the file's own container structure.
pub fn read_container_tags(path: &Path) -> Result<Vec<ContainerTag>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open container: {}", path.display()))?;
    let len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    match sniff_container(&mut reader)? {
        ContainerKind::IsoBmff => Ok(iso_bmff_tags(&mut reader, len)),
        ContainerKind::Png => Ok(png_text_tags(&mut reader)),
        ContainerKind::Other => Ok(Vec::new()),
    }
}

/// `moov/meta` key/value items (`com.apple.quicktime.creationdate` and
/// friends). Empty for anything that is not ISO-BMFF.
pub fn read_quicktime_items(path: &Path) -> Result<Vec<(String, String)>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open container: {}", path.display()))?;
    let len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    if sniff_container(&mut reader)? != ContainerKind::IsoBmff {
        return Ok(Vec::new());
    }
    let Some(moov) = find_box(&mut reader, 0, len, *b"moov") else {
        return Ok(Vec::new());
    };
    Ok(find_box(&mut reader, moov.data_start, moov.data_end, *b"meta")
        .and_then(|meta| quicktime_meta_items(&mut reader, meta))
        .unwrap_or_default())
}

#[derive(Debug, Clone, Copy)]
struct BoxRange {
    kind: [u8; 4],
    data_start: u64,
    data_end: u64,
}

fn read_box_header<R: Read + Seek>(reader: &mut R, offset: u64, end: u64) -> Option<BoxRange> {
    if offset + 8 > end {
        return None;
    }
    reader.seek(SeekFrom::Start(offset)).ok()?;
    let mut header = [0u8; 8];
    reader.read_exact(&mut header).ok()?;
    let mut size = u64::from(u32::from_be_bytes([header[0], header[1], header[2], header[3]]));
    let kind = [header[4], header[5], header[6], header[7]];
    let mut header_size = 8u64;

    if size == 1 {
        let mut ext = [0u8; 8];
        reader.read_exact(&mut ext).ok()?;
        size = u64::from_be_bytes(ext);
        header_size = 16;
    } else if size == 0 {
        size = end.saturating_sub(offset);
    }
    if size < header_size {
        return None;
    }
    let box_end = offset.saturating_add(size).min(end);
    if box_end <= offset {
        return None;
    }
    Some(BoxRange {
        kind,
        data_start: offset + header_size,
        data_end: box_end,
    })
}

fn child_boxes<R: Read + Seek>(reader: &mut R, start: u64, end: u64) -> Vec<BoxRange> {
    let mut out = Vec::new();
    let mut offset = start;
    while let Some(range) = read_box_header(reader, offset, end) {
        offset = range.data_end;
        out.push(range);
    }
    out
}

fn find_box<R: Read + Seek>(reader: &mut R, start: u64, end: u64, kind: [u8; 4]) -> Option<BoxRange> {
    child_boxes(reader, start, end)
        .into_iter()
        .find(|range| range.kind == kind)
}

fn iso_bmff_tags<R: Read + Seek>(reader: &mut R, len: u64) -> Vec<ContainerTag> {
    let mut tags = Vec::new();
    let Some(moov) = find_box(reader, 0, len, *b"moov") else {
        return tags;
    };

    for child in child_boxes(reader, moov.data_start, moov.data_end) {
        match &child.kind {
            b"mvhd" => push_header_times(reader, child, "", &mut tags),
            b"trak" => {
                for part in child_boxes(reader, child.data_start, child.data_end) {
                    match &part.kind {
                        b"tkhd" => push_header_times(reader, part, "Track ", &mut tags),
                        b"mdia" => {
                            if let Some(mdhd) =
                                find_box(reader, part.data_start, part.data_end, *b"mdhd")
                            {
                                push_header_times(reader, mdhd, "Media ", &mut tags);
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    tags
}

/// `mvhd`, `tkhd` and `mdhd` share the version/flags + creation/modification
/// prefix. Zero means unset.
fn push_header_times<R: Read + Seek>(
    reader: &mut R,
    range: BoxRange,
    prefix: &str,
    tags: &mut Vec<ContainerTag>,
) {
    let Some((created, modified)) = read_header_times(reader, range) else {
        return;
    };
    for (label, seconds) in [("Creation Time", created), ("Modification Time", modified)] {
        if let Some(instant) = quicktime_seconds_to_utc(seconds) {
            tags.push(ContainerTag {
                family: ContainerFamily::QuickTime,
                name: format!("{prefix}{label}"),
                value: TagValue::Instant(instant),
            });
        }
    }
}

fn read_header_times<R: Read + Seek>(reader: &mut R, range: BoxRange) -> Option<(u64, u64)> {
    reader.seek(SeekFrom::Start(range.data_start)).ok()?;
    let mut ver_flags = [0u8; 4];
    reader.read_exact(&mut ver_flags).ok()?;
    if ver_flags[0] == 1 {
        Some((read_u64_be(reader)?, read_u64_be(reader)?))
    } else {
        Some((
            u64::from(read_u32_be(reader)?),
            u64::from(read_u32_be(reader)?),
        ))
    }
}

fn quicktime_seconds_to_utc(seconds: u64) -> Option<DateTime<Utc>> {
    if seconds == 0 {
        return None;
    }
    let unix = i64::try_from(seconds).ok()?.checked_sub(QT_TO_UNIX_OFFSET)?;
    DateTime::<Utc>::from_timestamp(unix, 0)
}

fn quicktime_meta_items<R: Read + Seek>(
    reader: &mut R,
    meta: BoxRange,
) -> Option<Vec<(String, String)>> {
    // QuickTime writes `meta` as a plain box, ISO as a full box with 4 bytes
    // of version/flags before the children.
    let children_start = match read_box_header(reader, meta.data_start, meta.data_end) {
        Some(first) if first.kind == *b"hdlr" => meta.data_start,
        _ => meta.data_start + 4,
    };
    let children = child_boxes(reader, children_start, meta.data_end);
    let keys_box = children.iter().find(|c| c.kind == *b"keys")?;
    let ilst_box = children.iter().find(|c| c.kind == *b"ilst")?;

    reader.seek(SeekFrom::Start(keys_box.data_start + 4)).ok()?;
    let count = read_u32_be(reader)?;
    let mut keys = Vec::with_capacity(count.min(256) as usize);
    let mut offset = keys_box.data_start + 8;
    for _ in 0..count {
        reader.seek(SeekFrom::Start(offset)).ok()?;
        let size = u64::from(read_u32_be(reader)?);
        if size < 8 || offset + size > keys_box.data_end {
            break;
        }
        let mut namespace = [0u8; 4];
        reader.read_exact(&mut namespace).ok()?;
        let mut name = vec![0u8; (size - 8) as usize];
        reader.read_exact(&mut name).ok()?;
        keys.push(String::from_utf8_lossy(&name).into_owned());
        offset += size;
    }

    let mut items = Vec::new();
    for item in child_boxes(reader, ilst_box.data_start, ilst_box.data_end) {
        let index = u32::from_be_bytes(item.kind) as usize;
        let Some(key) = index.checked_sub(1).and_then(|i| keys.get(i)) else {
            continue;
        };
        let Some(data) = find_box(reader, item.data_start, item.data_end, *b"data") else {
            continue;
        };
        // type indicator (4) + locale (4), then the payload.
        let payload_start = data.data_start + 8;
        if payload_start >= data.data_end || data.data_end - payload_start > u64::from(MAX_TEXT_CHUNK) {
            continue;
        }
        reader.seek(SeekFrom::Start(payload_start)).ok()?;
        let mut payload = vec![0u8; (data.data_end - payload_start) as usize];
        reader.read_exact(&mut payload).ok()?;
        items.push((key.clone(), String::from_utf8_lossy(&payload).into_owned()));
    }
    Some(items)
}

fn png_text_tags<R: Read + Seek>(reader: &mut R) -> Vec<ContainerTag> {
    let mut tags = Vec::new();
    if reader.seek(SeekFrom::Start(PNG_SIGNATURE.len() as u64)).is_err() {
        return tags;
    }

    loop {
        let Some(length) = read_u32_be(reader) else {
            break;
        };
        let mut kind = [0u8; 4];
        if reader.read_exact(&mut kind).is_err() || &kind == b"IEND" {
            break;
        }

        let is_text = &kind == b"tEXt" || &kind == b"iTXt";
        if is_text && length <= MAX_TEXT_CHUNK {
            let mut data = vec![0u8; length as usize];
            if reader.read_exact(&mut data).is_err() {
                break;
            }
            if let Some((keyword, text)) = decode_png_text(&kind, &data) {
                tags.push(ContainerTag {
                    family: ContainerFamily::Png,
                    name: keyword,
                    value: TagValue::Text(text),
                });
            }
            if reader.seek(SeekFrom::Current(4)).is_err() {
                break;
            }
        } else if reader.seek(SeekFrom::Current(i64::from(length) + 4)).is_err() {
            break;
        }
    }
    tags
}

fn decode_png_text(kind: &[u8; 4], data: &[u8]) -> Option<(String, String)> {
    let nul = data.iter().position(|b| *b == 0)?;
    let keyword = latin1(&data[..nul]);
    let rest = &data[nul + 1..];

    if kind == b"tEXt" {
        return Some((keyword, latin1(rest)));
    }

    // iTXt: compression flag, method, language\0, translated keyword\0, text.
    let (&compressed, rest) = rest.split_first()?;
    if compressed != 0 {
        return None;
    }
    let rest = rest.get(1..)?;
    let lang_end = rest.iter().position(|b| *b == 0)?;
    let rest = &rest[lang_end + 1..];
    let translated_end = rest.iter().position(|b| *b == 0)?;
    let text = String::from_utf8_lossy(&rest[translated_end + 1..]).into_owned();
    Some((keyword, text))
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| char::from(*b)).collect()
}

fn read_u32_be<R: Read>(reader: &mut R) -> Option<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).ok()?;
    Some(u32::from_be_bytes(buf))
}

fn read_u64_be<R: Read>(reader: &mut R) -> Option<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).ok()?;
    Some(u64::from_be_bytes(buf))
}
