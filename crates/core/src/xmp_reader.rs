use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const PACKET_START: &[u8] = b"<x:xmpmeta";
const PACKET_END: &[u8] = b"</x:xmpmeta>";
const FULL_SCAN_LIMIT: u64 = 64 * 1024 * 1024;
const EDGE_SCAN_LEN: u64 = 16 * 1024 * 1024;
const CHUNK_LEN: usize = 256 * 1024;
const MAX_PACKET_LEN: usize = 4 * 1024 * 1024;

/// Prefixed property names (`exif:DateTimeOriginal`) with their values, in
/// document order. Keys are lowercased.
pub type XmpProperties = Vec<(String, String)>;

/// XMP packet embedded anywhere in the file. Large files are only searched
/// near the start and the end, where writers place metadata.
pub fn read_embedded_xmp(path: &Path) -> Result<Option<XmpProperties>> {
    let packet = read_packet(path)?;
    Ok(packet.map(|bytes| collect_properties(&String::from_utf8_lossy(&bytes))))
}

/// Sidecar next to the media file: `IMG_1.xmp`, then `IMG_1.jpg.xmp`, in
/// either extension case.
pub fn find_sidecar(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    let stem = path.file_stem()?.to_string_lossy().to_string();
    let name = path.file_name()?.to_string_lossy().to_string();

    [stem, name].iter().find_map(|base| {
        ["xmp", "XMP"]
            .iter()
            .map(|ext| parent.join(format!("{}.{}", base, ext)))
            .find(|candidate| candidate.is_file() && candidate != path)
    })
}

pub fn read_sidecar_xmp(path: &Path) -> Result<Option<XmpProperties>> {
    let Some(sidecar) = find_sidecar(path) else {
        return Ok(None);
    };
    let xml = std::fs::read_to_string(&sidecar)
        .with_context(|| format!("failed to read XMP sidecar: {}", sidecar.display()))?;
    Ok(Some(collect_properties(&xml)))
}

fn read_packet(path: &Path) -> Result<Option<Vec<u8>>> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open for XMP: {}", path.display()))?;
    let len = file.metadata()?.len();
    if len <= FULL_SCAN_LIMIT {
        return Ok(find_packet(&mut file)?);
    }

    if let Some(packet) = find_packet((&mut file).take(EDGE_SCAN_LEN))? {
        return Ok(Some(packet));
    }
    file.seek(SeekFrom::Start(len - EDGE_SCAN_LEN))?;
    Ok(find_packet(file.take(EDGE_SCAN_LEN))?)
}

/// Streams `reader` in fixed chunks. Only a marker-sized carry is kept
/// until the packet starts, and a packet longer than `MAX_PACKET_LEN` is
/// abandoned.
fn find_packet<R: Read>(mut reader: R) -> io::Result<Option<Vec<u8>>> {
    let mut chunk = vec![0u8; CHUNK_LEN];
    let mut window = Vec::new();
    let mut started = false;

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => return Ok(None),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        let end_from = window.len().saturating_sub(PACKET_END.len() - 1);
        window.extend_from_slice(&chunk[..read]);

        let end_from = if started {
            end_from
        } else {
            match find_subslice(&window, PACKET_START, 0) {
                Some(start) => {
                    window.drain(..start);
                    started = true;
                    0
                }
                None => {
                    let stale = window.len().saturating_sub(PACKET_START.len() - 1);
                    window.drain(..stale);
                    continue;
                }
            }
        };

        if let Some(end) = find_subslice(&window, PACKET_END, end_from) {
            window.truncate(end + PACKET_END.len());
            return Ok(Some(window));
        }
        if window.len() > MAX_PACKET_LEN {
            return Ok(None);
        }
    }
}

pub fn extract_xmp_packet(bytes: &[u8]) -> Option<String> {
    find_packet(bytes)
        .ok()
        .flatten()
        .map(|packet| String::from_utf8_lossy(&packet).into_owned())
}

fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Looks up the first of `keys` (case-insensitive) present in `props`.
pub fn property<'a>(props: &'a XmpProperties, key: &str) -> Option<&'a str> {
    let key = key.to_ascii_lowercase();
    props
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value.as_str())
}

/// Collects both `<ns:Prop>value</ns:Prop>` elements and
/// `ns:Prop="value"` attributes.
pub fn collect_properties(xml: &str) -> XmpProperties {
    let mut values = XmpProperties::new();
    let mut cursor = 0usize;

    while let Some(start) = xml[cursor..].find('<') {
        let start = cursor + start;
        let Some(raw_end) = xml[start..].find('>') else {
            break;
        };
        let end = raw_end + start;
        let raw_tag = &xml[start + 1..end];

        if raw_tag.starts_with('/') || raw_tag.starts_with('?') || raw_tag.starts_with('!') {
            cursor = end + 1;
            continue;
        }

        collect_attribute_values(raw_tag, &mut values);

        let tag_name = raw_tag
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        if !tag_name.contains(':') || raw_tag.ends_with('/') {
            cursor = end + 1;
            continue;
        }

        let close_tag = format!("</{}>", tag_name);
        if let Some(close_pos) = xml[end + 1..].find(&close_tag) {
            let close_pos = end + 1 + close_pos;
            let content = xml[end + 1..close_pos].trim();
            if !content.is_empty() && !content.contains('<') {
                values.push((tag_name.to_ascii_lowercase(), html_unescape_basic(content)));
            }
        }

        cursor = end + 1;
    }

    values
}

fn collect_attribute_values(raw_tag: &str, values: &mut XmpProperties) {
    let bytes = raw_tag.as_bytes();
    let mut cursor = 0usize;

    while cursor < bytes.len() && !bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }

    while cursor < bytes.len() {
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() || bytes[cursor] == b'/' {
            break;
        }

        let name_start = cursor;
        while cursor < bytes.len()
            && !bytes[cursor].is_ascii_whitespace()
            && bytes[cursor] != b'='
            && bytes[cursor] != b'/'
        {
            cursor += 1;
        }
        if name_start == cursor {
            cursor += 1;
            continue;
        }
        let raw_name = &raw_tag[name_start..cursor];

        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() || bytes[cursor] != b'=' {
            continue;
        }
        cursor += 1;

        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            break;
        }

        let (value_start, value_end) = if bytes[cursor] == b'"' || bytes[cursor] == b'\'' {
            let quote = bytes[cursor];
            cursor += 1;
            let value_start = cursor;
            while cursor < bytes.len() && bytes[cursor] != quote {
                cursor += 1;
            }
            if cursor >= bytes.len() {
                break;
            }
            let value_end = cursor;
            cursor += 1;
            (value_start, value_end)
        } else {
            let value_start = cursor;
            while cursor < bytes.len() && !bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            (value_start, cursor)
        };

        // Namespace declarations are not properties.
        if raw_name.starts_with("xmlns") {
            continue;
        }
        let value = raw_tag[value_start..value_end].trim();
        if value.is_empty() {
            continue;
        }
        values.push((raw_name.to_ascii_lowercase(), html_unescape_basic(value)));
    }
}

fn html_unescape_basic(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn attributes_and_elements_keep_their_prefix() {
        let xml = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF><rdf:Description xmlns:xmp="http://ns.adobe.com/xap/1.0/" xmp:CreateDate="2025-01-04T13:15:48.355+03:00"><photoshop:DateCreated>2025-01-03</photoshop:DateCreated></rdf:Description></rdf:RDF></x:xmpmeta>"#;
        let props = collect_properties(xml);
        assert_eq!(
            property(&props, "xmp:CreateDate"),
            Some("2025-01-04T13:15:48.355+03:00")
        );
        assert_eq!(property(&props, "photoshop:DateCreated"), Some("2025-01-03"));
        assert_eq!(property(&props, "xmlns:xmp"), None);
        assert_eq!(property(&props, "exif:DateTimeOriginal"), None);
    }

    #[test]
    fn container_elements_are_not_values() {
        let xml = r#"<x:xmpmeta><rdf:RDF><rdf:Description><exif:DateTimeOriginal>2024-03-15T10:00:00</exif:DateTimeOriginal></rdf:Description></rdf:RDF></x:xmpmeta>"#;
        let props = collect_properties(xml);
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].0, "exif:datetimeoriginal");
    }

    #[test]
    fn packet_is_found_inside_binary_data() {
        let mut bytes = vec![0xFFu8, 0xD8, 0x00, 0x10];
        bytes.extend_from_slice(b"<?xpacket begin=''?><x:xmpmeta><rdf:Description xmp:CreateDate='2020-02-02'/></x:xmpmeta><?xpacket end='w'?>");
        bytes.extend_from_slice(&[0u8; 32]);

        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("IMG_1.jpg");
        fs::write(&path, &bytes).expect("write");

        let props = read_embedded_xmp(&path).expect("read").expect("packet");
        assert_eq!(property(&props, "xmp:createdate"), Some("2020-02-02"));
    }

    #[test]
    fn packet_split_across_read_chunks_is_found() {
        let mut bytes = vec![0u8; CHUNK_LEN - 4];
        bytes.extend_from_slice(b"<x:xmpmeta><rdf:Description xmp:CreateDate='2021-05-06'/>");
        bytes.extend_from_slice(&vec![b' '; CHUNK_LEN]);
        bytes.extend_from_slice(b"</x:xmpmeta>");
        bytes.extend_from_slice(&[0u8; 64]);

        let xml = extract_xmp_packet(&bytes).expect("packet");
        assert!(xml.starts_with("<x:xmpmeta>"));
        assert!(xml.ends_with("</x:xmpmeta>"));
        let props = collect_properties(&xml);
        assert_eq!(property(&props, "xmp:CreateDate"), Some("2021-05-06"));
    }

    #[test]
    fn end_marker_split_across_chunks_is_found() {
        let mut bytes = b"<x:xmpmeta>".to_vec();
        bytes.resize(CHUNK_LEN - 5, b' ');
        bytes.extend_from_slice(b"</x:xmpmeta>");
        let xml = extract_xmp_packet(&bytes).expect("packet");
        assert_eq!(xml.len(), CHUNK_LEN - 5 + PACKET_END.len());
    }

    #[test]
    fn oversized_packet_is_abandoned() {
        let mut bytes = b"<x:xmpmeta>".to_vec();
        bytes.resize(MAX_PACKET_LEN + CHUNK_LEN, b' ');
        bytes.extend_from_slice(b"</x:xmpmeta>");
        assert!(extract_xmp_packet(&bytes).is_none());
    }

    #[test]
    fn missing_packet_is_none() {
        assert!(extract_xmp_packet(b"no metadata here").is_none());
        assert!(extract_xmp_packet(b"<x:xmpmeta unterminated").is_none());
    }

    #[test]
    fn sidecar_lookup_prefers_stem_name() {
        let temp = tempdir().expect("tempdir");
        let media = temp.path().join("DSC0001.ARW");
        fs::write(&media, b"raw").expect("write");
        assert!(find_sidecar(&media).is_none());

        let by_name = temp.path().join("DSC0001.ARW.xmp");
        fs::write(&by_name, "<x:xmpmeta/>").expect("write");
        assert_eq!(find_sidecar(&media).as_deref(), Some(by_name.as_path()));

        let by_stem = temp.path().join("DSC0001.xmp");
        fs::write(&by_stem, r#"<x:xmpmeta><rdf:Description exif:DateTimeOriginal="2019-07-01T08:00:00"/></x:xmpmeta>"#)
            .expect("write");
        assert_eq!(find_sidecar(&media).as_deref(), Some(by_stem.as_path()));

        let props = read_sidecar_xmp(&media).expect("read").expect("sidecar");
        assert_eq!(
            property(&props, "exif:DateTimeOriginal"),
            Some("2019-07-01T08:00:00")
        );
    }
}
