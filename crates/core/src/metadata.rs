use crate::container::read_container_tags;
use crate::container::read_quicktime_items;
use crate::datetime::{parse_timestamp_text, HostZone};
use crate::exif_reader::{exif_tags, read_exif, read_exif_date};
use crate::xmp_reader::{property, read_embedded_xmp, read_sidecar_xmp, XmpProperties};
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "heif", "tif", "tiff", "webp", "dng", "raw", "cr2", "cr3",
    "nef", "arw", "raf", "orf", "rw2",
];

/// XMP and QuickTime item keys holding a capture date, most specific first.
pub const XMP_DATE_KEYS: &[&str] = &[
    "exif:DateTimeOriginal",
    "xmp:CreateDate",
    "photoshop:DateCreated",
    "com.apple.quicktime.creationdate",
];

const CREATION_TAG_HINTS: &[&str] = &[
    "creation time",
    "create date",
    "created",
    "media creation",
    "media create",
];

/// Which reader produced a metadata date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MetadataStage {
    Exif,
    Xmp,
    ContainerTag,
}

pub fn is_photo_like(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            PHOTO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Reads a calendar date from embedded metadata only. The file name is never
/// consulted beyond its extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataDateReader {
    zone: HostZone,
}

impl MetadataDateReader {
    pub fn new(zone: HostZone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> &HostZone {
        &self.zone
    }

    pub fn read_date(&self, path: &Path) -> Option<NaiveDate> {
        self.read_date_with_stage(path).map(|(date, _)| date)
    }

    /// Runs EXIF (photo-like files only), XMP, then container tags. The
    /// first stage yielding a legal date wins.
    pub fn read_date_with_stage(&self, path: &Path) -> Option<(NaiveDate, MetadataStage)> {
        let exif = if is_photo_like(path) {
            swallow(path, MetadataStage::Exif, read_exif_date(path, &self.zone))
        } else {
            None
        };

        exif.map(|date| (date, MetadataStage::Exif))
            .or_else(|| self.xmp_date(path).map(|date| (date, MetadataStage::Xmp)))
            .or_else(|| {
                self.container_date(path)
                    .map(|date| (date, MetadataStage::ContainerTag))
            })
    }

    fn xmp_date(&self, path: &Path) -> Option<NaiveDate> {
        let mut props = XmpProperties::new();
        if let Some(embedded) = swallow(path, MetadataStage::Xmp, read_embedded_xmp(path)) {
            props.extend(embedded);
        }
        if let Some(sidecar) = swallow(path, MetadataStage::Xmp, read_sidecar_xmp(path)) {
            props.extend(sidecar);
        }
        if let Some(items) = swallow(path, MetadataStage::Xmp, read_quicktime_items(path).map(Some)) {
            props.extend(
                items
                    .into_iter()
                    .map(|(key, value)| (key.to_ascii_lowercase(), value)),
            );
        }
        if props.is_empty() {
            return None;
        }

        XMP_DATE_KEYS.iter().find_map(|key| {
            let raw = property(&props, key)?;
            let timestamp = parse_timestamp_text(raw)?;
            Some(timestamp.date_in(&self.zone))
        })
    }

    fn container_date(&self, path: &Path) -> Option<NaiveDate> {
        let mut tags =
            swallow(path, MetadataStage::ContainerTag, read_container_tags(path).map(Some))
                .unwrap_or_default();
        if let Ok(exif) = read_exif(path) {
            tags.extend(exif_tags(&exif));
        }

        tags.iter()
            .filter(|tag| is_creation_tag(&tag.name))
            .find_map(|tag| tag.calendar_date(&self.zone))
    }
}

pub fn is_creation_tag(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    CREATION_TAG_HINTS.iter().any(|hint| name.contains(hint))
}

fn swallow<T>(path: &Path, stage: MetadataStage, result: Result<Option<T>>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(err) => {
            debug!(path = %path.display(), ?stage, "metadata reader failed: {err:#}");
            None
        }
    }
}
