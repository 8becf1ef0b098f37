use crate::config::SortConfig;
use crate::datetime::HostZone;
use crate::error::{FileError, FileErrorReason};
use crate::filename_date::parse_filename_date;
use crate::metadata::MetadataDateReader;
use crate::scanner::file_name_of;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a file's calendar date comes from. Exactly one is used per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DateSource {
    #[default]
    Metadata,
    CreationTime,
    Filename,
}

/// What to do when the filesystem cannot report a creation time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CreationTimeFallback {
    #[default]
    Error,
    Modified,
}

#[derive(Debug, Clone, Copy)]
pub struct DateResolver {
    source: DateSource,
    fallback: CreationTimeFallback,
    metadata: MetadataDateReader,
}

impl DateResolver {
    pub fn new(source: DateSource, fallback: CreationTimeFallback, zone: HostZone) -> Self {
        Self {
            source,
            fallback,
            metadata: MetadataDateReader::new(zone),
        }
    }

    pub fn resolve(&self, path: &Path) -> Result<NaiveDate, FileErrorReason> {
        match self.source {
            DateSource::Metadata => self
                .metadata
                .read_date(path)
                .ok_or(FileErrorReason::NoMetadataDate),
            DateSource::CreationTime => self.creation_date(path),
            DateSource::Filename => {
                parse_filename_date(&file_name_of(path)).ok_or(FileErrorReason::NoDateInName)
            }
        }
    }

    fn creation_date(&self, path: &Path) -> Result<NaiveDate, FileErrorReason> {
        let meta = fs::metadata(path).map_err(|err| FileErrorReason::Unreadable(err.to_string()))?;
        let time = match (meta.created(), self.fallback) {
            (Ok(created), _) => created,
            (Err(err), CreationTimeFallback::Modified) => {
                debug!(path = %path.display(), "creation time unavailable ({err}), using modified time");
                meta.modified()
                    .map_err(|_| FileErrorReason::NoCreationTime)?
            }
            (Err(_), CreationTimeFallback::Error) => return Err(FileErrorReason::NoCreationTime),
        };
        Ok(self.metadata.zone().date_of_system_time(time))
    }
}

/// One file with its resolved destination folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    pub source_path: PathBuf,
    pub file_name: String,
    pub date: NaiveDate,
    pub target_dir: PathBuf,
}

/// Per-file outcomes of date resolution, in input order.
#[derive(Debug, Clone, Default)]
pub struct SortPlan {
    pub entries: Vec<Result<PlannedFile, FileError>>,
}

impl SortPlan {
    pub fn planned(&self) -> impl Iterator<Item = &PlannedFile> {
        self.entries.iter().filter_map(|entry| entry.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileError> {
        self.entries.iter().filter_map(|entry| entry.as_ref().err())
    }
}

/// Resolves dates for `files` in parallel. Results keep the order of
/// `files`.
pub fn plan_sort(config: &SortConfig, files: &[PathBuf]) -> SortPlan {
    let resolver = DateResolver::new(
        config.date_source,
        config.creation_time_fallback,
        config.host_zone,
    );

    let entries = files
        .par_iter()
        .map(|path| {
            let file_name = file_name_of(path);
            match resolver.resolve(path) {
                Ok(date) => Ok(PlannedFile {
                    source_path: path.clone(),
                    target_dir: config.dest_dir.join(config.folder_template.apply(date)),
                    file_name,
                    date,
                }),
                Err(reason) => Err(FileError::new(file_name, reason)),
            }
        })
        .collect();

    SortPlan { entries }
}
