use crate::template::TemplateError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Run-fatal conditions. Everything else is recorded per file.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("source folder is missing or unreadable: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("invalid destination {}: {reason}", path.display())]
    InvalidDestination { path: PathBuf, reason: String },
    #[error("invalid folder template: {0}")]
    InvalidTemplate(#[from] TemplateError),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum FileErrorReason {
    NoMetadataDate,
    NoCreationTime,
    NoDateInName,
    DestinationCollision,
    Transfer(String),
    Unreadable(String),
}

impl fmt::Display for FileErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMetadataDate => f.write_str("no date found in metadata"),
            Self::NoCreationTime => f.write_str("creation time not available"),
            Self::NoDateInName => f.write_str("no date found in filename"),
            Self::DestinationCollision => f.write_str("a file with this name already exists"),
            Self::Transfer(detail) => write!(f, "transfer failed: {detail}"),
            Self::Unreadable(detail) => write!(f, "could not read file: {detail}"),
        }
    }
}

/// A file the run skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub file_name: String,
    pub reason: FileErrorReason,
}

impl FileError {
    pub fn new(file_name: impl Into<String>, reason: FileErrorReason) -> Self {
        Self {
            file_name: file_name.into(),
            reason,
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file_name, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_error_display_names_file_and_reason() {
        let err = FileError::new("IMG_1.jpg", FileErrorReason::NoDateInName);
        assert_eq!(err.to_string(), "IMG_1.jpg: no date found in filename");

        let err = FileError::new("a.mov", FileErrorReason::Transfer("disk full".to_string()));
        assert_eq!(err.to_string(), "a.mov: transfer failed: disk full");
    }

    #[test]
    fn reasons_serialize_with_kind_tag() {
        let value = serde_json::to_value(FileErrorReason::Unreadable("denied".to_string()))
            .expect("serialize");
        assert_eq!(value["kind"], "unreadable");
        assert_eq!(value["detail"], "denied");

        let value = serde_json::to_value(FileErrorReason::NoMetadataDate).expect("serialize");
        assert_eq!(value["kind"], "no-metadata-date");
    }
}
