use crate::convention::detect_convention;
use crate::glob::{normalize_pattern, GlobMatcher};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Live feedback for a source folder before a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub total_files: usize,
    pub matched_files: usize,
    pub detected_pattern: Option<String>,
    pub source_missing: bool,
    pub empty_source: bool,
}

impl ScanResult {
    pub fn missing() -> Self {
        Self {
            source_missing: true,
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self {
            empty_source: true,
            ..Self::default()
        }
    }
}

/// Regular files directly inside `dir`, sorted by file name.
pub fn list_source_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Detects the naming convention of `source_dir`. When no convention
/// matches, `fallback_pattern` is counted instead and no pattern is
/// reported.
pub fn scan(source_dir: &Path, fallback_pattern: &str) -> ScanResult {
    if source_dir.as_os_str().is_empty() || !source_dir.is_dir() {
        return ScanResult::missing();
    }
    let Ok(files) = list_source_files(source_dir) else {
        return ScanResult::missing();
    };
    if files.is_empty() {
        return ScanResult::empty();
    }

    let names: Vec<String> = files.iter().map(|path| file_name_of(path)).collect();
    let total_files = names.len();

    if let Some((convention, matched_files)) = detect_convention(&names) {
        return ScanResult {
            total_files,
            matched_files,
            detected_pattern: Some(convention.label.to_string()),
            ..ScanResult::default()
        };
    }

    let glob = GlobMatcher::compile(normalize_pattern(fallback_pattern));
    ScanResult {
        total_files,
        matched_files: names.iter().filter(|name| glob.is_match(name)).count(),
        ..ScanResult::default()
    }
}
