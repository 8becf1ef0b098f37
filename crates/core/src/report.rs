use crate::apply::{claim_destination, SortRun};
use crate::config::SortConfig;
use crate::planner::DateSource;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const REPORT_PREFIX: &str = "mediasort-";
const REPORT_SUFFIX: &str = ".log";

pub fn report_file_name(at: DateTime<Local>) -> String {
    format!("{}{}{}", REPORT_PREFIX, at.format("%Y%m%d-%H%M%S"), REPORT_SUFFIX)
}

pub fn render_report(run: &SortRun, config: &SortConfig, at: DateTime<Local>) -> String {
    let mut out = String::new();
    let mode = if config.copy_mode { "copy" } else { "move" };
    let date_source = match config.date_source {
        DateSource::Metadata => "metadata",
        DateSource::CreationTime => "creation time",
        DateSource::Filename => "filename",
    };

    // Writing to a String cannot fail.
    let _ = writeln!(out, "=== mediasort run report ===");
    let _ = writeln!(out, "Date/time: {}", at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Source: {}", config.source_dir.display());
    let _ = writeln!(out, "Destination: {}", config.dest_dir.display());
    let _ = writeln!(out, "Folder template: {}", config.folder_template);
    let _ = writeln!(out, "Filter: {}", config.name_filter.describe());
    let _ = writeln!(out, "Mode: {}", mode);
    let _ = writeln!(out, "Date source: {}", date_source);
    let _ = writeln!(out);
    let _ = writeln!(out, "Totals:");
    let _ = writeln!(out, "  processed: {}", run.processed_count);
    let _ = writeln!(out, "  transferred: {}", run.transferred_count);
    let _ = writeln!(out, "  errors: {}", run.errors.len());
    if run.cancelled {
        let _ = writeln!(out, "  cancelled before completion");
    }

    if !run.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Errors:");
        for (i, err) in run.errors.iter().enumerate() {
            let _ = writeln!(out, "{}) {}", i + 1, err);
        }
    }
    out
}

/// Writes the report into `dir` and returns its path. A run finishing in the
/// same second as an earlier one gets a `_001` style suffix.
pub fn write_report(dir: &Path, run: &SortRun, config: &SortConfig) -> Result<PathBuf> {
    write_report_at(dir, run, config, Local::now())
}

fn write_report_at(
    dir: &Path,
    run: &SortRun,
    config: &SortConfig,
    at: DateTime<Local>,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report dir: {}", dir.display()))?;
    let path = claim_destination(dir.join(report_file_name(at)), true)
        .with_context(|| format!("failed to create report in {}", dir.display()))?
        .with_context(|| format!("no free report name in {}", dir.display()))?;
    fs::write(&path, render_report(run, config, at))
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(path)
}

/// Most recent report in `dir`, by name. Names embed the timestamp, so the
/// lexical maximum is the newest.
pub fn latest_report(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut latest: Option<PathBuf> = None;
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read report dir: {}", dir.display()))?
    {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default();
        if !name.starts_with(REPORT_PREFIX) || !name.ends_with(REPORT_SUFFIX) {
            continue;
        }
        if latest.as_ref().map_or(true, |current| path > *current) {
            latest = Some(path);
        }
    }
    Ok(latest)
}
