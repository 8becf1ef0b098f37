use crate::apply::{apply_plan, NoopObserver, RunObserver, SortRun};
use crate::config::SortConfig;
use crate::error::SortError;
use crate::planner::plan_sort;
use crate::scanner::{file_name_of, list_source_files};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RunOutcome {
    SourceEmpty,
    NoMatches { total_files: usize },
    Completed(SortRun),
}

pub fn run_sort(config: &SortConfig) -> Result<RunOutcome, SortError> {
    run_sort_with(config, &NoopObserver)
}

/// Re-scans the source with the active filter, resolves dates and transfers
/// every matching file in name order.
pub fn run_sort_with(
    config: &SortConfig,
    observer: &dyn RunObserver,
) -> Result<RunOutcome, SortError> {
    let source = &config.source_dir;
    if source.as_os_str().is_empty() || !source.is_dir() {
        return Err(SortError::SourceMissing(source.clone()));
    }
    validate_destination(config)?;

    let files = list_source_files(source).map_err(|err| SortError::Io {
        path: source.clone(),
        source: err,
    })?;
    if files.is_empty() {
        info!(source = %source.display(), "source folder is empty");
        return Ok(RunOutcome::SourceEmpty);
    }

    let total_files = files.len();
    let matching: Vec<PathBuf> = files
        .into_iter()
        .filter(|path| config.name_filter.is_match(&file_name_of(path)))
        .collect();
    if matching.is_empty() {
        info!(filter = config.name_filter.describe(), total_files, "no files match the filter");
        return Ok(RunOutcome::NoMatches { total_files });
    }

    info!(
        source = %source.display(),
        dest = %config.dest_dir.display(),
        files = matching.len(),
        date_source = ?config.date_source,
        copy = config.copy_mode,
        "sort started"
    );

    let plan = plan_sort(config, &matching);
    let run = apply_plan(&plan, config, observer);

    info!(
        processed = run.processed_count,
        transferred = run.transferred_count,
        errors = run.errors.len(),
        cancelled = run.cancelled,
        "sort finished"
    );
    Ok(RunOutcome::Completed(run))
}

fn validate_destination(config: &SortConfig) -> Result<(), SortError> {
    let dest = &config.dest_dir;
    let invalid = |reason: &str| SortError::InvalidDestination {
        path: dest.clone(),
        reason: reason.to_string(),
    };

    if dest.as_os_str().is_empty() {
        return Err(invalid("destination is blank"));
    }
    if dest.exists() && !dest.is_dir() {
        return Err(invalid("destination exists and is not a folder"));
    }
    if let (Ok(a), Ok(b)) = (fs::canonicalize(dest), fs::canonicalize(&config.source_dir)) {
        if a == b {
            return Err(invalid("destination is the source folder"));
        }
    }
    Ok(())
}
