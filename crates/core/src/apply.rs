use crate::config::SortConfig;
use crate::error::{FileError, FileErrorReason};
use crate::planner::{PlannedFile, SortPlan};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Handling of a destination name that is already taken. Existing files are
/// never overwritten.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Append `_001`, `_002`, ... before the extension.
    #[default]
    Rename,
    /// Leave the file in place and record a collision error.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Summary of a completed (or cancelled) run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SortRun {
    pub processed_count: usize,
    pub transferred_count: usize,
    pub errors: Vec<FileError>,
    pub transfers: Vec<Transfer>,
    pub cancelled: bool,
}

/// Progress and cancellation hooks. Cancellation is polled between files
/// only.
pub trait RunObserver: Sync {
    fn on_file(&self, _index: usize, _total: usize, _file_name: &str) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

pub struct NoopObserver;

impl RunObserver for NoopObserver {}

impl RunObserver for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

pub fn apply_plan(plan: &SortPlan, config: &SortConfig, observer: &dyn RunObserver) -> SortRun {
    let mut run = SortRun::default();
    let total = plan.entries.len();

    for (index, entry) in plan.entries.iter().enumerate() {
        if observer.is_cancelled() {
            debug!(processed = run.processed_count, "run cancelled");
            run.cancelled = true;
            break;
        }

        let file_name = match entry {
            Ok(planned) => planned.file_name.as_str(),
            Err(err) => err.file_name.as_str(),
        };
        observer.on_file(index, total, file_name);
        run.processed_count += 1;

        let outcome = match entry {
            Ok(planned) => transfer_planned(planned, config),
            Err(err) => Err(err.clone()),
        };
        match outcome {
            Ok(transfer) => {
                run.transferred_count += 1;
                run.transfers.push(transfer);
            }
            Err(err) => {
                warn!("skipped {err}");
                run.errors.push(err);
            }
        }
    }

    run
}

fn transfer_planned(planned: &PlannedFile, config: &SortConfig) -> Result<Transfer, FileError> {
    let fail = |reason| FileError::new(planned.file_name.clone(), reason);

    fs::create_dir_all(&planned.target_dir).map_err(|err| {
        fail(FileErrorReason::Transfer(format!(
            "cannot create {}: {err}",
            planned.target_dir.display()
        )))
    })?;

    let candidate = planned.target_dir.join(&planned.file_name);
    let claimed = claim_destination(candidate, config.collision == CollisionPolicy::Rename)
        .map_err(|err| fail(FileErrorReason::Transfer(format!("cannot reserve target: {err}"))))?;
    let Some(target) = claimed else {
        return Err(fail(FileErrorReason::DestinationCollision));
    };

    if let Err(err) = transfer_file(&planned.source_path, &target, config.copy_mode) {
        if let Err(cleanup) = fs::remove_file(&target) {
            warn!(path = %target.display(), "could not release reserved target: {cleanup}");
        }
        return Err(fail(FileErrorReason::Transfer(format!("{err:#}"))));
    }
    debug!(from = %planned.source_path.display(), to = %target.display(), "transferred");

    Ok(Transfer {
        from: planned.source_path.clone(),
        to: target,
    })
}

/// `candidate` if free, otherwise the first free `{stem}_{NNN}.{ext}`.
pub fn unique_destination(candidate: PathBuf) -> PathBuf {
    if !candidate.exists() {
        return candidate;
    }

    let parent = candidate.parent().unwrap_or_else(|| Path::new("."));
    let stem = candidate
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let ext = candidate
        .extension()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut n = 1usize;
    loop {
        let mut name = format!("{}_{:03}", stem, n);
        if !ext.is_empty() {
            name.push('.');
            name.push_str(&ext);
        }
        let next = parent.join(name);
        if !next.exists() {
            return next;
        }
        n += 1;
    }
}

/// Reserves a destination by creating an empty file at `candidate`, or with
/// `rename` at the first free suffixed name. Creation is exclusive, so a file
/// that appears after a name was picked is never replaced; the next suffix is
/// tried instead. `None` means `candidate` is taken and `rename` is off.
pub fn claim_destination(candidate: PathBuf, rename: bool) -> io::Result<Option<PathBuf>> {
    loop {
        let target = if rename {
            unique_destination(candidate.clone())
        } else {
            candidate.clone()
        };
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(_) => return Ok(Some(target)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                if !rename {
                    return Ok(None);
                }
                debug!(path = %target.display(), "destination taken while claiming, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

/// Copies (or moves) `from` onto `to`, replacing it. `to` is expected to be
/// reserved with [`claim_destination`]. Copies are written to a hidden
/// `.part` file next to `to` and renamed into place, so a failed copy never
/// leaves a partial file under the final name. A move that cannot be renamed (for
/// example across devices) is copied and the source removed.
pub fn transfer_file(from: &Path, to: &Path, copy_mode: bool) -> Result<()> {
    if copy_mode {
        return copy_via_temp(from, to);
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(from = %from.display(), "rename failed ({err}), copying instead");
            copy_via_temp(from, to)?;
            fs::remove_file(from).with_context(|| {
                format!("copied but could not remove source: {}", from.display())
            })
        }
    }
}

fn copy_via_temp(from: &Path, to: &Path) -> Result<()> {
    let temp = temp_path_for(to);
    let copied = fs::copy(from, &temp)
        .with_context(|| format!("copy failed: {} -> {}", from.display(), temp.display()))
        .and_then(|_| {
            fs::rename(&temp, to).with_context(|| {
                format!("could not finalize: {} -> {}", temp.display(), to.display())
            })
        });
    if copied.is_err() && temp.exists() {
        if let Err(err) = fs::remove_file(&temp) {
            warn!(path = %temp.display(), "could not remove partial copy: {err}");
        }
    }
    copied
}

fn temp_path_for(target: &Path) -> PathBuf {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let file_name = target
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    parent.join(format!(".{}.part", file_name))
}
