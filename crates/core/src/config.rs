use crate::apply::CollisionPolicy;
use crate::datetime::HostZone;
use crate::error::SortError;
use crate::glob::{NameFilter, MATCH_ALL_PATTERN};
use crate::planner::{CreationTimeFallback, DateSource};
use crate::template::FolderTemplate;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Persisted defaults, stored as TOML in the platform config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source_dir: String,
    pub dest_dir: String,
    pub filename_pattern: String,
    pub folder_template: String,
    pub date_source: DateSource,
    pub copy_mode: bool,
    pub collision: CollisionPolicy,
    pub fallback_to_modified: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_dir: String::new(),
            dest_dir: String::new(),
            filename_pattern: MATCH_ALL_PATTERN.to_string(),
            folder_template: FolderTemplate::default().to_string(),
            date_source: DateSource::default(),
            copy_mode: true,
            collision: CollisionPolicy::default(),
            fallback_to_modified: false,
        }
    }
}

impl AppConfig {
    /// Replaces an unusable stored template with the default. Returns true
    /// when something was changed.
    pub fn repair(&mut self) -> bool {
        if FolderTemplate::parse(self.folder_template.trim()).is_ok() {
            return false;
        }
        warn!(
            template = %self.folder_template,
            "stored folder template is invalid, reverting to default"
        );
        self.folder_template = FolderTemplate::default().to_string();
        true
    }

    pub fn to_sort_config(&self, host_zone: HostZone) -> Result<SortConfig> {
        let folder_template =
            FolderTemplate::parse(self.folder_template.trim()).map_err(SortError::InvalidTemplate)?;
        Ok(SortConfig {
            source_dir: PathBuf::from(self.source_dir.trim()),
            dest_dir: PathBuf::from(self.dest_dir.trim()),
            name_filter: NameFilter::parse(&self.filename_pattern),
            folder_template,
            date_source: self.date_source,
            copy_mode: self.copy_mode,
            collision: self.collision,
            creation_time_fallback: if self.fallback_to_modified {
                CreationTimeFallback::Modified
            } else {
                CreationTimeFallback::Error
            },
            host_zone,
        })
    }
}

/// Everything a run needs, fixed for its duration.
#[derive(Debug, Clone)]
pub struct SortConfig {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub name_filter: NameFilter,
    pub folder_template: FolderTemplate,
    pub date_source: DateSource,
    pub copy_mode: bool,
    pub collision: CollisionPolicy,
    pub creation_time_fallback: CreationTimeFallback,
    pub host_zone: HostZone,
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub log_dir: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "mediasort", "mediasort")
        .context("could not determine the platform config directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        log_dir: proj.data_local_dir().join("logs"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths.config_path)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    save_config_to(&paths.config_path, config)
}

/// Missing file means defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let mut config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("failed to parse config: {}", path.display()))?;
    config.repair();
    Ok(config)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config dir: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(path, body)
        .with_context(|| format!("failed to write config: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempdir().expect("tempdir");
        let config = load_config_from(&temp.path().join("config.toml")).expect("load");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.filename_pattern, "*.*");
        assert_eq!(config.folder_template, "YYYYMMDD");
        assert!(config.copy_mode);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("config.toml");
        let config = AppConfig {
            source_dir: "/media/card".to_string(),
            folder_template: "YYYY-MM".to_string(),
            date_source: DateSource::CreationTime,
            collision: CollisionPolicy::Skip,
            ..AppConfig::default()
        };

        save_config_to(&path, &config).expect("save");
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("date_source = \"creation-time\""));
        assert_eq!(load_config_from(&path).expect("load"), config);
    }

    #[test]
    fn invalid_stored_template_reverts_to_default() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "folder_template = \"YYYY/MM\"\ncopy_mode = false\n").expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.folder_template, "YYYYMMDD");
        assert!(!config.copy_mode);
        assert_eq!(config.filename_pattern, "*.*");
    }

    #[test]
    fn sort_config_maps_fields() {
        let config = AppConfig {
            source_dir: " /in ".to_string(),
            dest_dir: "/out".to_string(),
            filename_pattern: "img_yyyymmdd".to_string(),
            fallback_to_modified: true,
            ..AppConfig::default()
        };
        let sort = config.to_sort_config(HostZone::default()).expect("sort config");
        assert_eq!(sort.source_dir, PathBuf::from("/in"));
        assert_eq!(sort.name_filter.describe(), "IMG_YYYYMMDD");
        assert_eq!(sort.creation_time_fallback, CreationTimeFallback::Modified);
        assert_eq!(sort.folder_template.as_str(), "YYYYMMDD");
    }

    #[test]
    fn sort_config_rejects_bad_template() {
        let config = AppConfig {
            folder_template: "MMM".to_string(),
            ..AppConfig::default()
        };
        assert!(config.to_sort_config(HostZone::default()).is_err());
    }
}
