mod apply;
mod config;
mod container;
mod convention;
mod datetime;
mod error;
mod exif_reader;
mod filename_date;
mod glob;
mod metadata;
mod planner;
mod report;
mod run;
mod scanner;
mod template;
mod xmp_reader;

pub use apply::{
    apply_plan, claim_destination, transfer_file, unique_destination, CollisionPolicy,
    NoopObserver, RunObserver, SortRun, Transfer,
};
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
    SortConfig,
};
pub use container::{read_container_tags, ContainerFamily, ContainerTag, TagValue};
pub use convention::{detect_convention, find_convention, NamingConvention, CONVENTIONS};
pub use datetime::{parse_timestamp_text, parse_utc_offset, HostZone, Timestamp};
pub use error::{FileError, FileErrorReason, SortError};
pub use filename_date::parse_filename_date;
pub use glob::{normalize_pattern, GlobMatcher, NameFilter, MATCH_ALL_PATTERN};
pub use metadata::{is_photo_like, MetadataDateReader, MetadataStage};
pub use planner::{plan_sort, CreationTimeFallback, DateResolver, DateSource, PlannedFile, SortPlan};
pub use report::{latest_report, render_report, report_file_name, write_report};
pub use run::{run_sort, run_sort_with, RunOutcome};
pub use scanner::{list_source_files, scan, ScanResult};
pub use template::{is_valid, FolderTemplate, TemplateError, DEFAULT_FOLDER_TEMPLATE};
