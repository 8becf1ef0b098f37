mod logging;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mediasort_core::{
    app_paths, latest_report, load_config, run_sort_with, save_config, scan, write_report,
    AppConfig, CollisionPolicy, CreationTimeFallback, DateResolver, DateSource, FileErrorReason,
    FolderTemplate, HostZone, MetadataDateReader, RunObserver, RunOutcome, SortConfig, SortRun,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Parser)]
#[command(name = "mediasort")]
#[command(about = "Sorts photos and videos into dated folders")]
struct Cli {
    /// Debug-level logging unless MEDIASORT_LOG says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    /// Fixed UTC offset used to turn instants into dates, as `+05:30` or
    /// whole hours like `-5` (defaults to the system zone).
    #[arg(long, global = true, allow_hyphen_values = true, value_parser = parse_host_zone)]
    utc_offset: Option<HostZone>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect the naming convention of a source folder.
    Scan(ScanArgs),
    /// Copy or move matching files into dated folders.
    Sort(SortArgs),
    /// Print the date each file would be sorted by.
    Date(DateArgs),
    /// Print the most recent run report.
    Log(LogArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
}

#[derive(Debug, Args)]
struct ScanArgs {
    #[arg(long)]
    source: Option<PathBuf>,
    #[arg(long)]
    pattern: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct SortArgs {
    #[arg(long)]
    source: Option<PathBuf>,
    #[arg(long)]
    dest: Option<PathBuf>,
    /// Glob (`*.jpg`) or a convention label (`IMG_YYYYMMDD`). Defaults to the
    /// detected convention, then the stored pattern.
    #[arg(long)]
    pattern: Option<String>,
    #[arg(long)]
    template: Option<String>,
    #[arg(long, value_enum)]
    date_source: Option<DateSourceArg>,
    #[arg(long = "move", default_value_t = false)]
    move_files: bool,
    #[arg(long, value_enum)]
    collision: Option<CollisionArg>,
    #[arg(long, default_value_t = false)]
    fallback_to_modified: bool,
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    no_report: bool,
    /// Store the effective options as the new defaults.
    #[arg(long, default_value_t = false)]
    save: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct DateArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(long, value_enum)]
    date_source: Option<DateSourceArg>,
    #[arg(long, default_value_t = false)]
    fallback_to_modified: bool,
}

#[derive(Debug, Args)]
struct LogArgs {
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateSourceArg {
    Metadata,
    CreationTime,
    Filename,
}

impl From<DateSourceArg> for DateSource {
    fn from(value: DateSourceArg) -> Self {
        match value {
            DateSourceArg::Metadata => DateSource::Metadata,
            DateSourceArg::CreationTime => DateSource::CreationTime,
            DateSourceArg::Filename => DateSource::Filename,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CollisionArg {
    Rename,
    Skip,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(value: CollisionArg) -> Self {
        match value {
            CollisionArg::Rename => CollisionPolicy::Rename,
            CollisionArg::Skip => CollisionPolicy::Skip,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    let zone = cli.utc_offset.unwrap_or_default();

    match cli.command {
        Commands::Scan(args) => cmd_scan(args),
        Commands::Sort(args) => cmd_sort(args, zone),
        Commands::Date(args) => cmd_date(args, zone),
        Commands::Log(args) => cmd_log(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn parse_host_zone(raw: &str) -> Result<HostZone, String> {
    HostZone::parse(raw)
        .ok_or_else(|| format!("expected an offset like +05:30 or -5, got '{raw}'"))
}

fn cmd_scan(args: ScanArgs) -> Result<()> {
    let config = load_config()?;
    let source = args
        .source
        .unwrap_or_else(|| PathBuf::from(config.source_dir.trim()));
    let pattern = args.pattern.unwrap_or(config.filename_pattern);
    let result = scan(&source, &pattern);

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => {
            if result.source_missing {
                println!("Source folder not found: {}", source.display());
            } else if result.empty_source {
                println!("Source folder is empty: {}", source.display());
            } else {
                println!("Files: {}", result.total_files);
                println!("Matching: {}", result.matched_files);
                match &result.detected_pattern {
                    Some(label) => println!("Detected convention: {}", label),
                    None => println!("No naming convention detected, using '{}'", pattern.trim()),
                }
            }
        }
    }
    Ok(())
}

fn cmd_sort(args: SortArgs, zone: HostZone) -> Result<()> {
    let mut config = load_config()?;
    merge_sort_args(&mut config, &args);

    // An auto-detected convention becomes the active filter unless the user
    // named one explicitly.
    if args.pattern.is_none() {
        let detected = scan(Path::new(config.source_dir.trim()), &config.filename_pattern);
        if let Some(label) = detected.detected_pattern {
            debug!(label = %label, "using detected convention");
            config.filename_pattern = label;
        }
    }

    let sort_config = config.to_sort_config(zone)?;
    if args.save {
        save_config(&config)?;
    }

    let outcome = run_sort_with(&sort_config, &ProgressLog)?;

    if let RunOutcome::Completed(run) = &outcome {
        if !args.no_report {
            let dir = match &args.log_dir {
                Some(dir) => dir.clone(),
                None => app_paths()?.log_dir,
            };
            let path = write_report(&dir, run, &sort_config)?;
            eprintln!("Report written: {}", path.display());
        }
    }

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Table => print_outcome(&outcome, &sort_config),
    }
    Ok(())
}

fn merge_sort_args(config: &mut AppConfig, args: &SortArgs) {
    if let Some(source) = &args.source {
        config.source_dir = source.display().to_string();
    }
    if let Some(dest) = &args.dest {
        config.dest_dir = dest.display().to_string();
    }
    if let Some(pattern) = &args.pattern {
        config.filename_pattern = pattern.clone();
    }
    if let Some(template) = &args.template {
        let current = FolderTemplate::parse(config.folder_template.trim()).unwrap_or_default();
        match current.revise(template) {
            Ok(revised) => config.folder_template = revised.to_string(),
            Err(err) => warn!("ignoring folder template '{template}' ({err}), keeping '{current}'"),
        }
    }
    if let Some(date_source) = args.date_source {
        config.date_source = date_source.into();
    }
    if args.move_files {
        config.copy_mode = false;
    }
    if let Some(collision) = args.collision {
        config.collision = collision.into();
    }
    if args.fallback_to_modified {
        config.fallback_to_modified = true;
    }
}

struct ProgressLog;

impl RunObserver for ProgressLog {
    fn on_file(&self, index: usize, total: usize, file_name: &str) {
        debug!("[{}/{}] {}", index + 1, total, file_name);
    }
}

fn print_outcome(outcome: &RunOutcome, config: &SortConfig) {
    match outcome {
        RunOutcome::SourceEmpty => {
            println!("Source folder is empty: {}", config.source_dir.display())
        }
        RunOutcome::NoMatches { total_files } => println!(
            "No files match '{}' ({} files in source)",
            config.name_filter.describe(),
            total_files
        ),
        RunOutcome::Completed(run) => print_run(run),
    }
}

fn print_run(run: &SortRun) {
    for transfer in &run.transfers {
        println!("{} -> {}", transfer.from.display(), transfer.to.display());
    }
    if !run.errors.is_empty() {
        println!("\nErrors:");
        for (i, err) in run.errors.iter().enumerate() {
            println!("{}) {}", i + 1, err);
        }
    }
    println!(
        "\nprocessed={} transferred={} errors={}{}",
        run.processed_count,
        run.transferred_count,
        run.errors.len(),
        if run.cancelled { " (cancelled)" } else { "" }
    );
}

fn cmd_date(args: DateArgs, zone: HostZone) -> Result<()> {
    let config = load_config()?;
    let source = args.date_source.map(Into::into).unwrap_or(config.date_source);
    let fallback = if args.fallback_to_modified || config.fallback_to_modified {
        CreationTimeFallback::Modified
    } else {
        CreationTimeFallback::Error
    };
    let resolver = DateResolver::new(source, fallback, zone);
    let metadata = MetadataDateReader::new(zone);

    for path in &args.files {
        let detail = if source == DateSource::Metadata {
            match metadata.read_date_with_stage(path) {
                Some((date, stage)) => format!("{} ({:?})", date, stage),
                None => format!("- {}", FileErrorReason::NoMetadataDate),
            }
        } else {
            match resolver.resolve(path) {
                Ok(date) => date.to_string(),
                Err(reason) => format!("- {}", reason),
            }
        };
        println!("{}\t{}", path.display(), detail);
    }
    Ok(())
}

fn cmd_log(args: LogArgs) -> Result<()> {
    let dir = match args.log_dir {
        Some(dir) => dir,
        None => app_paths()?.log_dir,
    };
    let Some(path) = latest_report(&dir)? else {
        bail!("no run report found in {}", dir.display());
    };
    let body = fs::read_to_string(&path)
        .with_context(|| format!("failed to read report: {}", path.display()))?;
    println!("{}", path.display());
    print!("{}", body);
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("Config file: {}", paths.config_path.display());
    println!("Reports: {}", paths.log_dir.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
