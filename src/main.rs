//! reclaim - disk usage analysis and safe space reclamation.
//!
//! Usage:
//!   reclaim scan [PATH]          Scan and show a summary
//!   reclaim duplicates [PATH]    Find duplicate files
//!   reclaim clean [PATH] ...     Preview or commit a cleaning plan
//!   reclaim history              Show past scans and cleanings
//!   reclaim helper delete PATHS  Privileged helper side of `clean`
//!   reclaim --help               Show help

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use reclaim_analyze::{AnalysisResult, DuplicateConfig, DuplicateDetector, DuplicateReport};
use reclaim_clean::{
    CleanUpdate, CleaningExecutor, CleaningPlanner, CleaningPreview, CleaningResult, PlanMode, SafetyClass, Selection,
    TargetOutcome, serve_delete, start_clean,
};
use reclaim_core::access::is_superuser;
use reclaim_core::{CancellationToken, Category, DeleteMode, DirectoryNode, EngineConfig, WorkerPool};
use reclaim_history::{AnalysisRecorder, JsonLinesStore};
use reclaim_scan::{ScanReport, TreeScanner};

#[derive(Parser)]
#[command(
    name = "reclaim",
    version,
    about = "Disk usage analysis and safe space reclamation",
    long_about = "reclaim shows where your disk space goes, finds duplicate files \
                  and removes what you select, previewing every deletion first."
)]
struct Cli {
    /// Configuration file (defaults to <config dir>/reclaim/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads for scanning and hashing
    #[arg(short = 'j', long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory and show a summary
    Scan {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum tree depth to display
        #[arg(short, long, default_value = "2")]
        depth: u32,

        /// Number of entries to show per list
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Do not record this scan in the history
        #[arg(long)]
        no_history: bool,
    },

    /// Find duplicate files
    Duplicates {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum number of duplicate groups to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Preview, and optionally commit, a cleaning plan
    Clean {
        /// Scan root the selections refer to
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Clean every file of a category (packages, archives, logs, ...)
        #[arg(long = "category", value_name = "CATEGORY")]
        categories: Vec<Category>,

        /// Only clean category files not modified for this many days
        #[arg(long, value_name = "DAYS", requires = "categories")]
        older_than: Option<u64>,

        /// Empty the configured safe cache locations
        #[arg(long)]
        caches: bool,

        /// Clean a specific file or directory
        #[arg(long = "path", value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Remove redundant copies of every duplicate group
        #[arg(long)]
        duplicates: bool,

        /// Actually delete; without this only a preview is shown
        #[arg(long)]
        commit: bool,

        /// Confirm caution targets without asking
        #[arg(short, long)]
        yes: bool,

        /// Move to the trash instead of deleting permanently
        #[arg(long)]
        trash: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show past scans and cleanings
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Delete all history
        #[arg(long)]
        clear: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Privileged helper invoked by `clean` for protected paths
    #[command(hide = true)]
    Helper {
        #[command(subcommand)]
        action: HelperAction,
    },
}

#[derive(Subcommand)]
enum HelperAction {
    /// Delete absolute paths and print a JSON report
    Delete {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Scan {
            path,
            depth,
            top,
            format,
            no_history,
        } => {
            let config = load_config(cli.config.as_deref(), &path, cli.workers)?;
            run_scan(&config, depth, top, format, !no_history)?;
        }
        Command::Duplicates { path, top, format } => {
            let config = load_config(cli.config.as_deref(), &path, cli.workers)?;
            run_duplicates(&config, top, format)?;
        }
        Command::Clean {
            path,
            categories,
            older_than,
            caches,
            paths,
            duplicates,
            commit,
            yes,
            trash,
            format,
        } => {
            let mut config = load_config(cli.config.as_deref(), &path, cli.workers)?;
            if trash {
                config.delete_mode = DeleteMode::Trash;
            }
            let older_than = older_than.map(|days| Duration::from_secs(days * 24 * 60 * 60));
            let mut selections: Vec<Selection> = categories
                .into_iter()
                .map(|category| Selection::Category { category, older_than })
                .collect();
            selections.extend(paths.into_iter().map(Selection::Path));
            if duplicates {
                selections.push(Selection::AllDuplicates);
            }
            if caches {
                selections.push(Selection::SafeCaches);
            }
            if selections.is_empty() {
                bail!("Nothing selected; use --category, --path, --duplicates or --caches");
            }
            let mode = if commit { PlanMode::Commit } else { PlanMode::Preview };
            run_clean(&config, &selections, mode, yes, format)?;
        }
        Command::History { limit, clear, format } => {
            run_history(limit, clear, format)?;
        }
        Command::Helper {
            action: HelperAction::Delete { paths },
        } => {
            run_helper_delete(&paths)?;
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RECLAIM_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("RECLAIM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load the configuration and point it at `root`.
fn load_config(explicit: Option<&Path>, root: &Path, workers: Option<usize>) -> Result<EngineConfig> {
    let mut config = match explicit {
        Some(path) => EngineConfig::load(path)?,
        None => match EngineConfig::default_path().filter(|path| path.exists()) {
            Some(path) => EngineConfig::load(&path)?,
            None => EngineConfig::default(),
        },
    };

    let root = root.canonicalize().context("Invalid path")?;
    config.scan_roots = vec![root];
    if let Some(workers) = workers {
        config.worker_limit = workers;
    }
    config.canonicalize_paths();
    config.validate()?;
    Ok(config)
}

fn root_of(config: &EngineConfig) -> Result<&Path> {
    match config.scan_roots.first() {
        Some(root) => Ok(root),
        None => bail!("No scan root configured"),
    }
}

/// Scan the configured root and find duplicates.
fn analyze(config: &EngineConfig, dup_config: DuplicateConfig) -> Result<(ScanReport, DuplicateReport)> {
    let root = root_of(config)?;
    let cancel = CancellationToken::new();
    let pool = WorkerPool::start(config.worker_limit)?;

    eprintln!("Scanning {}...", root.display());
    let scan = TreeScanner::new()
        .with_pool(pool.clone())
        .scan(root, &config.scan_options(), &cancel)
        .context("Scan failed")?;

    eprintln!("Finding duplicates...");
    let duplicates = DuplicateDetector::with_config(dup_config)
        .with_pool(pool.clone())
        .find_duplicates(&scan, &cancel);

    pool.shutdown();
    Ok((scan, duplicates))
}

/// Run a scan and display a summary.
fn run_scan(config: &EngineConfig, depth: u32, top: Option<usize>, format: OutputFormat, record: bool) -> Result<()> {
    let top_n = top.unwrap_or(config.top_n);
    let (scan, duplicates) = analyze(config, DuplicateConfig::default())?;
    let summary = AnalysisResult::from_scan(&scan, &duplicates, top_n);

    if record {
        match JsonLinesStore::open_default() {
            Ok(store) => {
                if let Err(err) = AnalysisRecorder::new(store).record_scan(&summary) {
                    warn!(error = %err, "could not record scan history");
                }
            }
            Err(err) => warn!(error = %err, "could not record scan history"),
        }
    }

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(60));
            println!(" {} - {}", summary.root_path.display(), format_size(summary.total_size));
            println!(
                " {} files, {} directories",
                scan.stats.total_files, scan.stats.total_dirs
            );
            println!(" Scanned in {:.2}s", scan.scan_duration.as_secs_f64());
            println!("{}", "─".repeat(60));
            println!();

            println!(" Categories:");
            for (category, stats) in &summary.categories {
                if stats.file_count == 0 {
                    continue;
                }
                let ratio = ratio(stats.total_size, summary.total_size);
                println!(
                    "   {:<12} {:>10} {:>8} files  {}",
                    category.to_string(),
                    format_size(stats.total_size),
                    stats.file_count,
                    make_bar(ratio, 20)
                );
            }
            println!();

            println!(" Largest files:");
            for entry in &summary.largest_files {
                println!("   {:>10}  {}", format_size(entry.size), entry.path.display());
            }
            println!();

            print_node(&scan.root, 0, depth, top_n, scan.root.aggregate_size);

            if summary.wasted_bytes() > 0 {
                println!();
                println!(
                    " {} duplicate groups waste {}",
                    summary.duplicates.len(),
                    format_size(summary.wasted_bytes())
                );
            }
            if !summary.diagnostics.is_empty() {
                println!();
                println!("{} warning(s) during analysis", summary.diagnostics.len());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Run duplicate detection.
fn run_duplicates(config: &EngineConfig, top_n: usize, format: OutputFormat) -> Result<()> {
    let dup_config = DuplicateConfig::builder().max_groups(top_n).build()?;
    let (_, report) = analyze(config, dup_config)?;

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Duplicate File Report");
            println!("{}", "─".repeat(70));
            println!();

            if report.groups.is_empty() {
                println!(" No duplicate files found.");
            } else {
                println!(
                    " Found {} duplicate groups ({} files)",
                    report.group_count(),
                    report.files_with_duplicates
                );
                println!(" Total wasted space: {}", format_size(report.total_wasted_space));
                println!();

                for (i, group) in report.groups.iter().enumerate() {
                    println!(
                        " Group {} ({} files, {} each, {} wasted)",
                        i + 1,
                        group.count(),
                        format_size(group.size),
                        format_size(group.wasted_bytes)
                    );
                    for path in group.paths() {
                        println!("   {}", path.display());
                    }
                    println!();
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Build a plan, show it, and execute it when committing.
fn run_clean(
    config: &EngineConfig,
    selections: &[Selection],
    mode: PlanMode,
    assume_yes: bool,
    format: OutputFormat,
) -> Result<()> {
    let needs_duplicates = selections
        .iter()
        .any(|s| matches!(s, Selection::AllDuplicates | Selection::Duplicates(_)));
    let (scan, duplicates) = if needs_duplicates {
        analyze(config, DuplicateConfig::default())?
    } else {
        let root = root_of(config)?;
        eprintln!("Scanning {}...", root.display());
        let scan = TreeScanner::new()
            .scan(root, &config.scan_options(), &CancellationToken::new())
            .context("Scan failed")?;
        (scan, DuplicateReport::default())
    };

    let mut plan = CleaningPlanner::new(config.clone()).plan(
        &scan,
        needs_duplicates.then_some(&duplicates),
        selections,
        mode,
        &CancellationToken::new(),
    )?;

    match format {
        OutputFormat::Text => print_plan(&plan),
        OutputFormat::Json if mode == PlanMode::Preview => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Json => {}
    }

    if mode == PlanMode::Preview || plan.is_empty() {
        return Ok(());
    }

    if plan.requires_confirmation() {
        if assume_yes || confirm(&plan)? {
            plan.confirm();
        } else {
            eprintln!("Caution targets will be skipped.");
        }
    }

    let executor = Arc::new(CleaningExecutor::new(config));
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        let mut rx = start_clean(executor, plan, CancellationToken::new());
        let mut last = None;
        while let Some(update) = rx.recv().await {
            match update {
                CleanUpdate::Progress(progress) => {
                    if let Some(path) = &progress.current_path {
                        eprint!(
                            "\r[{:>3.0}%] {}",
                            progress.percentage(),
                            truncate(&path.display().to_string(), 60)
                        );
                    }
                }
                CleanUpdate::Complete(result) => last = Some(result),
            }
        }
        eprintln!();
        last
    });

    let result = match result {
        Some(result) => result?,
        None => bail!("Cleaning task ended without a result"),
    };

    let operation = describe_selections(selections);
    match JsonLinesStore::open_default() {
        Ok(store) => {
            if let Err(err) = AnalysisRecorder::new(store).record_cleaning(operation, &result) {
                warn!(error = %err, "could not record cleaning history");
            }
        }
        Err(err) => warn!(error = %err, "could not record cleaning history"),
    }

    match format {
        OutputFormat::Text => print_result(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if let Some(fatal) = &result.fatal {
        bail!("Cleaning stopped: {}", fatal.message);
    }
    Ok(())
}

fn print_plan(plan: &CleaningPreview) {
    println!();
    println!("{}", "─".repeat(70));
    match plan.mode {
        PlanMode::Preview => println!(" Cleaning Preview (nothing will be deleted)"),
        PlanMode::Commit => println!(" Cleaning Plan"),
    }
    println!("{}", "─".repeat(70));
    println!();

    if plan.is_empty() {
        println!(" Nothing to clean.");
    }
    for target in &plan.targets {
        println!(
            "   {:<18} {:>10}  {}{}",
            format!("[{}]", target.safety),
            format_size(target.estimated_size),
            target.path.display(),
            if target.is_dir { "/" } else { "" }
        );
    }
    if !plan.is_empty() {
        println!();
        println!(
            " {} targets, {} estimated ({} safe, {} caution, {} privileged)",
            plan.len(),
            format_size(plan.total_estimated_bytes),
            format_size(plan.estimated_bytes(SafetyClass::Safe)),
            format_size(plan.estimated_bytes(SafetyClass::Caution)),
            format_size(plan.estimated_bytes(SafetyClass::RequiresPrivilege)),
        );
    }
    for warning in &plan.warnings {
        println!(" warning: {}", warning.message);
    }
    println!();
}

fn print_result(result: &CleaningResult) {
    println!(
        " Deleted {} targets ({} files), freed {}",
        result.deleted_count(),
        result.files_deleted,
        format_size(result.bytes_freed)
    );
    for outcome in &result.outcomes {
        match &outcome.outcome {
            TargetOutcome::Deleted { .. } => {}
            TargetOutcome::Skipped { reason } => {
                println!("   skipped {}: {}", outcome.path.display(), reason);
            }
            TargetOutcome::Failed { message, .. } => {
                println!("   failed  {}: {}", outcome.path.display(), message);
            }
        }
    }
}

/// Ask on the terminal whether caution targets may be deleted.
fn confirm(plan: &CleaningPreview) -> Result<bool> {
    let count = plan.by_safety(SafetyClass::Caution).count();
    eprint!(
        "Delete {} caution target(s) ({})? [y/N] ",
        count,
        format_size(plan.estimated_bytes(SafetyClass::Caution))
    );
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn describe_selections(selections: &[Selection]) -> String {
    selections
        .iter()
        .map(|selection| match selection {
            Selection::Path(path) => format!("path:{}", path.display()),
            Selection::Category {
                category,
                older_than: Some(age),
            } => format!("category:{category}>{}d", age.as_secs() / (24 * 60 * 60)),
            Selection::Category { category, .. } => format!("category:{category}"),
            Selection::Duplicates(fingerprint) => format!("duplicates:{}", fingerprint.to_hex()),
            Selection::AllDuplicates => "duplicates".to_string(),
            Selection::SafeCaches => "caches".to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Show recorded history.
fn run_history(limit: usize, clear: bool, format: OutputFormat) -> Result<()> {
    let mut recorder = AnalysisRecorder::new(JsonLinesStore::open_default()?);

    if clear {
        recorder.clear()?;
        eprintln!("History cleared.");
        return Ok(());
    }

    let scans = recorder.scan_history(limit)?;
    let cleanings = recorder.cleaning_history(limit)?;
    let total_freed = recorder.total_freed()?;
    let trends = recorder.trends()?;

    match format {
        OutputFormat::Text => {
            println!();
            println!(" Scans:");
            if scans.is_empty() {
                println!("   none");
            }
            for scan in &scans {
                println!(
                    "   {}  {:>10}  {:>8} files  {}",
                    scan.timestamp.format("%Y-%m-%d %H:%M"),
                    format_size(scan.total_size),
                    scan.file_count,
                    scan.root_path.display()
                );
            }
            println!();
            println!(" Cleanings:");
            if cleanings.is_empty() {
                println!("   none");
            }
            for cleaning in &cleanings {
                println!(
                    "   {}  {:>10}  {:>6} files  {}",
                    cleaning.timestamp.format("%Y-%m-%d %H:%M"),
                    format_size(cleaning.bytes_freed),
                    cleaning.files_deleted,
                    cleaning.operation
                );
            }
            println!();
            println!(" Total freed: {}", format_size(total_freed));
            if !trends.is_empty() {
                println!();
                println!(" Daily trend:");
                for day in &trends {
                    println!("   {}  {:>10}", day.day, format_size(day.average_size));
                }
            }
            println!();
        }
        OutputFormat::Json => {
            let report = serde_json::json!({
                "scans": scans,
                "cleanings": cleanings,
                "total_freed": total_freed,
                "trends": trends,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Delete the given paths as the privileged helper.
fn run_helper_delete(paths: &[PathBuf]) -> Result<()> {
    if !is_superuser() {
        bail!("The helper must run with root privileges");
    }
    let response = serve_delete(paths);
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

/// Print a directory and its largest subdirectories.
fn print_node(node: &DirectoryNode, depth: u32, max_depth: u32, top_n: usize, root_size: u64) {
    let indent = "  ".repeat(depth as usize);
    let ratio = ratio(node.aggregate_size, root_size);

    let name = if depth == 0 {
        node.path.display().to_string()
    } else {
        format!("{}/", node.name)
    };

    println!(
        "{}▼ {:<40} {:>10} {:>5.1}% {}",
        indent,
        truncate(&name, 40),
        format_size(node.aggregate_size),
        ratio * 100.0,
        make_bar(ratio, 10)
    );

    if depth < max_depth {
        let mut children: Vec<_> = node.children.iter().collect();
        children.sort_by(|a, b| b.aggregate_size.cmp(&a.aggregate_size).then_with(|| a.path.cmp(&b.path)));
        let remaining = children.len().saturating_sub(top_n);

        for child in children.into_iter().take(top_n) {
            print_node(child, depth + 1, max_depth, top_n, root_size);
        }

        if remaining > 0 {
            let indent = "  ".repeat((depth + 1) as usize);
            println!("{}  ... and {} more", indent, remaining);
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64
    } else {
        0.0
    }
}

/// Create a simple ASCII bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to at most `max_chars` characters.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
