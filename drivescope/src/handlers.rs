use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use drivescope_core::audit::{
    AuditOptions, DiscoverySummary, WalkReport, WalkSummary, discover_drives, walk_files,
};
use drivescope_core::checkpoint::CheckpointStore;
use drivescope_core::config::{
    CONFIG_FILE_NAME, DATABASE_FILE_NAME, Settings, default_config_path, expand_path,
};
use drivescope_core::data::{Database, WalkStatus};
use drivescope_core::model::Node;
use drivescope_core::report::{
    ReportFormat, checkpoint_summary, export_csv, export_json, gather_status,
    generate_status_json, generate_status_text, save_report,
};
use drivescope_core::walker::WalkProgressCallback;
use drivescope_scanner::HttpDriveClient;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    spinner
}

// ============================================================================
// Settings and collaborators
// ============================================================================

pub fn config_path(args: &ArgMatches) -> PathBuf {
    args.get_one::<String>("config")
        .map(|path| expand_path(path))
        .unwrap_or_else(default_config_path)
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        bail!(
            "no settings file at {}; run `drivescope init` first",
            path.display()
        );
    }
    Ok(Settings::load(path)?)
}

/// Walk flags override the settings file for this invocation only.
pub fn apply_walk_overrides(settings: &mut Settings, args: &ArgMatches) {
    if let Some(budget) = args.get_one::<usize>("budget") {
        settings.item_budget = *budget;
    }
    if let Some(depth) = args.get_one::<u32>("max-depth") {
        settings.max_depth = *depth;
    }
    if let Some(secs) = args.get_one::<u64>("time-budget") {
        settings.time_budget_secs = Some(*secs);
    }
}

pub fn walk_options(settings: &Settings, args: &ArgMatches) -> AuditOptions {
    let mut options = AuditOptions::from_settings(settings);
    options.drive = args.get_one::<String>("drive").cloned();
    options
}

pub fn open_database(settings: &Settings) -> Result<Database> {
    let path = settings.database_path();
    if !Database::exists(&path) {
        bail!(
            "no database at {}; run `drivescope init` first",
            path.display()
        );
    }
    Database::new(&path).with_context(|| format!("cannot open database {}", path.display()))
}

pub fn build_client(settings: &Settings) -> Result<HttpDriveClient> {
    let token = std::env::var(&settings.token_env).with_context(|| {
        format!(
            "set {} to a bearer token for the drive API",
            settings.token_env
        )
    })?;
    if token.trim().is_empty() {
        bail!("{} is empty", settings.token_env);
    }
    Ok(HttpDriveClient::new(
        &settings.api_base_url,
        token.trim(),
        settings.request_timeout_secs,
    )?)
}

// ============================================================================
// init
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub config_path: PathBuf,
    pub database_path: PathBuf,
    pub config_written: bool,
    pub database_reset: bool,
}

/// Create the config directory, a default settings file and the database.
/// Existing files are kept unless `overwrite` is set.
pub fn init_workspace(config_dir: &Path, overwrite: bool) -> Result<InitReport> {
    fs::create_dir_all(config_dir)
        .with_context(|| format!("cannot create {}", config_dir.display()))?;

    let config_path = config_dir.join(CONFIG_FILE_NAME);
    let database_path = config_dir.join(DATABASE_FILE_NAME);

    let config_written = overwrite || !config_path.exists();
    if config_written {
        let settings = Settings {
            database: database_path.display().to_string(),
            ..Settings::default()
        };
        settings.save(&config_path)?;
    }

    let database_reset = overwrite && Database::exists(&database_path);
    if database_reset {
        Database::drop(&database_path)
            .with_context(|| format!("cannot remove {}", database_path.display()))?;
    }
    Database::new(&database_path)?;

    Ok(InitReport {
        config_path,
        database_path,
        config_written,
        database_reset,
    })
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  DRIVESCOPE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let dir = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or("~/.config/drivescope/");
    let config_dir = expand_path(dir);
    let mut overwrite = args.get_flag("force");

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    let existing = config_dir.join(DATABASE_FILE_NAME);
    if Database::exists(&existing) && !overwrite {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("A drivescope database already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            existing.display().to_string().bright_white()
        );
        println!();
        println!(
            "{}",
            "Overwriting discards the registry, the files sheet and any walk in progress."
                .yellow()
        );

        let response = print_prompt("Overwrite it? [y/N]:")?;
        println!();
        overwrite = response == "y" || response == "yes";
        if !overwrite {
            println!("{} Keeping existing files", "→".blue());
            println!();
        }
    }

    let report = init_workspace(&config_dir, overwrite)?;

    if report.database_reset {
        println!("{} Existing database removed", "✓".green().bold());
    }
    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Settings: {}{}",
        "✓".green().bold(),
        report.config_path.display().to_string().bright_white(),
        if report.config_written { "" } else { " (kept)" }
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        report.database_path.display().to_string().bright_white()
    );
    println!();
    println!(
        "{} Add your company domains and allowed users to the settings file, then run `drivescope discover`.",
        "ℹ".blue()
    );
    Ok(())
}

// ============================================================================
// discover / walk
// ============================================================================

pub fn format_discovery(summary: &DiscoverySummary) -> String {
    let mut text = format!(
        "{} Registered {} shared drives",
        "✓".green().bold(),
        summary.drives.to_string().bright_white()
    );
    if summary.externally_shared > 0 {
        text.push_str(&format!(
            "\n{} {} shared outside the company at drive level",
            "⚠".yellow().bold(),
            summary.externally_shared.to_string().red().bold()
        ));
    }
    if summary.errors > 0 {
        text.push_str(&format!(
            "\n{} {} errors recovered (see `drivescope status`)",
            "⚠".yellow(),
            summary.errors
        ));
    }
    text
}

pub async fn handle_discover(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(&config_path(args))?;
    let db = open_database(&settings)?;
    let client = build_client(&settings)?;
    let options = AuditOptions::from_settings(&settings);

    let progress = spinner("Discovering shared drives...");
    let result = discover_drives(&client, &db, &options).await;
    progress.finish_and_clear();

    println!("{}", format_discovery(&result?));
    Ok(())
}

pub fn format_walk(summary: &WalkSummary) -> String {
    let mut text = format!(
        "{} {}: {} items walked, {} rows written",
        "✓".green().bold(),
        summary.drive_name.bright_white().bold(),
        summary.emitted,
        summary.rows_written
    );
    if summary.rows_written > 0 {
        text.push_str(&format!(
            " (rows {}-{})",
            summary.start_row,
            summary.start_row + summary.rows_written as u64 - 1
        ));
    }
    text.push_str(&format!(
        "\n  {} files, {} folders, {} bytes so far",
        summary.stats.total_files, summary.stats.total_folders, summary.stats.total_size_bytes
    ));
    if summary.stats.external_share_count > 0 {
        text.push_str(&format!(
            ", {} shared externally",
            summary.stats.external_share_count.to_string().red().bold()
        ));
    }
    if summary.errors > 0 {
        text.push_str(&format!("\n  {} {} errors recovered", "⚠".yellow(), summary.errors));
    }
    let next = match summary.status {
        WalkStatus::InProgress => format!("{} More remains; run `drivescope walk` again", "→".blue()),
        WalkStatus::Incomplete => format!(
            "{} Drive finished with unreadable folders",
            "⚠".yellow().bold()
        ),
        _ => format!("{} Drive complete", "✓".green().bold()),
    };
    text.push_str(&format!("\n{}", next));
    text
}

fn walk_progress(bar: &ProgressBar) -> WalkProgressCallback {
    let bar = bar.clone();
    Arc::new(move |node: &Node| {
        bar.inc(1);
        bar.set_message(format!("{} items  {}", bar.position(), node.path));
    })
}

pub async fn handle_walk(args: &ArgMatches) -> Result<()> {
    let mut settings = load_settings(&config_path(args))?;
    apply_walk_overrides(&mut settings, args);
    settings.validate()?;
    let db = open_database(&settings)?;
    let client = build_client(&settings)?;
    let options = walk_options(&settings, args);
    let keep_going = args.get_flag("all");

    loop {
        let bar = spinner("Walking...");
        let result = walk_files(&client, &db, &options, Some(walk_progress(&bar))).await;
        bar.finish_and_clear();

        match result? {
            WalkReport::Walked(summary) => {
                println!("{}", format_walk(&summary));
                if !keep_going {
                    break;
                }
            }
            WalkReport::AllComplete => {
                println!("{} Every registered drive has been walked", "✓".green().bold());
                break;
            }
        }
    }
    Ok(())
}

// ============================================================================
// status / export / checkpoint
// ============================================================================

/// The `--format` value, or `default` when it was not given.
pub fn report_format(args: &ArgMatches, default: ReportFormat) -> Result<ReportFormat> {
    match args.get_one::<String>("format") {
        Some(value) => ReportFormat::from_str(value)
            .with_context(|| format!("unknown report format '{}'", value)),
        None => Ok(default),
    }
}

pub fn handle_status(args: &ArgMatches) -> Result<()> {
    let format = report_format(args, ReportFormat::Text)?;
    let settings = load_settings(&config_path(args))?;
    let db = open_database(&settings)?;
    let report = gather_status(&db)?;

    let content = match format {
        ReportFormat::Json => generate_status_json(&report)?,
        ReportFormat::Text => generate_status_text(&report),
        ReportFormat::Csv => bail!("status reports are text or json"),
    };

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            save_report(&content, path)
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

pub fn handle_export(args: &ArgMatches) -> Result<()> {
    let format = report_format(args, ReportFormat::Csv)?;
    if format == ReportFormat::Text {
        bail!("exports are csv or json");
    }
    let settings = load_settings(&config_path(args))?;
    let db = open_database(&settings)?;

    match (format, args.get_one::<PathBuf>("output")) {
        (ReportFormat::Json, Some(path)) => {
            save_report(&export_json(&db)?, path)
                .with_context(|| format!("cannot write {}", path.display()))?;
            eprintln!("{} Exported to {}", "✓".green().bold(), path.display());
        }
        (ReportFormat::Json, None) => println!("{}", export_json(&db)?),
        (_, Some(path)) => {
            let file =
                File::create(path).with_context(|| format!("cannot write {}", path.display()))?;
            let rows = export_csv(&db, file)?;
            eprintln!(
                "{} Exported {} rows to {}",
                "✓".green().bold(),
                rows,
                path.display()
            );
        }
        (_, None) => {
            export_csv(&db, io::stdout().lock())?;
        }
    }
    Ok(())
}

pub fn handle_checkpoint_show(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(&config_path(args))?;
    let db = open_database(&settings)?;

    let Some(summary) = checkpoint_summary(&db)? else {
        println!("{} No walk in progress", "→".blue());
        return Ok(());
    };

    if summary.corrupt {
        println!(
            "{} Checkpoint for {} is unreadable; the drive restarts on the next walk",
            "⚠".yellow().bold(),
            summary.drive_id.bright_white()
        );
        return Ok(());
    }
    println!(
        "{} Walk in progress: {}",
        "→".blue(),
        summary.drive_id.bright_white().bold()
    );
    if let Some(folder) = summary.current_folder {
        println!("  Current folder:  {}", folder);
    }
    println!("  Pending folders: {}", summary.pending_folders);
    println!("  Visited folders: {}", summary.visited_folders);
    println!("  Items written:   {}", summary.items_written);
    Ok(())
}

pub fn handle_checkpoint_clear(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(&config_path(args))?;
    let db = open_database(&settings)?;

    match db.live_drive()? {
        Some(drive) => {
            db.clear()?;
            println!(
                "{} Checkpoint for {} cleared",
                "✓".green().bold(),
                drive.bright_white()
            );
        }
        None => println!("{} No checkpoint to clear", "→".blue()),
    }
    Ok(())
}
