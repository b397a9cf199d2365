// Status and export reports from the database

use crate::checkpoint::{CheckpointStore, WalkCheckpoint};
use crate::data::{Database, DriveEntry, RunRecord, WalkStatus};
use crate::error::{AuditError, Result};
use crate::model::TraversalStats;
use crate::sink::{FILES_SHEET, ResultSink};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointSummary {
    pub drive_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_folder: Option<String>,
    pub pending_folders: usize,
    pub visited_folders: usize,
    pub items_written: u64,
    /// The slot holds a payload that no longer parses.
    pub corrupt: bool,
}

impl CheckpointSummary {
    pub fn from_checkpoint(checkpoint: &WalkCheckpoint) -> Self {
        Self {
            drive_id: checkpoint.drive_id.clone(),
            current_folder: checkpoint.current.as_ref().map(|c| c.folder.path.clone()),
            pending_folders: checkpoint.pending.len(),
            visited_folders: checkpoint.visited.len(),
            items_written: checkpoint.items_written,
            corrupt: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub drives: Vec<DriveEntry>,
    pub totals: TraversalStats,
    pub complete: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointSummary>,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunRecord>,
}

pub fn checkpoint_summary(db: &Database) -> Result<Option<CheckpointSummary>> {
    match db.load() {
        Ok(checkpoint) => Ok(checkpoint.as_ref().map(CheckpointSummary::from_checkpoint)),
        Err(AuditError::CorruptCheckpoint { drive_id, .. }) => Ok(Some(CheckpointSummary {
            drive_id: drive_id.unwrap_or_default(),
            current_folder: None,
            pending_folders: 0,
            visited_folders: 0,
            items_written: 0,
            corrupt: true,
        })),
        Err(e) => Err(e),
    }
}

pub fn gather_status(db: &Database) -> Result<StatusReport> {
    let drives = db.list_drives()?;
    let mut totals = TraversalStats::default();
    for drive in &drives {
        totals.total_files += drive.stats.total_files;
        totals.total_folders += drive.stats.total_folders;
        totals.total_size_bytes += drive.stats.total_size_bytes;
        totals.external_share_count += drive.stats.external_share_count;
    }
    let complete = drives.iter().filter(|d| d.status.is_finished()).count();

    Ok(StatusReport {
        totals,
        complete,
        checkpoint: checkpoint_summary(db)?,
        error_count: db.list_errors()?.len(),
        last_run: db.last_run()?,
        drives,
    })
}

pub fn status_label(status: WalkStatus) -> ColoredString {
    match status {
        WalkStatus::Pending => status.as_str().dimmed(),
        WalkStatus::InProgress => status.as_str().yellow().bold(),
        WalkStatus::Complete => status.as_str().green().bold(),
        WalkStatus::Incomplete => status.as_str().red().bold(),
    }
}

pub fn generate_status_text(report: &StatusReport) -> String {
    let rule = "━".repeat(72);
    let mut text = String::new();

    text.push_str(&format!("{}\n", rule.bright_blue()));
    text.push_str(&format!("{}\n", "  DRIVESCOPE STATUS".bright_white().bold()));
    text.push_str(&format!("{}\n\n", rule.bright_blue()));

    if report.drives.is_empty() {
        text.push_str("No drives registered. Run `drivescope discover` first.\n");
        return text;
    }

    for drive in &report.drives {
        text.push_str(&format!(
            "{} {} [{}]\n",
            "•".blue(),
            drive.name.bright_white().bold(),
            status_label(drive.status)
        ));
        text.push_str(&format!("    Sharing:      {}\n", drive.sharing));
        text.push_str(&format!(
            "    Contents:     {} files, {} folders, {} bytes\n",
            drive.stats.total_files, drive.stats.total_folders, drive.stats.total_size_bytes
        ));
        if drive.stats.external_share_count > 0 {
            text.push_str(&format!(
                "    External:     {}\n",
                drive.stats.external_share_count.to_string().red().bold()
            ));
        }
        let flags = drive.restrictions.enabled_flags();
        if !flags.is_empty() {
            text.push_str(&format!("    Restrictions: {}\n", flags.join(", ")));
        }
    }
    text.push('\n');

    text.push_str(&format!(
        "Drives walked: {}/{}\n",
        report.complete,
        report.drives.len()
    ));
    text.push_str(&format!(
        "Totals:        {} files, {} folders, {} bytes, {} externally shared\n",
        report.totals.total_files,
        report.totals.total_folders,
        report.totals.total_size_bytes,
        report.totals.external_share_count
    ));
    if let Some(ref checkpoint) = report.checkpoint {
        if checkpoint.corrupt {
            text.push_str(&format!(
                "Checkpoint:    {} (unreadable, will restart)\n",
                checkpoint.drive_id.red()
            ));
        } else {
            text.push_str(&format!(
                "Checkpoint:    {} ({} items written, {} folders pending)\n",
                checkpoint.drive_id.yellow(),
                checkpoint.items_written,
                checkpoint.pending_folders
            ));
        }
    }
    if report.error_count > 0 {
        text.push_str(&format!(
            "Errors logged: {}\n",
            report.error_count.to_string().red()
        ));
    }
    if let Some(ref run) = report.last_run {
        text.push_str(&format!(
            "Last run:      {} {} at {} ({} items)\n",
            run.kind, run.outcome, run.finished_at, run.items
        ));
    }

    text
}

pub fn generate_status_json(report: &StatusReport) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "status": {
            "metadata": {
                "generator": "Drivescope",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
            },
            "drives": report.drives,
            "summary": {
                "drives": report.drives.len(),
                "complete": report.complete,
                "totals": report.totals,
                "errors": report.error_count,
            },
            "checkpoint": report.checkpoint,
            "last_run": report.last_run,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// Write the files sheet as CSV, header first. Returns the data row count.
pub fn export_csv<W: Write>(db: &Database, writer: W) -> Result<usize> {
    let table = db.read_sheet(FILES_SHEET)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in &table {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(table.len().saturating_sub(1))
}

/// The files sheet as a JSON array with one object per row, keyed by header.
pub fn export_json(db: &Database) -> Result<String> {
    let table = db.read_sheet(FILES_SHEET)?;
    let Some((header, rows)) = table.split_first() else {
        return Ok("[]".to_string());
    };

    let records: Vec<serde_json::Map<String, serde_json::Value>> = rows
        .iter()
        .map(|row| {
            header
                .iter()
                .zip(row)
                .map(|(column, cell)| (column.clone(), serde_json::Value::String(cell.clone())))
                .collect()
        })
        .collect();

    Ok(serde_json::to_string_pretty(&records)?)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
