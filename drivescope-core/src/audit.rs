// The two operator phases: discover drives, then walk them one slice at a time

use crate::checkpoint::{CheckpointStore, WalkCheckpoint};
use crate::classify::classify_sharing;
use crate::config::Settings;
use crate::data::{Database, DriveEntry, WalkStatus};
use crate::error::{AuditError, Result};
use crate::model::{Drive, RecoveredError, SharingStatus, TraversalStats};
use crate::roles::{RoleColumns, aggregate_by_role};
use crate::sink::{FILES_HEADER, FILES_SHEET, ResultSink, node_row};
use crate::walker::{Budget, TreeWalker, WalkProgressCallback, WalkerConfig, fetch_access_entries};
use drivescope_scanner::{DriveApi, list_all_drives};
use tracing::{info, warn};

/// Options shared by both phases
#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub allowed_users: Vec<String>,
    pub walker: WalkerConfig,
    pub budget: Budget,
    /// Walk this drive instead of the next pending one.
    pub drive: Option<String>,
}

impl AuditOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            allowed_users: settings.allowed_users.clone(),
            walker: settings.walker_config(),
            budget: settings.budget(),
            drive: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub run_id: String,
    pub drives: usize,
    pub externally_shared: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkSummary {
    pub run_id: String,
    pub drive_id: String,
    pub drive_name: String,
    pub emitted: usize,
    pub rows_written: usize,
    /// Sheet row the first new row landed on.
    pub start_row: u64,
    pub has_more: bool,
    pub stats: TraversalStats,
    pub status: WalkStatus,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalkReport {
    Walked(WalkSummary),
    /// Every registered drive has been walked.
    AllComplete,
}

/// Fails closed unless the calling principal is on the allow-list.
pub async fn authorize<A: DriveApi>(api: &A, allowed_users: &[String]) -> Result<String> {
    let user = api.current_user().await?;
    let allowed = allowed_users
        .iter()
        .any(|allowed| allowed.trim().eq_ignore_ascii_case(user.trim()));
    if !allowed {
        warn!("Refusing to run for {}", user);
        return Err(AuditError::Unauthorized { user });
    }
    info!("Authorized as {}", user);
    Ok(user)
}

/// Register every drive with its drive-level sharing, and start a fresh
/// files sheet. Any walk in progress is abandoned. Nothing is replaced until
/// the drive listing has succeeded.
pub async fn discover_drives<A: DriveApi>(
    api: &A,
    db: &Database,
    options: &AuditOptions,
) -> Result<DiscoverySummary> {
    authorize(api, &options.allowed_users).await?;

    let run_id = db.start_run("discover", None)?;
    let records = match list_all_drives(api).await {
        Ok(records) => records,
        Err(e) => {
            db.finish_run(&run_id, None, 0, "failed")?;
            return Err(e.into());
        }
    };
    info!("Discovered {} shared drives", records.len());

    let mut entries = Vec::with_capacity(records.len());
    let mut recovered = Vec::new();
    let mut externally_shared = 0;
    for record in records {
        let drive = Drive::from(record);
        if !options.walker.call_delay.is_zero() {
            tokio::time::sleep(options.walker.call_delay).await;
        }

        let (sharing, roles) = match fetch_access_entries(api, &drive.id).await {
            Ok(entries) => (
                classify_sharing(&entries, &options.walker.company_domains),
                RoleColumns::for_drive(&aggregate_by_role(&entries)),
            ),
            Err(e) => {
                warn!("Drive-level permissions for {} unavailable: {}", drive.name, e);
                recovered.push(RecoveredError::new(
                    format!("drive permissions {}", drive.id),
                    &e,
                ));
                (SharingStatus::Error(e.to_string()), RoleColumns::default())
            }
        };
        if sharing.is_external() {
            externally_shared += 1;
        }

        entries.push(DriveEntry {
            id: drive.id,
            name: drive.name,
            created_at: drive.created_at,
            restrictions: drive.restrictions,
            sharing: sharing.to_string(),
            roles,
            status: WalkStatus::Pending,
            stats: TraversalStats::default(),
            last_walked: None,
        });
    }

    db.replace_inventory(FILES_SHEET, &FILES_HEADER, &entries, Some(&run_id), &recovered)
        .map_err(|e| AuditError::Setup(format!("cannot replace the drive inventory: {}", e)))?;

    let drives = db.list_drives()?.len();
    db.finish_run(&run_id, None, drives as u64, "complete")?;

    Ok(DiscoverySummary {
        run_id,
        drives,
        externally_shared,
        errors: recovered.len(),
    })
}

/// Walk one slice of one drive: the checkpointed drive if there is one,
/// otherwise the requested or next pending drive.
pub async fn walk_files<A: DriveApi>(
    api: &A,
    db: &Database,
    options: &AuditOptions,
    progress: Option<WalkProgressCallback>,
) -> Result<WalkReport> {
    authorize(api, &options.allowed_users).await?;

    if !db.has_sheet(FILES_SHEET)? {
        return Err(AuditError::Setup(format!(
            "the {} sheet does not exist; discover drives first",
            FILES_SHEET
        )));
    }

    let mut recovered = Vec::new();
    let mut restart_drive = None;
    let checkpoint = match db.load() {
        Ok(checkpoint) => checkpoint,
        Err(AuditError::CorruptCheckpoint { drive_id, reason }) => {
            warn!("Discarding unreadable checkpoint: {}", reason);
            recovered.push(RecoveredError::new("checkpoint", reason));
            db.clear()?;
            restart_drive = drive_id;
            None
        }
        Err(e) => return Err(e),
    };

    let (entry, checkpoint) = match select_drive(db, options, checkpoint, restart_drive)? {
        Some(selected) => selected,
        None => {
            info!("All drives have been walked");
            return Ok(WalkReport::AllComplete);
        }
    };

    let run_id = db.start_run("walk", Some(&entry.id))?;
    for error in &recovered {
        db.log_error(Some(&run_id), error)?;
    }

    let drive = entry.drive();
    let mut walker = TreeWalker::new(api, options.walker.clone());
    if let Some(callback) = progress {
        walker = walker.with_progress_callback(callback);
    }

    let outcome = match walker.walk(&drive, checkpoint, options.budget).await {
        Ok(outcome) => outcome,
        Err(e) => {
            db.finish_run(&run_id, Some(&drive.id), 0, "failed")?;
            return Err(e);
        }
    };

    // Rows go out before the checkpoint moves, so a crash in between only
    // repeats keys the sheet already has.
    let rows: Vec<_> = outcome.nodes.iter().map(|node| node_row(&drive, node)).collect();
    let appended = db.append_rows(FILES_SHEET, &rows)?;
    for error in &outcome.errors {
        db.log_error(Some(&run_id), error)?;
    }

    let status = match outcome.checkpoint {
        Some(ref checkpoint) => {
            db.save(&drive.id, checkpoint)?;
            WalkStatus::InProgress
        }
        None => {
            db.clear()?;
            if outcome.failed_folders.is_empty() {
                WalkStatus::Complete
            } else {
                WalkStatus::Incomplete
            }
        }
    };
    db.update_drive_progress(&drive.id, status, &outcome.stats)?;
    db.finish_run(&run_id, Some(&drive.id), outcome.nodes.len() as u64, status.as_str())?;

    Ok(WalkReport::Walked(WalkSummary {
        run_id,
        drive_id: drive.id,
        drive_name: drive.name,
        emitted: outcome.nodes.len(),
        rows_written: appended.written,
        start_row: appended.start_row,
        has_more: outcome.checkpoint.is_some(),
        stats: outcome.stats,
        status,
        errors: recovered.len() + outcome.errors.len(),
    }))
}

fn select_drive(
    db: &Database,
    options: &AuditOptions,
    checkpoint: Option<WalkCheckpoint>,
    restart_drive: Option<String>,
) -> Result<Option<(DriveEntry, Option<WalkCheckpoint>)>> {
    if let Some(checkpoint) = checkpoint {
        if let Some(ref requested) = options.drive
            && *requested != checkpoint.drive_id
        {
            return Err(AuditError::CheckpointBusy {
                live: checkpoint.drive_id,
                requested: requested.clone(),
            });
        }
        let entry = db.get_drive(&checkpoint.drive_id)?.ok_or_else(|| {
            AuditError::Setup(format!(
                "checkpointed drive {} is not registered",
                checkpoint.drive_id
            ))
        })?;
        return Ok(Some((entry, Some(checkpoint))));
    }

    if let Some(ref requested) = options.drive {
        let entry = db
            .get_drive(requested)?
            .ok_or_else(|| AuditError::Setup(format!("drive {} is not registered", requested)))?;
        return Ok(Some((entry, None)));
    }

    if let Some(id) = restart_drive
        && let Some(entry) = db.get_drive(&id)?
    {
        return Ok(Some((entry, None)));
    }

    Ok(db.next_unwalked_drive()?.map(|entry| (entry, None)))
}
