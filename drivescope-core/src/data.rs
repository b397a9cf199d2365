use crate::model::{Drive, RecoveredError, TraversalStats};
use crate::roles::RoleColumns;
use crate::sink::reset_sheet;
use chrono::{DateTime, Utc};
use drivescope_scanner::DriveRestrictions;
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkStatus {
    Pending,
    InProgress,
    Complete,
    /// Walk finished but some folders could not be listed.
    Incomplete,
}

impl WalkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalkStatus::Pending => "pending",
            WalkStatus::InProgress => "in_progress",
            WalkStatus::Complete => "complete",
            WalkStatus::Incomplete => "incomplete",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, WalkStatus::Complete | WalkStatus::Incomplete)
    }
}

impl FromStr for WalkStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WalkStatus::Pending),
            "in_progress" => Ok(WalkStatus::InProgress),
            "complete" => Ok(WalkStatus::Complete),
            "incomplete" => Ok(WalkStatus::Incomplete),
            other => Err(format!("unknown walk status '{}'", other)),
        }
    }
}

/// One row of the drive registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveEntry {
    pub id: String,
    pub name: String,
    pub created_at: Option<String>,
    pub restrictions: DriveRestrictions,
    pub sharing: String,
    pub roles: RoleColumns,
    pub status: WalkStatus,
    pub stats: TraversalStats,
    pub last_walked: Option<i64>,
}

impl DriveEntry {
    pub fn drive(&self) -> Drive {
        Drive {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at.clone(),
            restrictions: self.restrictions.clone(),
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        let restrictions: String = row.get(3)?;
        let roles: String = row.get(5)?;
        let status: String = row.get(6)?;
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            restrictions: json_column(3, &restrictions)?,
            sharing: row.get(4)?,
            roles: json_column(5, &roles)?,
            status: status.parse().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(
                    6,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            stats: TraversalStats {
                total_files: row.get::<_, i64>(7)? as u64,
                total_folders: row.get::<_, i64>(8)? as u64,
                total_size_bytes: row.get::<_, i64>(9)? as u64,
                external_share_count: row.get::<_, i64>(10)? as u64,
            },
            last_walked: row.get(11)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorLogEntry {
    pub id: i64,
    pub run_id: Option<String>,
    pub context: String,
    pub message: String,
    pub logged_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub kind: String,
    pub outcome: String,
    pub items: u64,
    /// RFC 3339, UTC.
    pub finished_at: String,
}

fn json_column<T: serde::de::DeserializeOwned>(index: usize, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn to_json_column<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn upsert_drive_row(conn: &Connection, entry: &DriveEntry) -> Result<()> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM drives",
        [],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO drives (
            id, position, name, created_at, restrictions, sharing, roles, status,
            total_files, total_folders, total_size_bytes, external_share_count, last_walked
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            created_at = excluded.created_at,
            restrictions = excluded.restrictions,
            sharing = excluded.sharing,
            roles = excluded.roles,
            status = excluded.status,
            total_files = excluded.total_files,
            total_folders = excluded.total_folders,
            total_size_bytes = excluded.total_size_bytes,
            external_share_count = excluded.external_share_count,
            last_walked = excluded.last_walked",
        params![
            &entry.id,
            position,
            &entry.name,
            &entry.created_at,
            to_json_column(&entry.restrictions)?,
            &entry.sharing,
            to_json_column(&entry.roles)?,
            entry.status.as_str(),
            entry.stats.total_files as i64,
            entry.stats.total_folders as i64,
            entry.stats.total_size_bytes as i64,
            entry.stats.external_share_count as i64,
            entry.last_walked,
        ],
    )?;
    Ok(())
}

fn insert_error(conn: &Connection, run_id: Option<&str>, error: &RecoveredError) -> Result<i64> {
    conn.execute(
        "INSERT INTO error_log (run_id, context, message, logged_at) VALUES (?1, ?2, ?3, ?4)",
        params![run_id, &error.context, &error.message, error.at.to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

const DRIVE_COLUMNS: &str = "id, name, created_at, restrictions, sharing, roles, status,
    total_files, total_folders, total_size_bytes, external_share_count, last_walked";

impl Database {
    /// Remove the database file along with any WAL sidecars.
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)?;
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = path.as_os_str().to_owned();
            sidecar.push(suffix);
            let sidecar = Path::new(&sidecar);
            if sidecar.exists() {
                fs::remove_file(sidecar)?;
            }
        }
        Ok(())
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Single live walk continuation
            CREATE TABLE IF NOT EXISTS checkpoint (
    slot TEXT PRIMARY KEY,
    drive_id TEXT NOT NULL,
    payload TEXT NOT NULL,      -- JSON WalkCheckpoint
    saved_at INTEGER NOT NULL
);

-- Drive registry, filled by discovery
CREATE TABLE IF NOT EXISTS drives (
    id TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT,
    restrictions TEXT NOT NULL, -- JSON restriction flags
    sharing TEXT NOT NULL,
    roles TEXT NOT NULL,        -- JSON role columns
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK(status IN ('pending', 'in_progress', 'complete', 'incomplete')),
    total_files INTEGER NOT NULL DEFAULT 0,
    total_folders INTEGER NOT NULL DEFAULT 0,
    total_size_bytes INTEGER NOT NULL DEFAULT 0,
    external_share_count INTEGER NOT NULL DEFAULT 0,
    last_walked INTEGER
);

CREATE INDEX IF NOT EXISTS idx_drives_status ON drives(status, position);

-- Tabular result sink
CREATE TABLE IF NOT EXISTS sheets (
    name TEXT PRIMARY KEY,
    header TEXT NOT NULL,       -- JSON array of column names
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sheet_rows (
    sheet TEXT NOT NULL,
    row_number INTEGER NOT NULL,
    row_key TEXT NOT NULL,
    cells TEXT NOT NULL,        -- JSON array of cell values
    PRIMARY KEY(sheet, row_number),
    UNIQUE(sheet, row_key),
    FOREIGN KEY(sheet) REFERENCES sheets(name) ON DELETE CASCADE
);

-- Recovered errors, append-only
CREATE TABLE IF NOT EXISTS error_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT,
    context TEXT NOT NULL,
    message TEXT NOT NULL,
    logged_at TEXT NOT NULL
);

-- One row per invocation
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK(kind IN ('discover', 'walk')),
    drive_id TEXT,
    started_at INTEGER NOT NULL,
    finished_at INTEGER,
    items INTEGER NOT NULL DEFAULT 0,
    outcome TEXT
);
            ",
        )?;
        Ok(())
    }

    // Drive registry

    /// Register a discovered drive, resetting any earlier walk of it.
    pub fn upsert_drive(&self, entry: &DriveEntry) -> Result<()> {
        upsert_drive_row(&self.conn, entry)
    }

    /// Swap the whole inventory for a fresh discovery in one transaction:
    /// the sheet is recreated, the registry replaced, the checkpoint dropped
    /// and `errors` logged. On failure the previous inventory is untouched.
    pub fn replace_inventory(
        &self,
        sheet: &str,
        header: &[&str],
        drives: &[DriveEntry],
        run_id: Option<&str>,
        errors: &[RecoveredError],
    ) -> crate::error::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        reset_sheet(&tx, sheet, header)?;
        tx.execute("DELETE FROM drives", [])?;
        tx.execute("DELETE FROM checkpoint", [])?;
        for entry in drives {
            upsert_drive_row(&tx, entry)?;
        }
        for error in errors {
            insert_error(&tx, run_id, error)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Drives in discovery order.
    pub fn list_drives(&self) -> Result<Vec<DriveEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM drives ORDER BY position",
            DRIVE_COLUMNS
        ))?;

        let drives = stmt
            .query_map([], DriveEntry::from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(drives)
    }

    pub fn get_drive(&self, id: &str) -> Result<Option<DriveEntry>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM drives WHERE id = ?1", DRIVE_COLUMNS),
                params![id],
                DriveEntry::from_row,
            )
            .optional()
    }

    /// First drive not walked yet. An `in_progress` drive without a checkpoint
    /// lost its state and is walked again.
    pub fn next_unwalked_drive(&self) -> Result<Option<DriveEntry>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM drives WHERE status IN ('pending', 'in_progress')
                     ORDER BY position LIMIT 1",
                    DRIVE_COLUMNS
                ),
                [],
                DriveEntry::from_row,
            )
            .optional()
    }

    pub fn update_drive_progress(
        &self,
        id: &str,
        status: WalkStatus,
        stats: &TraversalStats,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE drives SET status = ?1, total_files = ?2, total_folders = ?3,
                total_size_bytes = ?4, external_share_count = ?5, last_walked = ?6
             WHERE id = ?7",
            params![
                status.as_str(),
                stats.total_files as i64,
                stats.total_folders as i64,
                stats.total_size_bytes as i64,
                stats.external_share_count as i64,
                current_timestamp(),
                id,
            ],
        )?;
        Ok(())
    }

    // Error log

    pub fn log_error(&self, run_id: Option<&str>, error: &RecoveredError) -> Result<i64> {
        insert_error(&self.conn, run_id, error)
    }

    pub fn list_errors(&self) -> Result<Vec<ErrorLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, context, message, logged_at FROM error_log ORDER BY id",
        )?;

        let errors = stmt
            .query_map([], |row| {
                Ok(ErrorLogEntry {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    context: row.get(2)?,
                    message: row.get(3)?,
                    logged_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(errors)
    }

    // Runs

    pub fn start_run(&self, kind: &str, drive_id: Option<&str>) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO runs (id, kind, drive_id, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![&run_id, kind, drive_id, current_timestamp()],
        )?;
        Ok(run_id)
    }

    pub fn finish_run(&self, run_id: &str, drive_id: Option<&str>, items: u64, outcome: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE runs SET finished_at = ?1, drive_id = COALESCE(?2, drive_id), items = ?3, outcome = ?4
             WHERE id = ?5",
            params![current_timestamp(), drive_id, items as i64, outcome, run_id],
        )?;
        Ok(())
    }

    /// Most recent finished run.
    pub fn last_run(&self) -> Result<Option<RunRecord>> {
        let row: Option<(String, String, i64, i64)> = self
            .conn
            .query_row(
                "SELECT kind, outcome, items, finished_at FROM runs
                 WHERE finished_at IS NOT NULL ORDER BY finished_at DESC, rowid DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        Ok(row.and_then(|(kind, outcome, items, at)| {
            DateTime::<Utc>::from_timestamp(at, 0).map(|finished_at| RunRecord {
                kind,
                outcome,
                items: items as u64,
                finished_at: finished_at.to_rfc3339(),
            })
        }))
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}
