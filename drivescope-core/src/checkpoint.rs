// Serializable walk continuation and its single-slot store

use crate::data::Database;
use crate::error::{AuditError, Result};
use crate::model::{AccessEntry, TraversalStats};
use chrono::Utc;
use drivescope_scanner::{ChildPager, ChildRecord, PagePosition};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

const SLOT: &str = "current";

/// A folder waiting to be listed. `depth` is the depth its children get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderTask {
    pub id: String,
    pub path: String,
    pub depth: u32,
}

/// The one folder being paged right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderCursor {
    pub folder: FolderTask,
    pub pager: ChildPager,
    /// Records of the last fetched page not yet turned into nodes.
    pub buffered: VecDeque<ChildRecord>,
    /// Subfolders found so far, queued once this folder is exhausted.
    pub discovered: Vec<FolderTask>,
}

impl FolderCursor {
    pub fn new(folder: FolderTask, drive_id: &str) -> Self {
        let pager = ChildPager::new(folder.id.clone(), drive_id);
        Self {
            folder,
            pager,
            buffered: VecDeque::new(),
            discovered: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkCheckpoint {
    pub drive_id: String,
    pub current: Option<FolderCursor>,
    pub pending: VecDeque<FolderTask>,
    pub visited: BTreeSet<String>,
    /// Ids in `pending` or in the current folder's `discovered` list.
    #[serde(default)]
    pub queued: BTreeSet<String>,
    /// Drive-level entries, fetched once per walk.
    pub inherited: Vec<AccessEntry>,
    pub stats: TraversalStats,
    pub items_written: u64,
    #[serde(default)]
    pub failed_folders: Vec<String>,
}

impl WalkCheckpoint {
    /// State before anything has been listed: only the root is pending.
    pub fn start(drive_id: &str, inherited: Vec<AccessEntry>) -> Self {
        let mut checkpoint = Self {
            drive_id: drive_id.to_string(),
            current: None,
            pending: VecDeque::new(),
            visited: BTreeSet::new(),
            queued: BTreeSet::new(),
            inherited,
            stats: TraversalStats::default(),
            items_written: 0,
            failed_folders: Vec::new(),
        };
        checkpoint.enqueue(FolderTask {
            id: drive_id.to_string(),
            path: "/".to_string(),
            depth: 0,
        });
        checkpoint
    }

    pub fn enqueue(&mut self, task: FolderTask) {
        self.queued.insert(task.id.clone());
        self.pending.push_back(task);
    }

    /// Put a task taken with [`take_next`](Self::take_next) back at the head.
    pub fn requeue_front(&mut self, task: FolderTask) {
        self.queued.insert(task.id.clone());
        self.pending.push_front(task);
    }

    pub fn take_next(&mut self) -> Option<FolderTask> {
        let task = self.pending.pop_front()?;
        self.queued.remove(&task.id);
        Some(task)
    }

    /// Record a subfolder of the folder `cursor` is paging.
    pub fn discover(&mut self, cursor: &mut FolderCursor, task: FolderTask) {
        self.queued.insert(task.id.clone());
        cursor.discovered.push(task);
    }

    /// Queue an exhausted folder's subfolders ahead of everything else, in
    /// the order they were found.
    pub fn finish_folder(&mut self, cursor: FolderCursor) {
        for task in cursor.discovered.into_iter().rev() {
            self.pending.push_front(task);
        }
    }

    /// Drop a folder whose listing failed, together with what it discovered.
    pub fn abandon_folder(&mut self, cursor: FolderCursor) {
        for task in &cursor.discovered {
            self.queued.remove(&task.id);
        }
        self.failed_folders.push(cursor.folder.id);
    }

    pub fn current_folder_id(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.folder.id.as_str())
    }

    pub fn page_cursor(&self) -> Option<&PagePosition> {
        self.current.as_ref().map(|c| c.pager.position())
    }

    /// True when `id` is visited, waiting in the queue, or already found under
    /// the current folder. The folder being paged counts as visited.
    pub fn is_known_folder(&self, id: &str) -> bool {
        self.visited.contains(id) || self.queued.contains(id)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Durable home for at most one live checkpoint.
pub trait CheckpointStore {
    fn save(&self, drive_id: &str, checkpoint: &WalkCheckpoint) -> Result<()>;

    /// `CorruptCheckpoint` when a stored payload cannot be read back.
    fn load(&self) -> Result<Option<WalkCheckpoint>>;

    fn clear(&self) -> Result<()>;

    /// Drive owning the slot, read without parsing the payload.
    fn live_drive(&self) -> Result<Option<String>>;
}

impl CheckpointStore for Database {
    fn save(&self, drive_id: &str, checkpoint: &WalkCheckpoint) -> Result<()> {
        let payload = checkpoint.to_json()?;
        self.get_connection().execute(
            "INSERT INTO checkpoint (slot, drive_id, payload, saved_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(slot) DO UPDATE SET
                drive_id = excluded.drive_id,
                payload = excluded.payload,
                saved_at = excluded.saved_at",
            params![SLOT, drive_id, payload, Utc::now().timestamp()],
        )?;
        debug!(
            "Saved checkpoint for drive {} ({} bytes, {} folders pending)",
            drive_id,
            payload.len(),
            checkpoint.pending.len()
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<WalkCheckpoint>> {
        let row: Option<(String, String)> = self
            .get_connection()
            .query_row(
                "SELECT drive_id, payload FROM checkpoint WHERE slot = ?1",
                params![SLOT],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((drive_id, payload)) = row else {
            return Ok(None);
        };

        match WalkCheckpoint::from_json(&payload) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => Err(AuditError::CorruptCheckpoint {
                drive_id: Some(drive_id),
                reason: e.to_string(),
            }),
        }
    }

    fn clear(&self) -> Result<()> {
        self.get_connection()
            .execute("DELETE FROM checkpoint WHERE slot = ?1", params![SLOT])?;
        Ok(())
    }

    fn live_drive(&self) -> Result<Option<String>> {
        let drive_id = self
            .get_connection()
            .query_row(
                "SELECT drive_id FROM checkpoint WHERE slot = ?1",
                params![SLOT],
                |row| row.get(0),
            )
            .optional()?;
        Ok(drive_id)
    }
}
