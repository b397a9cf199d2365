// Resumable depth-first walk over one drive's folder tree

use crate::checkpoint::{FolderCursor, FolderTask, WalkCheckpoint};
use crate::classify::classify_sharing;
use crate::error::{AuditError, Result};
use crate::model::{
    AccessEntry, Drive, Node, NodeKind, RecoveredError, SharingStatus, TraversalStats,
    entries_from_records,
};
use crate::roles::{RoleAggregate, RoleColumns, aggregate_by_role};
use drivescope_scanner::{ApiError, ChildRecord, DriveApi};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Called once for every emitted node, in emission order.
pub type WalkProgressCallback = Arc<dyn Fn(&Node) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub max_depth: u32,
    /// Pause before every permissions call.
    pub call_delay: Duration,
    pub company_domains: Vec<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            call_delay: Duration::from_millis(100),
            company_domains: Vec::new(),
        }
    }
}

/// How much one invocation may do before it suspends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub items: usize,
    pub time: Option<Duration>,
}

impl Budget {
    pub fn items(items: usize) -> Self {
        Self { items, time: None }
    }

    pub fn unbounded() -> Self {
        Self::items(usize::MAX)
    }

    pub fn with_time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }

    /// At least one node is always emitted before the budget counts as spent.
    fn exhausted(&self, emitted: usize, started: Instant) -> bool {
        if emitted >= self.items.max(1) {
            return true;
        }
        match self.time {
            Some(limit) => emitted > 0 && started.elapsed() >= limit,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Idle,
    PagingCurrentFolder,
    DrainingQueue,
    Suspended,
    Completed,
}

impl fmt::Display for WalkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WalkState::Idle => "idle",
            WalkState::PagingCurrentFolder => "paging-current-folder",
            WalkState::DrainingQueue => "draining-queue",
            WalkState::Suspended => "suspended",
            WalkState::Completed => "completed",
        };
        write!(f, "{}", name)
    }
}

/// Everything one invocation of the walk produced.
#[derive(Debug)]
pub struct WalkOutcome {
    pub nodes: Vec<Node>,
    /// Totals for the whole drive so far, not only this invocation.
    pub stats: TraversalStats,
    /// `Some` when the walk suspended and has more to do.
    pub checkpoint: Option<WalkCheckpoint>,
    pub state: WalkState,
    pub errors: Vec<RecoveredError>,
    /// Folders whose listing failed at some point during the walk.
    pub failed_folders: Vec<String>,
}

impl WalkOutcome {
    pub fn has_more(&self) -> bool {
        self.checkpoint.is_some()
    }

    pub fn is_fully_complete(&self) -> bool {
        !self.has_more() && self.failed_folders.is_empty()
    }
}

/// Permissions of one resource, as access entries.
pub async fn fetch_access_entries<A: DriveApi>(
    api: &A,
    resource_id: &str,
) -> std::result::Result<Vec<AccessEntry>, ApiError> {
    let records = api.list_permissions(resource_id).await?;
    Ok(entries_from_records(&records))
}

/// Walks a drive in bounded slices. It never persists anything: state goes in
/// and comes back out as a [`WalkCheckpoint`].
pub struct TreeWalker<'a, A: DriveApi> {
    api: &'a A,
    config: WalkerConfig,
    progress: Option<WalkProgressCallback>,
}

impl<'a, A: DriveApi> TreeWalker<'a, A> {
    pub fn new(api: &'a A, config: WalkerConfig) -> Self {
        Self {
            api,
            config,
            progress: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: WalkProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Run until the budget is spent or the drive is done.
    ///
    /// With no checkpoint the walk starts at the drive root and fetches the
    /// drive-level permissions once. With one, it continues exactly where the
    /// previous invocation stopped.
    pub async fn walk(
        &self,
        drive: &Drive,
        checkpoint: Option<WalkCheckpoint>,
        budget: Budget,
    ) -> Result<WalkOutcome> {
        let started = Instant::now();
        let mut errors = Vec::new();
        let mut state = WalkState::Idle;

        let mut walk = match checkpoint {
            Some(checkpoint) => {
                if checkpoint.drive_id != drive.id {
                    return Err(AuditError::CheckpointMismatch {
                        expected: drive.id.clone(),
                        found: checkpoint.drive_id,
                    });
                }
                info!(
                    "Resuming walk of {} ({} items written, {} folders pending)",
                    drive.name,
                    checkpoint.items_written,
                    checkpoint.pending.len()
                );
                checkpoint
            }
            None => {
                info!("Starting walk of {}", drive.name);
                let inherited = match self.permissions(&drive.id).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!("Drive-level permissions for {} unavailable: {}", drive.name, e);
                        errors.push(RecoveredError::new(
                            format!("drive permissions {}", drive.id),
                            e,
                        ));
                        Vec::new()
                    }
                };
                WalkCheckpoint::start(&drive.id, inherited)
            }
        };

        let upper = aggregate_by_role(&walk.inherited);
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let Some(mut cursor) = walk.current.take() else {
                transition(&mut state, WalkState::DrainingQueue);
                let Some(task) = walk.take_next() else {
                    transition(&mut state, WalkState::Completed);
                    break;
                };
                if task.depth > self.config.max_depth {
                    debug!("Pruned {} beyond depth {}", task.path, self.config.max_depth);
                    continue;
                }
                if walk.visited.contains(&task.id) {
                    debug!("Skipping already visited folder {}", task.id);
                    continue;
                }
                if budget.exhausted(nodes.len(), started) {
                    walk.requeue_front(task);
                    transition(&mut state, WalkState::Suspended);
                    break;
                }
                walk.visited.insert(task.id.clone());
                walk.current = Some(FolderCursor::new(task, &drive.id));
                continue;
            };

            transition(&mut state, WalkState::PagingCurrentFolder);

            if !cursor.buffered.is_empty() && budget.exhausted(nodes.len(), started) {
                walk.current = Some(cursor);
                transition(&mut state, WalkState::Suspended);
                break;
            }

            if let Some(record) = cursor.buffered.pop_front() {
                if record.is_folder() && walk.is_known_folder(&record.id) {
                    debug!("Folder {} reached twice, keeping first path", record.id);
                    walk.current = Some(cursor);
                    continue;
                }

                let node = self
                    .build_node(&cursor.folder, &record, &upper, &mut errors)
                    .await;

                if node.kind == NodeKind::Folder {
                    let depth = cursor.folder.depth + 1;
                    if depth <= self.config.max_depth {
                        walk.discover(
                            &mut cursor,
                            FolderTask {
                                id: node.id.clone(),
                                path: node.path.clone(),
                                depth,
                            },
                        );
                    } else {
                        debug!("Not descending into {} (max depth)", node.path);
                    }
                }

                walk.stats.record(&node);
                walk.items_written += 1;
                if let Some(ref callback) = self.progress {
                    callback(&node);
                }
                nodes.push(node);
                walk.current = Some(cursor);
                continue;
            }

            if cursor.pager.is_exhausted() {
                debug!(
                    "Finished {} ({} subfolders queued)",
                    cursor.folder.path,
                    cursor.discovered.len()
                );
                walk.finish_folder(cursor);
                continue;
            }

            if budget.exhausted(nodes.len(), started) {
                walk.current = Some(cursor);
                transition(&mut state, WalkState::Suspended);
                break;
            }

            match cursor.pager.next_page(self.api).await {
                Ok(Some(records)) => {
                    cursor.buffered.extend(records);
                    walk.current = Some(cursor);
                }
                Ok(None) => walk.current = Some(cursor),
                Err(e) => {
                    warn!("Listing {} failed, skipping its subtree: {}", cursor.folder.path, e);
                    errors.push(RecoveredError::new(
                        format!("list children {}", cursor.folder.path),
                        e,
                    ));
                    walk.abandon_folder(cursor);
                }
            }
        }

        let stats = walk.stats;
        let failed_folders = walk.failed_folders.clone();
        let checkpoint = match state {
            WalkState::Suspended => {
                info!(
                    "Suspending walk of {} after {} items ({} total)",
                    drive.name,
                    nodes.len(),
                    walk.items_written
                );
                Some(walk)
            }
            _ => {
                info!(
                    "Walk of {} complete: {} files, {} folders",
                    drive.name, stats.total_files, stats.total_folders
                );
                None
            }
        };

        Ok(WalkOutcome {
            nodes,
            stats,
            checkpoint,
            state,
            errors,
            failed_folders,
        })
    }

    async fn permissions(&self, resource_id: &str) -> std::result::Result<Vec<AccessEntry>, ApiError> {
        if !self.config.call_delay.is_zero() {
            tokio::time::sleep(self.config.call_delay).await;
        }
        fetch_access_entries(self.api, resource_id).await
    }

    async fn build_node(
        &self,
        folder: &FolderTask,
        record: &ChildRecord,
        upper: &RoleAggregate,
        errors: &mut Vec<RecoveredError>,
    ) -> Node {
        let kind = if record.is_folder() {
            NodeKind::Folder
        } else {
            NodeKind::File
        };
        let path = match kind {
            NodeKind::Folder => format!("{}{}/", folder.path, record.name),
            NodeKind::File => format!("{}{}", folder.path, record.name),
        };

        let (direct, sharing) = match self.permissions(&record.id).await {
            Ok(entries) => (
                aggregate_by_role(&entries),
                classify_sharing(&entries, &self.config.company_domains),
            ),
            Err(e) => {
                warn!("Permissions for {} unavailable: {}", path, e);
                errors.push(RecoveredError::new(format!("permissions {}", path), &e));
                (RoleAggregate::default(), SharingStatus::Error(e.to_string()))
            }
        };

        let roles = match kind {
            NodeKind::Folder => RoleColumns::for_folder(upper, &direct),
            NodeKind::File => RoleColumns::for_file(upper, &direct),
        };

        Node {
            id: record.id.clone(),
            parent_id: folder.id.clone(),
            path,
            depth: folder.depth,
            kind,
            name: record.name.clone(),
            creator: record.creator(),
            created_at: record.created_time.clone(),
            modified_at: record.modified_time.clone(),
            size_bytes: match kind {
                NodeKind::File => Some(record.size_bytes()),
                NodeKind::Folder => None,
            },
            roles,
            sharing,
            url: record.web_view_link.clone(),
        }
    }
}

fn transition(state: &mut WalkState, next: WalkState) {
    if *state != next {
        debug!("Walk state {} -> {}", state, next);
        *state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_always_allows_one_item() {
        let started = Instant::now();
        assert!(!Budget::items(0).exhausted(0, started));
        assert!(Budget::items(0).exhausted(1, started));
        assert!(!Budget::items(3).exhausted(2, started));
        assert!(Budget::items(3).exhausted(3, started));
    }

    #[test]
    fn test_zero_time_budget_needs_progress_first() {
        let started = Instant::now();
        let budget = Budget::unbounded().with_time(Duration::ZERO);
        assert!(!budget.exhausted(0, started));
        assert!(budget.exhausted(1, started));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(WalkState::PagingCurrentFolder.to_string(), "paging-current-folder");
        assert_eq!(WalkState::Completed.to_string(), "completed");
    }
}
