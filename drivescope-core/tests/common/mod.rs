// In-memory drive used by the integration tests
#![allow(dead_code)]

use drivescope_core::data::Database;
use drivescope_core::model::Drive;
use drivescope_core::walker::WalkerConfig;
use drivescope_scanner::records::FOLDER_MIME_TYPE;
use drivescope_scanner::{
    ApiError, ChildRecord, DriveApi, DriveRecord, DriveRestrictions, Page, PermissionRecord,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub const COMPANY_DOMAIN: &str = "acme.co.jp";

pub struct FakeDrive {
    user: String,
    drives: Vec<DriveRecord>,
    children: HashMap<String, Vec<ChildRecord>>,
    permissions: HashMap<String, Vec<PermissionRecord>>,
    page_size: usize,
    failing_permissions: HashSet<String>,
    failing_listings: HashSet<String>,
    failing_drive_listing: AtomicBool,
    pub children_requests: Mutex<Vec<(String, Option<String>)>>,
    pub permission_requests: Mutex<Vec<String>>,
}

impl FakeDrive {
    /// One drive whose root folder id is the drive id.
    pub fn new(drive_id: &str, name: &str) -> Self {
        let mut fake = Self {
            user: format!("admin@{}", COMPANY_DOMAIN),
            drives: Vec::new(),
            children: HashMap::new(),
            permissions: HashMap::new(),
            page_size: 100,
            failing_permissions: HashSet::new(),
            failing_listings: HashSet::new(),
            failing_drive_listing: AtomicBool::new(false),
            children_requests: Mutex::new(Vec::new()),
            permission_requests: Mutex::new(Vec::new()),
        };
        fake.add_drive(drive_id, name);
        fake
    }

    pub fn add_drive(&mut self, drive_id: &str, name: &str) {
        self.drives.push(DriveRecord {
            id: drive_id.to_string(),
            name: name.to_string(),
            created_time: Some("2024-01-01T00:00:00.000Z".to_string()),
            restrictions: DriveRestrictions::default(),
        });
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn add_folder(&mut self, parent: &str, id: &str, name: &str) {
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(record(id, name, FOLDER_MIME_TYPE, None));
    }

    pub fn add_file(&mut self, parent: &str, id: &str, name: &str, size: u64) {
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(record(id, name, "text/plain", Some(size)));
    }

    pub fn grant(&mut self, resource_id: &str, permission: PermissionRecord) {
        self.permissions
            .entry(resource_id.to_string())
            .or_default()
            .push(permission);
    }

    pub fn fail_permissions(&mut self, resource_id: &str) {
        self.failing_permissions.insert(resource_id.to_string());
    }

    pub fn fail_listing(&mut self, folder_id: &str) {
        self.failing_listings.insert(folder_id.to_string());
    }

    /// Toggle failure of the drive listing on a shared fake.
    pub fn fail_drive_listing(&self, fails: bool) {
        self.failing_drive_listing.store(fails, Ordering::SeqCst);
    }

    pub fn drive(&self) -> Drive {
        Drive::from(self.drives[0].clone())
    }

    pub fn children_request_count(&self) -> usize {
        self.children_requests.lock().unwrap().len()
    }
}

impl DriveApi for FakeDrive {
    async fn current_user(&self) -> Result<String, ApiError> {
        Ok(self.user.clone())
    }

    async fn list_drives(&self, page_token: Option<&str>) -> Result<Page<DriveRecord>, ApiError> {
        if self.failing_drive_listing.load(Ordering::SeqCst) {
            return Err(ApiError::StatusError {
                status: 503,
                body: "drive listing unavailable".to_string(),
            });
        }
        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(self.drives.len());
        let items = self.drives[start..end].to_vec();
        if end < self.drives.len() {
            Ok(Page::with_next(items, end.to_string()))
        } else {
            Ok(Page::last(items))
        }
    }

    async fn list_children(
        &self,
        folder_id: &str,
        _drive_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<ChildRecord>, ApiError> {
        self.children_requests
            .lock()
            .unwrap()
            .push((folder_id.to_string(), page_token.map(str::to_string)));

        if self.failing_listings.contains(folder_id) {
            return Err(ApiError::StatusError {
                status: 500,
                body: format!("backend error listing {}", folder_id),
            });
        }

        let all = self.children.get(folder_id).cloned().unwrap_or_default();
        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(all.len());
        let items = all[start..end].to_vec();
        if end < all.len() {
            Ok(Page::with_next(items, end.to_string()))
        } else {
            Ok(Page::last(items))
        }
    }

    async fn list_permissions(&self, resource_id: &str) -> Result<Vec<PermissionRecord>, ApiError> {
        self.permission_requests
            .lock()
            .unwrap()
            .push(resource_id.to_string());

        if self.failing_permissions.contains(resource_id) {
            return Err(ApiError::StatusError {
                status: 403,
                body: "insufficient permissions".to_string(),
            });
        }
        Ok(self.permissions.get(resource_id).cloned().unwrap_or_default())
    }
}

fn record(id: &str, name: &str, mime_type: &str, size: Option<u64>) -> ChildRecord {
    ChildRecord {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        size,
        created_time: Some("2024-02-01T00:00:00.000Z".to_string()),
        modified_time: Some("2024-03-01T00:00:00.000Z".to_string()),
        web_view_link: Some(format!("https://drive.example/{}", id)),
        owners: Vec::new(),
        last_modifying_user: None,
    }
}

pub fn user_permission(email: &str, role: &str) -> PermissionRecord {
    PermissionRecord {
        kind: "user".to_string(),
        role: role.to_string(),
        email_address: Some(email.to_string()),
        domain: None,
        display_name: None,
    }
}

pub fn domain_permission(domain: &str, role: &str) -> PermissionRecord {
    PermissionRecord {
        kind: "domain".to_string(),
        role: role.to_string(),
        email_address: None,
        domain: Some(domain.to_string()),
        display_name: None,
    }
}

pub fn anyone_permission(role: &str) -> PermissionRecord {
    PermissionRecord {
        kind: "anyone".to_string(),
        role: role.to_string(),
        email_address: None,
        domain: None,
        display_name: None,
    }
}

/// Every folder holds `folders` subfolders and `files` files, down to
/// `depth` levels below the root.
pub fn synthetic_tree(drive_id: &str, depth: u32, folders: usize, files: usize) -> FakeDrive {
    let mut fake = FakeDrive::new(drive_id, "Synthetic");
    fill(&mut fake, drive_id, "n", depth, folders, files);
    fake
}

fn fill(fake: &mut FakeDrive, parent: &str, prefix: &str, depth: u32, folders: usize, files: usize) {
    for f in 0..files {
        fake.add_file(parent, &format!("{}-file{}", prefix, f), &format!("file{}.txt", f), 100);
    }
    if depth == 0 {
        return;
    }
    for d in 0..folders {
        let id = format!("{}-dir{}", prefix, d);
        fake.add_folder(parent, &id, &format!("dir{}", d));
        fill(fake, &id, &id, depth - 1, folders, files);
    }
}

/// `levels` folders nested in a line, each level also holding one file.
/// Folder `L{i}` sits at level i and file `f{k}` one level below folder `L{k}`.
pub fn chain(drive_id: &str, levels: usize) -> FakeDrive {
    let mut fake = FakeDrive::new(drive_id, "Chain");
    let mut parent = drive_id.to_string();
    for level in 1..=levels {
        fake.add_file(&parent, &format!("f{}", level - 1), &format!("f{}.txt", level - 1), 10);
        let folder = format!("L{}", level);
        fake.add_folder(&parent, &folder, &folder);
        parent = folder;
    }
    fake
}

pub fn walker_config() -> WalkerConfig {
    WalkerConfig {
        max_depth: 10,
        call_delay: Duration::ZERO,
        company_domains: vec![COMPANY_DOMAIN.to_string()],
    }
}

pub fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}
