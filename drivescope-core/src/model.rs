use crate::roles::RoleColumns;
use chrono::{DateTime, Utc};
use drivescope_scanner::{DriveRecord, DriveRestrictions, PermissionRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A shared drive as discovered at the start of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drive {
    pub id: String,
    pub name: String,
    pub created_at: Option<String>,
    pub restrictions: DriveRestrictions,
}

impl From<DriveRecord> for Drive {
    fn from(record: DriveRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            created_at: record.created_time,
            restrictions: record.restrictions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Folder,
    File,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Folder => "folder",
            NodeKind::File => "file",
        }
    }
}

/// A folder or file emitted by the tree walk. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub parent_id: String,
    pub path: String,
    pub depth: u32,
    pub kind: NodeKind,
    pub name: String,
    pub creator: Option<String>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    /// Files only.
    pub size_bytes: Option<u64>,
    pub roles: RoleColumns,
    pub sharing: SharingStatus,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User,
    Domain,
    Anyone,
}

impl PrincipalType {
    /// Groups are addressed by email and classified like users.
    pub fn from_api(kind: &str) -> Option<Self> {
        match kind {
            "user" | "group" => Some(PrincipalType::User),
            "domain" => Some(PrincipalType::Domain),
            "anyone" => Some(PrincipalType::Anyone),
            _ => None,
        }
    }
}

/// Access-control role tiers, from full control down to read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Organizer,
    FileOrganizer,
    Writer,
    Commenter,
    Reader,
}

impl Role {
    pub fn from_api(role: &str) -> Option<Self> {
        match role {
            "organizer" => Some(Role::Organizer),
            "fileOrganizer" => Some(Role::FileOrganizer),
            "writer" => Some(Role::Writer),
            "commenter" => Some(Role::Commenter),
            "reader" => Some(Role::Reader),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub principal: PrincipalType,
    pub role: Option<Role>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub domain: Option<String>,
}

impl AccessEntry {
    pub fn user(email: &str, role: Role) -> Self {
        Self {
            principal: PrincipalType::User,
            role: Some(role),
            email: Some(email.to_string()),
            display_name: None,
            domain: None,
        }
    }

    pub fn domain(domain: &str, role: Role) -> Self {
        Self {
            principal: PrincipalType::Domain,
            role: Some(role),
            email: None,
            display_name: None,
            domain: Some(domain.to_string()),
        }
    }

    pub fn anyone(role: Role) -> Self {
        Self {
            principal: PrincipalType::Anyone,
            role: Some(role),
            email: None,
            display_name: None,
            domain: None,
        }
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }

    /// `None` for principal types this audit does not know about.
    pub fn from_record(record: &PermissionRecord) -> Option<Self> {
        let principal = PrincipalType::from_api(&record.kind)?;
        Some(Self {
            principal,
            role: Role::from_api(&record.role),
            email: non_blank(record.email_address.as_deref()),
            display_name: non_blank(record.display_name.as_deref()),
            domain: non_blank(record.domain.as_deref()),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn entries_from_records(records: &[PermissionRecord]) -> Vec<AccessEntry> {
    records.iter().filter_map(AccessEntry::from_record).collect()
}

/// Outcome of classifying one resource's access entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum SharingStatus {
    None,
    Shared {
        internal_domain: bool,
        external: usize,
    },
    /// Permissions could not be fetched; neither internal nor external.
    Error(String),
}

impl SharingStatus {
    pub fn is_external(&self) -> bool {
        matches!(self, SharingStatus::Shared { external, .. } if *external > 0)
    }
}

impl fmt::Display for SharingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharingStatus::None => write!(f, "none"),
            SharingStatus::Error(message) => write!(f, "error: {}", message),
            SharingStatus::Shared {
                internal_domain,
                external,
            } => {
                let mut parts = Vec::new();
                if *internal_domain {
                    parts.push("internal-domain-share".to_string());
                }
                if *external > 0 {
                    parts.push(format!("external-share({})", external));
                }
                if parts.is_empty() {
                    write!(f, "none")
                } else {
                    write!(f, "{}", parts.join(", "))
                }
            }
        }
    }
}

impl From<SharingStatus> for String {
    fn from(status: SharingStatus) -> Self {
        status.to_string()
    }
}

/// Per-drive totals, accumulated across resumed invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalStats {
    pub total_files: u64,
    pub total_folders: u64,
    pub total_size_bytes: u64,
    pub external_share_count: u64,
}

impl TraversalStats {
    pub fn record(&mut self, node: &Node) {
        match node.kind {
            NodeKind::Folder => self.total_folders += 1,
            NodeKind::File => {
                self.total_files += 1;
                self.total_size_bytes += node.size_bytes.unwrap_or(0);
            }
        }
        if node.sharing.is_external() {
            self.external_share_count += 1;
        }
    }
}

/// An error the walk or discovery recovered from; destined for the error log.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredError {
    pub context: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl RecoveredError {
    pub fn new(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            context: context.into(),
            message: message.to_string(),
            at: Utc::now(),
        }
    }
}
