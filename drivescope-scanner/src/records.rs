use serde::{Deserialize, Deserializer, Serialize};

/// Mime type the remote API uses to mark a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    pub fn with_next(items: Vec<T>, token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(token.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveRestrictions {
    #[serde(default)]
    pub admin_managed_restrictions: bool,
    #[serde(default)]
    pub copy_requires_writer_permission: bool,
    #[serde(default)]
    pub domain_users_only: bool,
    #[serde(default)]
    pub drive_members_only: bool,
    #[serde(default)]
    pub sharing_folders_requires_organizer_permission: bool,
}

impl DriveRestrictions {
    /// Names of the flags that are switched on, in declaration order.
    pub fn enabled_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.admin_managed_restrictions {
            flags.push("adminManagedRestrictions");
        }
        if self.copy_requires_writer_permission {
            flags.push("copyRequiresWriterPermission");
        }
        if self.domain_users_only {
            flags.push("domainUsersOnly");
        }
        if self.drive_members_only {
            flags.push("driveMembersOnly");
        }
        if self.sharing_folders_requires_organizer_permission {
            flags.push("sharingFoldersRequiresOrganizerPermission");
        }
        flags
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub restrictions: DriveRestrictions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// A direct child of a folder as returned by the children listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildRecord {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// The API reports sizes as decimal strings; anything unparsable is dropped.
    #[serde(default, deserialize_with = "lenient_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub owners: Vec<UserRecord>,
    #[serde(default)]
    pub last_modifying_user: Option<UserRecord>,
}

impl ChildRecord {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn size_bytes(&self) -> u64 {
        self.size.unwrap_or(0)
    }

    /// Shared drive items have no owner, so fall back to the last modifier.
    pub fn creator(&self) -> Option<String> {
        self.owners
            .first()
            .or(self.last_modifying_user.as_ref())
            .and_then(|user| {
                user.email_address
                    .clone()
                    .or_else(|| user.display_name.clone())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRecord {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
