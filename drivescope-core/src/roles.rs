// Role tiers and the columns rendered for drives, folders and files

use crate::model::{AccessEntry, PrincipalType, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shown for an `anyone` grant.
pub const EVERYONE: &str = "everyone";

/// Rendered where a column does not apply to the row.
pub const PLACEHOLDER: &str = "-";

/// Display identifiers bucketed by role tier, in entry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAggregate {
    pub organizers: Vec<String>,
    pub file_organizers: Vec<String>,
    pub writers: Vec<String>,
    pub editors: Vec<String>,
    pub commenters: Vec<String>,
    pub readers: Vec<String>,
}

/// How one entry is shown in a role column, or `None` when it carries nothing
/// to show.
pub fn display_identifier(entry: &AccessEntry) -> Option<String> {
    match (entry.display_name.as_deref(), entry.email.as_deref()) {
        (Some(name), Some(email)) => Some(format!("{}:{}", name, email)),
        (Some(name), None) => Some(name.to_string()),
        (None, Some(email)) => Some(email.to_string()),
        (None, None) => match entry.principal {
            PrincipalType::Domain => entry.domain.as_ref().map(|d| format!("@{}", d)),
            PrincipalType::Anyone => Some(EVERYONE.to_string()),
            PrincipalType::User => None,
        },
    }
}

pub fn aggregate_by_role(entries: &[AccessEntry]) -> RoleAggregate {
    let mut aggregate = RoleAggregate::default();

    for entry in entries {
        let Some(role) = entry.role else {
            continue;
        };
        let Some(identifier) = display_identifier(entry) else {
            continue;
        };
        match role {
            Role::Organizer => aggregate.organizers.push(identifier),
            Role::FileOrganizer => aggregate.file_organizers.push(identifier),
            // Contributor on the container, editor on the item: same grant.
            Role::Writer => {
                aggregate.writers.push(identifier.clone());
                aggregate.editors.push(identifier);
            }
            Role::Commenter => aggregate.commenters.push(identifier),
            Role::Reader => aggregate.readers.push(identifier),
        }
    }

    aggregate
}

/// Union of inherited and direct identifiers, first occurrence wins.
pub fn combine(upper: &[String], individual: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    upper
        .iter()
        .chain(individual)
        .map(|identifier| identifier.trim())
        .filter(|identifier| !identifier.is_empty())
        .filter(|identifier| seen.insert(identifier.to_string()))
        .map(str::to_string)
        .collect()
}

/// The role columns of one output row. `editors` is `None` where the row has
/// no editor concept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleColumns {
    pub organizers: Vec<String>,
    pub file_organizers: Vec<String>,
    pub writers: Vec<String>,
    pub editors: Option<Vec<String>>,
    pub commenters: Vec<String>,
    pub readers: Vec<String>,
}

impl RoleColumns {
    /// Drive rows show the drive-level grants as they are.
    pub fn for_drive(drive: &RoleAggregate) -> Self {
        Self {
            organizers: drive.organizers.clone(),
            file_organizers: drive.file_organizers.clone(),
            writers: drive.writers.clone(),
            editors: None,
            commenters: drive.commenters.clone(),
            readers: drive.readers.clone(),
        }
    }

    /// Folders merge every tier with the drive's and show no editors.
    pub fn for_folder(upper: &RoleAggregate, direct: &RoleAggregate) -> Self {
        Self {
            organizers: combine(&upper.organizers, &direct.organizers),
            file_organizers: combine(&upper.file_organizers, &direct.file_organizers),
            writers: combine(&upper.writers, &direct.writers),
            editors: None,
            commenters: combine(&upper.commenters, &direct.commenters),
            readers: combine(&upper.readers, &direct.readers),
        }
    }

    /// Files carry the drive's organizer, file organizer and writer tiers
    /// unmerged, list item-level writers as editors, and merge only the
    /// commenter and reader tiers.
    pub fn for_file(upper: &RoleAggregate, direct: &RoleAggregate) -> Self {
        Self {
            organizers: upper.organizers.clone(),
            file_organizers: upper.file_organizers.clone(),
            writers: upper.writers.clone(),
            editors: Some(direct.editors.clone()),
            commenters: combine(&upper.commenters, &direct.commenters),
            readers: combine(&upper.readers, &direct.readers),
        }
    }

    pub fn render(identifiers: &[String]) -> String {
        identifiers.join(", ")
    }

    pub fn render_editors(&self) -> String {
        match self.editors {
            Some(ref editors) => Self::render(editors),
            None => PLACEHOLDER.to_string(),
        }
    }
}
