use crate::api::DriveApi;
use crate::error::Result;
use crate::records::ChildRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a children listing stands between two page fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", content = "token", rename_all = "snake_case")]
pub enum PagePosition {
    /// No page fetched yet.
    Start,
    /// The next page is addressed by this token.
    Token(String),
    /// The last page has been handed out.
    Exhausted,
}

/// Restartable sequence of pages over one folder's children.
///
/// A failed fetch leaves the position untouched, so the same page can be
/// asked for again by whoever owns the pager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildPager {
    folder_id: String,
    drive_id: String,
    position: PagePosition,
}

impl ChildPager {
    pub fn new(folder_id: impl Into<String>, drive_id: impl Into<String>) -> Self {
        Self::resume(folder_id, drive_id, PagePosition::Start)
    }

    pub fn resume(
        folder_id: impl Into<String>,
        drive_id: impl Into<String>,
        position: PagePosition,
    ) -> Self {
        Self {
            folder_id: folder_id.into(),
            drive_id: drive_id.into(),
            position,
        }
    }

    pub fn position(&self) -> &PagePosition {
        &self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position == PagePosition::Exhausted
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    pub async fn next_page<A: DriveApi>(&mut self, api: &A) -> Result<Option<Vec<ChildRecord>>> {
        let token = match &self.position {
            PagePosition::Exhausted => return Ok(None),
            PagePosition::Start => None,
            PagePosition::Token(token) => Some(token.as_str()),
        };

        let page = api
            .list_children(&self.folder_id, &self.drive_id, token)
            .await?;
        debug!(
            "Folder {} page: {} children, more: {}",
            self.folder_id,
            page.items.len(),
            page.next_token.is_some()
        );

        self.position = match page.next_token {
            Some(next) => PagePosition::Token(next),
            None => PagePosition::Exhausted,
        };
        Ok(Some(page.items))
    }
}
