use crate::error::Result;
use crate::records::{ChildRecord, DriveRecord, Page, PermissionRecord};
use std::future::Future;

/// The remote collaborator a drive audit talks to.
///
/// Every call is a single blocking round-trip from the caller's point of view;
/// callers issue them one at a time. Listing calls are paginated by an opaque
/// token: `None` asks for the first page, and a page without `next_token` is
/// the last one.
pub trait DriveApi {
    /// Identifier (email) of the principal the client is authenticated as.
    fn current_user(&self) -> impl Future<Output = Result<String>> + Send;

    fn list_drives(
        &self,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<Page<DriveRecord>>> + Send;

    /// Non-trashed direct children of `folder_id` inside `drive_id`.
    fn list_children(
        &self,
        folder_id: &str,
        drive_id: &str,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<Page<ChildRecord>>> + Send;

    /// All access entries on a file, folder or drive.
    fn list_permissions(
        &self,
        resource_id: &str,
    ) -> impl Future<Output = Result<Vec<PermissionRecord>>> + Send;
}

/// Collect every drive by following page tokens until the listing ends.
pub async fn list_all_drives<A: DriveApi>(api: &A) -> Result<Vec<DriveRecord>> {
    let mut drives = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = api.list_drives(token.as_deref()).await?;
        drives.extend(page.items);
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(drives)
}
