pub mod api;
pub mod client;
pub mod error;
pub mod pager;
pub mod records;

pub use api::{DriveApi, list_all_drives};
pub use client::HttpDriveClient;
pub use error::ApiError;
pub use pager::{ChildPager, PagePosition};
pub use records::{ChildRecord, DriveRecord, DriveRestrictions, Page, PermissionRecord, UserRecord};
