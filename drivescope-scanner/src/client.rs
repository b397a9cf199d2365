use crate::api::DriveApi;
use crate::error::{ApiError, Result};
use crate::records::{ChildRecord, DriveRecord, Page, PermissionRecord};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

const CHILD_FIELDS: &str = "nextPageToken,files(id,name,mimeType,size,createdTime,modifiedTime,\
webViewLink,owners(displayName,emailAddress),lastModifyingUser(displayName,emailAddress))";
const PERMISSION_FIELDS: &str =
    "nextPageToken,permissions(type,role,emailAddress,domain,displayName)";
const DRIVE_FIELDS: &str = "nextPageToken,drives(id,name,createdTime,restrictions)";
const PAGE_SIZE: &str = "100";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveList {
    #[serde(default)]
    drives: Vec<DriveRecord>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<ChildRecord>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionList {
    #[serde(default)]
    permissions: Vec<PermissionRecord>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct About {
    user: AboutUser,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutUser {
    email_address: String,
}

/// `DriveApi` over the Drive v3 REST surface, authenticated with a bearer token.
pub struct HttpDriveClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpDriveClient {
    pub fn new(base_url: &str, token: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        // join() drops the last path segment unless the base ends with a slash
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = Client::builder()
            .user_agent("Drivescope/0.1 (https://github.com/trapdoorsec/drivescope)")
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs / 2))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let response = self.client.get(url).bearer_auth(&self.token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::StatusError {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::ParseError(e.to_string()))
    }
}

impl DriveApi for HttpDriveClient {
    async fn current_user(&self) -> Result<String> {
        let mut url = self.endpoint("about")?;
        url.query_pairs_mut().append_pair("fields", "user(emailAddress)");
        let about: About = self.get_json(url).await?;
        Ok(about.user.email_address)
    }

    async fn list_drives(&self, page_token: Option<&str>) -> Result<Page<DriveRecord>> {
        let mut url = self.endpoint("drives")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("pageSize", PAGE_SIZE)
                .append_pair("useDomainAdminAccess", "true")
                .append_pair("fields", DRIVE_FIELDS);
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        let list: DriveList = self.get_json(url).await?;
        Ok(Page {
            items: list.drives,
            next_token: list.next_page_token,
        })
    }

    async fn list_children(
        &self,
        folder_id: &str,
        drive_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<ChildRecord>> {
        let mut url = self.endpoint("files")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(
                    "q",
                    &format!("'{}' in parents and trashed = false", escape_query(folder_id)),
                )
                .append_pair("driveId", drive_id)
                .append_pair("corpora", "drive")
                .append_pair("includeItemsFromAllDrives", "true")
                .append_pair("supportsAllDrives", "true")
                .append_pair("pageSize", PAGE_SIZE)
                .append_pair("fields", CHILD_FIELDS);
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        let list: FileList = self.get_json(url).await?;
        Ok(Page {
            items: list.files,
            next_token: list.next_page_token,
        })
    }

    async fn list_permissions(&self, resource_id: &str) -> Result<Vec<PermissionRecord>> {
        let mut permissions = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut url = self.endpoint(&format!("files/{}/permissions", resource_id))?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("supportsAllDrives", "true")
                    .append_pair("useDomainAdminAccess", "true")
                    .append_pair("fields", PERMISSION_FIELDS);
                if let Some(ref token) = token {
                    query.append_pair("pageToken", token);
                }
            }
            let list: PermissionList = self.get_json(url).await?;
            permissions.extend(list.permissions);
            match list.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(permissions)
    }
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
