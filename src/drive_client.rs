//! Handles all interactions with the Google Drive v3 API.
//!
//! This module provides the `DriveApi` seam used by the config resolver and the
//! media lister, and `GoogleDriveClient`, its `reqwest` implementation. Every
//! call carries a `DriveAccess` (API key, folder, optional shared drive) and is
//! raced against a `CancellationToken` by `cancellable`.

use std::future::Future;

use async_trait::async_trait;
use log::{debug, error, info, trace};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::errors::DriveError;
use super::model::{DriveAccess, DriveFile, FilesListResponse};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// This host needs no API key, so it isn't rate limited, but it only serves images.
/// For videos it returns a thumbnail.
pub const DEFAULT_PUBLIC_HOST: &str = "https://lh3.googleusercontent.com";

const LISTED_FIELDS: &str = "nextPageToken,files(mimeType,id,name)";
const PAGE_SIZE: &str = "1000";

/// The remote file-storage operations the slideshow depends on.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Lists non-trashed files in the folder whose mime type is one of `mime_types`.
    async fn list_files(&self, access: &DriveAccess, mime_types: &[String]) -> Result<Vec<DriveFile>, DriveError>;

    /// Downloads a file's content through the authenticated API.
    async fn download_file(&self, access: &DriveAccess, file_id: &str) -> Result<Vec<u8>, DriveError>;

    /// API-key authenticated URL serving a file's full content. Needed for video.
    fn media_url(&self, access: &DriveAccess, file_id: &str) -> String;

    /// Unauthenticated URL for an image.
    fn public_image_url(&self, file_id: &str) -> String;
}

/// Runs `fut` unless `cancel` fires first, in which case the future is dropped
/// and `DriveError::Cancelled` is returned.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, DriveError>
where
    F: Future<Output = Result<T, DriveError>>,
{
    if cancel.is_cancelled() {
        return Err(DriveError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Drive request abandoned: cancellation requested");
            Err(DriveError::Cancelled)
        }
        result = fut => result,
    }
}

/// Escapes a value for a single-quoted string literal in a Drive query.
fn quote_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds the Drive `q` expression selecting the folder's files with the given mime types.
pub fn files_query(folder_id: &str, mime_types: &[String]) -> String {
    let mut query = format!("'{}' in parents and trashed = false", quote_literal(folder_id));
    if !mime_types.is_empty() {
        let clauses: Vec<String> = mime_types.iter().map(|t| format!("mimeType = '{}'", quote_literal(t))).collect();
        query.push_str(&format!(" and ({})", clauses.join(" or ")));
    }
    query
}

/// `reqwest`-backed Drive client.
#[derive(Clone, Debug)]
pub struct GoogleDriveClient {
    http: Client,
    api_base: String,
    public_host: String,
}

impl GoogleDriveClient {
    /// Creates a client against the given API base and public image host.
    ///
    /// # Errors
    /// Returns `DriveError::UrlParse` if either base is not a valid URL.
    #[must_use = "creating the client can fail; the Result must be handled"]
    pub fn new(http: Client, api_base: &str, public_host: &str) -> Result<Self, DriveError> {
        Url::parse(api_base)?;
        Url::parse(public_host)?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            public_host: public_host.trim_end_matches('/').to_string(),
        })
    }

    /// A client against the public Google endpoints.
    pub fn with_defaults(http: Client) -> Self {
        Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            public_host: DEFAULT_PUBLIC_HOST.to_string(),
        }
    }

    fn list_url(&self, access: &DriveAccess, mime_types: &[String], page_token: Option<&str>) -> Result<Url, DriveError> {
        let query = files_query(&access.folder_id, mime_types);
        let mut params: Vec<(&str, &str)> = vec![
            ("key", access.api_key.as_str()),
            ("q", query.as_str()),
            ("fields", LISTED_FIELDS),
            ("orderBy", "name"),
            ("pageSize", PAGE_SIZE),
            // Both required to reach shared drives at all
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ];
        if let Some(drive_id) = access.shared_drive_id.as_deref() {
            params.push(("driveId", drive_id));
            params.push(("corpora", "drive"));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        Ok(Url::parse_with_params(&format!("{}/files", self.api_base), &params)?)
    }

    async fn fetch_page(&self, url: Url) -> Result<FilesListResponse, DriveError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            error!("Request error listing Drive files: {:?}", e);
            DriveError::Reqwest(e)
        })?;
        let response = response.error_for_status().map_err(|e| {
            let status = e.status().unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            error!("HTTP error listing Drive files: {} - {}", status, e);
            DriveError::HttpError { status, message: e.to_string() }
        })?;
        let bytes = response.bytes().await?;
        let page = serde_json::from_slice::<FilesListResponse>(&bytes).map_err(|e| {
            error!("Failed to parse Drive files.list response: {}", e);
            DriveError::SerdeJson(e)
        })?;
        Ok(page)
    }
}

#[async_trait]
impl DriveApi for GoogleDriveClient {
    async fn list_files(&self, access: &DriveAccess, mime_types: &[String]) -> Result<Vec<DriveFile>, DriveError> {
        debug!("Listing Drive folder {} for mime types {:?}", access.folder_id, mime_types);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = self.list_url(access, mime_types, page_token.as_deref())?;
            let page = self.fetch_page(url).await?;
            trace!("Drive listing page returned {} file(s)", page.files.len());
            files.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        info!("Listed {} file(s) in Drive folder {}", files.len(), access.folder_id);
        Ok(files)
    }

    async fn download_file(&self, access: &DriveAccess, file_id: &str) -> Result<Vec<u8>, DriveError> {
        debug!("Downloading Drive file {}", file_id);
        let url = self.media_url(access, file_id);
        let response = self.http.get(&url).send().await.map_err(|e| {
            error!("Request error downloading Drive file '{}': {:?}", file_id, e);
            DriveError::Reqwest(e)
        })?;
        let response = response.error_for_status().map_err(|e| {
            let status = e.status().unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            error!("HTTP error downloading Drive file '{}': {} - {}", file_id, status, e);
            DriveError::HttpError { status, message: e.to_string() }
        })?;
        let bytes = response.bytes().await?;
        trace!("Downloaded {} byte(s) for Drive file {}", bytes.len(), file_id);
        Ok(bytes.to_vec())
    }

    fn media_url(&self, access: &DriveAccess, file_id: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("key", &access.api_key)
            .append_pair("alt", "media")
            .append_pair("supportsAllDrives", "true")
            .finish();
        format!("{}/files/{}?{}", self.api_base, file_id, query)
    }

    fn public_image_url(&self, file_id: &str) -> String {
        format!("{}/d/{}", self.public_host, file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(shared: Option<&str>) -> DriveAccess {
        DriveAccess {
            api_key: "KEY".into(),
            folder_id: "FOLDER".into(),
            shared_drive_id: shared.map(str::to_string),
        }
    }

    #[test]
    fn files_query_joins_mime_types() {
        let query = files_query("F", &["image/png".to_string(), "video/mp4".to_string()]);
        assert_eq!(
            query,
            "'F' in parents and trashed = false and (mimeType = 'image/png' or mimeType = 'video/mp4')"
        );
        assert_eq!(files_query("F", &[]), "'F' in parents and trashed = false");
    }

    #[test]
    fn files_query_escapes_quotes_and_backslashes() {
        assert_eq!(
            files_query("it's\\here", &["image/x'y".to_string()]),
            "'it\\'s\\\\here' in parents and trashed = false and (mimeType = 'image/x\\'y')"
        );
    }

    #[test]
    fn list_url_scopes_shared_drives() {
        let client = GoogleDriveClient::with_defaults(Client::new());
        let url = client.list_url(&access(Some("SHARED")), &["application/json".to_string()], None).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("driveId".into(), "SHARED".into())));
        assert!(pairs.contains(&("corpora".into(), "drive".into())));
        assert!(pairs.contains(&("key".into(), "KEY".into())));

        let url = client.list_url(&access(None), &[], Some("next")).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(!pairs.iter().any(|(k, _)| k == "driveId"));
        assert!(pairs.contains(&("pageToken".into(), "next".into())));
    }

    #[test]
    fn builds_media_and_public_urls() {
        let client = GoogleDriveClient::new(Client::new(), "https://api.example/drive/v3/", "https://img.example").unwrap();
        assert_eq!(
            client.media_url(&access(None), "abc"),
            "https://api.example/drive/v3/files/abc?key=KEY&alt=media&supportsAllDrives=true"
        );
        assert_eq!(client.public_image_url("abc"), "https://img.example/d/abc");
        assert!(GoogleDriveClient::new(Client::new(), "not a url", DEFAULT_PUBLIC_HOST).is_err());
    }

    #[tokio::test]
    async fn cancellable_rejects_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let result = cancellable(&token, async { Ok::<_, DriveError>(1) }).await;
        assert!(matches!(result, Err(DriveError::Cancelled)));
    }

    #[tokio::test]
    async fn cancellable_abandons_pending_future() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move { child.cancel() });
        let result = cancellable(&token, std::future::pending::<Result<(), DriveError>>()).await;
        assert!(matches!(result, Err(DriveError::Cancelled)));
    }
}
