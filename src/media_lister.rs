//! Lists the playable media in the configured Drive folder.
//!
//! Entries are sorted by case-insensitive name (stable for names that differ
//! only in case) and mapped to the URL their kind needs: videos are served by
//! the authenticated API, images by the public host, which can only serve
//! thumbnails for video.

use std::cmp::Ordering;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::config::AppConfig;
use super::drive_client::{cancellable, DriveApi};
use super::errors::DriveError;
use super::model::{DriveFile, MediaEntry, MediaKind};

/// Case-insensitive name ordering used for the slideshow sequence.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Sorts files by name, ignoring case. Equal names keep their input order.
pub fn sort_files(files: &mut [DriveFile]) {
    files.sort_by(|a, b| compare_names(&a.name, &b.name));
}

/// Maps one listed file to a playable entry.
pub fn to_media_entry(drive: &dyn DriveApi, config: &AppConfig, file: DriveFile) -> MediaEntry {
    let url = match MediaKind::from_mime_type(&file.mime_type) {
        MediaKind::Video => drive.media_url(&config.drive, &file.id),
        MediaKind::Image => drive.public_image_url(&file.id),
    };
    MediaEntry { url, mime_type: file.mime_type, name: file.name }
}

/// Fetches the folder's media with the enabled mime types, in slideshow order.
///
/// # Errors
/// Returns the `DriveError` of a failed listing, or `DriveError::Cancelled` if
/// `cancel` fires while the request is outstanding.
#[must_use = "listing media can fail; the Result must be handled"]
pub async fn list_media(drive: &dyn DriveApi, config: &AppConfig, cancel: &CancellationToken) -> Result<Vec<MediaEntry>, DriveError> {
    let mut files = cancellable(cancel, drive.list_files(&config.drive, &config.enabled_mime_types)).await?;
    files.retain(|f| config.enabled_mime_types.contains(&f.mime_type));
    sort_files(&mut files);

    let entries: Vec<MediaEntry> = files.into_iter().map(|file| to_media_entry(drive, config, file)).collect();
    let videos = entries.iter().filter(|e| e.is_video()).count();
    info!("Listed {} media entries ({} video, {} image)", entries.len(), videos, entries.len() - videos);
    for entry in &entries {
        debug!("Media entry '{}' ({}) -> {}", entry.name, entry.mime_type, entry.url);
    }
    Ok(entries)
}
