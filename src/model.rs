//! Defines the core data structures and enums used by the slideshow.
//!
//! This includes the Drive listing models, the playable media entries derived
//! from them, the screen rotation setting, and the player's overall state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen rotation in degrees. Only right angles are supported.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Every accepted rotation value, in ascending order.
    pub const ALLOWED_DEGREES: [u16; 4] = [0, 90, 180, 270];

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("unsupported rotation: {}", other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Credentials and scope used for every Drive request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriveAccess {
    /// Pre-supplied API key, passed through untouched.
    pub api_key: String,
    /// The folder holding media and JSON configuration files.
    pub folder_id: String,
    /// Set when the folder lives in a shared drive.
    pub shared_drive_id: Option<String>,
}

/// One file's metadata as returned by the Drive `files.list` endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

/// The body of a Drive `files.list` response.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    /// Present when more results are available.
    pub next_page_token: Option<String>,
}

/// Whether an entry is rendered as a video or as a still image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classifies a mime type. Anything that isn't `video/...` is shown as an image.
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type.starts_with("video") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// One playable item in the slideshow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaEntry {
    /// Resolved URL the surface loads the media from. Also the entry's identity.
    pub url: String,
    pub mime_type: String,
    /// Display name, used for sorting and logging.
    pub name: String,
}

impl MediaEntry {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime_type(&self.mime_type)
    }

    pub fn is_video(&self) -> bool {
        self.kind() == MediaKind::Video
    }
}

/// Represents the overall state of the player.
/// Used to control what the surface displays and the player's flow.
#[derive(Clone, Debug, PartialEq)]
pub enum AppState {
    /// Initial state: resolving configuration, then listing media.
    Connecting,
    /// Actively displaying slideshow content.
    Slideshow,
    /// Nothing to show (e.g., the folder holds no enabled media). The String is the reason.
    DefaultView(String),
    /// An error occurred that prevents normal operation. The String contains the error message.
    Error(String),
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppState::Connecting => write!(f, "Connecting"),
            AppState::Slideshow => write!(f, "Slideshow"),
            AppState::DefaultView(reason) => write!(f, "DefaultView ({})", reason),
            AppState::Error(msg) => write!(f, "Error ({})", msg),
        }
    }
}
