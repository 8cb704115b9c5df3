//! Shop Window: a Google Drive backed digital-signage slideshow.
//!
//! Configuration comes from page URL parameters, JSON files in the Drive
//! folder and built-in defaults. The folder's images and videos are then
//! shown one at a time, forever, through a pluggable rendering surface.

pub mod config;
pub mod diagnostics;
pub mod drive_client;
pub mod errors;
pub mod media_lister;
pub mod model;
pub mod params;
pub mod player;
pub mod scheduler;
pub mod schema;
pub mod slideshow;
pub mod surface;

pub use config::{resolve_app_config, AppConfig, ConfigResolver, ResolveStage};
pub use drive_client::{DriveApi, GoogleDriveClient};
pub use errors::{AppError, ConfigError, DriveError};
pub use media_lister::list_media;
pub use model::{AppState, MediaEntry};
pub use params::RawParams;
pub use player::Player;
pub use slideshow::{MediaSurface, Scheduler, SlideshowEngine};
