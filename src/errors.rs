//! Defines the custom error types used throughout the `shopwindow_rs` crate.
//!
//! This module centralizes error handling, providing specific error enums for
//! the different categories of failure (Drive requests, configuration
//! resolution, slideshow playback), and a top-level `AppError` to wrap them.
//! Each error type implements `Debug`, `Display`, and `std::error::Error`, and
//! provides `From` implementations for the underlying error types.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use super::schema::{Issue, ValidationStage};

// --- DriveError ---
/// Errors related to interactions with the remote file-storage (Google Drive) API.
#[must_use = "a Drive error should be handled or propagated"]
#[derive(Debug)]
pub enum DriveError {
    /// An error occurred during an HTTP request made by `reqwest`.
    Reqwest(reqwest::Error),
    /// An error occurred during JSON serialization or deserialization.
    SerdeJson(serde_json::Error),
    /// An error occurred while building a request URL.
    UrlParse(url::ParseError),
    /// The API answered with a non-success status (e.g., 403 for a bad key, 404 for a missing folder).
    HttpError { status: reqwest::StatusCode, message: String },
    /// The request was abandoned because its cancellation token fired.
    Cancelled,
}

impl fmt::Display for DriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveError::Reqwest(e) => write!(f, "Drive request error: {}", e),
            DriveError::SerdeJson(e) => write!(f, "Drive JSON (de)serialization error: {}", e),
            DriveError::UrlParse(e) => write!(f, "Drive URL parse error: {}", e),
            DriveError::HttpError { status, message } => write!(f, "Drive HTTP error {}: {}", status, message),
            DriveError::Cancelled => write!(f, "Drive request cancelled"),
        }
    }
}

impl StdError for DriveError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DriveError::Reqwest(e) => Some(e),
            DriveError::SerdeJson(e) => Some(e),
            DriveError::UrlParse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DriveError {
    fn from(err: reqwest::Error) -> Self {
        DriveError::Reqwest(err)
    }
}

impl From<serde_json::Error> for DriveError {
    fn from(err: serde_json::Error) -> Self {
        DriveError::SerdeJson(err)
    }
}

impl From<url::ParseError> for DriveError {
    fn from(err: url::ParseError) -> Self {
        DriveError::UrlParse(err)
    }
}

// --- MissingParamsError ---
/// One or more connection-required URL parameters were absent.
///
/// Carries everything the diagnostic view needs to tell the user how to fix the URL.
#[must_use = "a missing-parameters error should be handled or propagated"]
#[derive(Debug, Clone, PartialEq)]
pub struct MissingParamsError {
    /// Required parameter names that were not in the query string, in declaration order.
    pub missing_params: Vec<String>,
    /// Every recognised parameter that was supplied, with its raw value.
    pub given_params: BTreeMap<String, String>,
    /// All optional parameter names, in declaration order.
    pub optional_params: Vec<String>,
}

impl fmt::Display for MissingParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Missing the following params: {}", self.missing_params.join(", "))
    }
}

impl StdError for MissingParamsError {}

// --- ValidationError ---
/// A configuration object failed schema validation.
#[must_use = "a validation error should be handled or propagated"]
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Which source was being validated (and, for JSON files, which file).
    pub stage: ValidationStage,
    /// Every failing field, in field declaration order.
    pub issues: Vec<Issue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed in stage {}", self.stage.name())?;
        if let ValidationStage::JsonParams { file_name } = &self.stage {
            write!(f, " (file: {})", file_name)?;
        }
        Ok(())
    }
}

impl StdError for ValidationError {}

// --- ConfigError ---
/// Errors related to resolving the application configuration.
#[must_use = "a configuration error should be handled or propagated"]
#[derive(Debug)]
pub enum ConfigError {
    /// Required URL parameters are absent.
    MissingParams(MissingParamsError),
    /// A configuration source failed validation.
    Validation(ValidationError),
    /// The Drive folder could not be listed while looking for JSON files.
    Drive(DriveError),
    /// Resolution was abandoned because its cancellation token fired.
    Cancelled,
}

impl ConfigError {
    /// True when this error only reports a cancellation, which callers swallow instead of displaying.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConfigError::Cancelled | ConfigError::Drive(DriveError::Cancelled))
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingParams(e) => write!(f, "Configuration error: {}", e),
            ConfigError::Validation(e) => write!(f, "Configuration error: {}", e),
            ConfigError::Drive(e) => write!(f, "Configuration error: {}", e),
            ConfigError::Cancelled => write!(f, "Configuration resolution cancelled"),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::MissingParams(e) => Some(e),
            ConfigError::Validation(e) => Some(e),
            ConfigError::Drive(e) => Some(e),
            ConfigError::Cancelled => None,
        }
    }
}

impl From<MissingParamsError> for ConfigError {
    fn from(err: MissingParamsError) -> Self {
        ConfigError::MissingParams(err)
    }
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::Validation(err)
    }
}

impl From<DriveError> for ConfigError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::Cancelled => ConfigError::Cancelled,
            other => ConfigError::Drive(other),
        }
    }
}

// --- MediaError ---
/// Errors reported by the rendering surface when issuing playback commands.
#[must_use = "a media error should be handled or propagated"]
#[derive(Debug, Clone, PartialEq)]
pub enum MediaError {
    /// The surface refused to start playback (e.g., an autoplay policy).
    PlaybackRejected(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::PlaybackRejected(s) => write!(f, "Playback rejected: {}", s),
        }
    }
}

impl StdError for MediaError {}

// --- SlideshowError ---
/// Contract violations of the slideshow engine.
#[must_use = "a slideshow error should be handled or propagated"]
#[derive(Debug, Clone, PartialEq)]
pub enum SlideshowError {
    /// The engine was asked to advance over zero media entries.
    EmptyMediaSequence,
}

impl fmt::Display for SlideshowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlideshowError::EmptyMediaSequence => write!(f, "Cannot advance a slideshow with no media entries"),
        }
    }
}

impl StdError for SlideshowError {}

// --- AppError (Top-level error enum) ---
/// A top-level error type that can encompass any error within the player.
#[must_use = "an application error should be handled or propagated"]
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Drive(DriveError),
    Slideshow(SlideshowError),
}

impl AppError {
    /// True when the error only reports a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            AppError::Config(e) => e.is_cancelled(),
            AppError::Drive(DriveError::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Application Configuration Error: {}", e),
            AppError::Drive(e) => write!(f, "Application Drive Error: {}", e),
            AppError::Slideshow(e) => write!(f, "Application Slideshow Error: {}", e),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Drive(e) => Some(e),
            AppError::Slideshow(e) => Some(e),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self { AppError::Config(err) }
}
impl From<DriveError> for AppError {
    fn from(err: DriveError) -> Self { AppError::Drive(err) }
}
impl From<SlideshowError> for AppError {
    fn from(err: SlideshowError) -> Self { AppError::Slideshow(err) }
}
