//! Resolves the application configuration from its three layered sources.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults (`Settings::default`),
//! 2. the page's URL query parameters,
//! 3. every JSON file found in the configured Drive folder, applied in listing order.
//!
//! Layers are merged as plain `ParamMap`s with `merge_layers`, the merged map is
//! validated once more (`finalCheck`), and the result is converted into the
//! immutable `AppConfig` whose time fields are `Duration`s.

use std::collections::BTreeSet;
use std::time::Duration;

use log::{debug, error, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::drive_client::{cancellable, DriveApi};
use super::errors::{ConfigError, DriveError};
use super::model::{DriveAccess, DriveFile, Rotation};
use super::params::{parse_url_params, ParamMap, RawParams};
use super::schema::{validate_final, validate_json_params, validate_url_params, Issue, Settings};

/// Mime type of the configuration files looked for in the Drive folder.
pub const JSON_MIME_TYPE: &str = "application/json";

pub const DEFAULT_MIME_TYPES: [&str; 8] = [
    "image/avif",
    "image/gif",
    "image/jpeg",
    "image/png",
    "image/svg+xml",
    "image/webp",
    "video/mp4",
    "video/webm",
];

impl Default for Settings {
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg0,
            slide_length: 30,
            enable_refetch: false,
            refetch_interval: 3,
            enabled_mime_types: DEFAULT_MIME_TYPES.iter().map(|t| t.to_string()).collect(),
            fade_time: 0.5,
            ignore_video_length: false,
        }
    }
}

impl Settings {
    /// The settings as an untyped map, ready to be merged with other layers.
    pub fn to_param_map(&self) -> ParamMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                error!("Settings serialized to a non-object value: {}", other);
                ParamMap::new()
            }
            Err(e) => {
                error!("Failed to serialize settings: {}", e);
                ParamMap::new()
            }
        }
    }
}

/// Overwrites `target`'s fields with every field of `layer`.
pub fn merge_into(target: &mut ParamMap, layer: &ParamMap) {
    for (key, value) in layer {
        target.insert(key.clone(), value.clone());
    }
}

/// Merges the three configuration layers field by field.
///
/// Precedence is fixed: `json` overrides `url`, which overrides `defaults`.
pub fn merge_layers(defaults: &ParamMap, url: &ParamMap, json: &ParamMap) -> ParamMap {
    let mut merged = defaults.clone();
    merge_into(&mut merged, url);
    merge_into(&mut merged, json);
    merged
}

/// The fully resolved, immutable configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub drive: DriveAccess,
    pub rotation: Rotation,
    pub slide_length: Duration,
    pub enable_refetch: bool,
    pub refetch_interval: Duration,
    pub enabled_mime_types: Vec<String>,
    pub fade_time: Duration,
    pub ignore_video_length: bool,
}

impl AppConfig {
    /// Converts validated settings into their runtime units: seconds and minutes become `Duration`s.
    pub fn from_settings(drive: DriveAccess, settings: Settings) -> Self {
        Self {
            drive,
            rotation: settings.rotation,
            slide_length: Duration::from_secs(settings.slide_length),
            enable_refetch: settings.enable_refetch,
            refetch_interval: Duration::from_secs(settings.refetch_interval.saturating_mul(60)),
            enabled_mime_types: settings.enabled_mime_types,
            fade_time: Duration::try_from_secs_f64(settings.fade_time).unwrap_or(Duration::MAX),
            ignore_video_length: settings.ignore_video_length,
        }
    }

    /// How often the media list is refetched, or `None` when refetching is disabled.
    pub fn refetch_period(&self) -> Option<Duration> {
        self.enable_refetch.then_some(self.refetch_interval)
    }
}

/// Where a `ConfigResolver` currently is in its pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveStage {
    Idle,
    ParsingUrl,
    ListingJsonFiles,
    /// Index of the JSON file being fetched, in listing order.
    FetchingJsonFile(usize),
    Merging,
    FinalValidating,
    Ready,
    Cancelled,
    Failed,
}

/// Runs the resolution pipeline against a Drive implementation, tracking its stage.
pub struct ConfigResolver<'a> {
    drive: &'a dyn DriveApi,
    stage: ResolveStage,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(drive: &'a dyn DriveApi) -> Self {
        Self { drive, stage: ResolveStage::Idle }
    }

    pub fn stage(&self) -> &ResolveStage {
        &self.stage
    }

    fn enter(&mut self, next: ResolveStage) {
        debug!("Config resolver stage {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    /// Resolves the configuration.
    ///
    /// # Errors
    /// - `ConfigError::MissingParams` if a required URL parameter is absent.
    /// - `ConfigError::Validation` for invalid URL parameters, an invalid JSON
    ///   file under strict parsing, or a failed final check.
    /// - `ConfigError::Drive` if the folder can't be listed.
    /// - `ConfigError::Cancelled` if `cancel` fires first; no partial config is produced.
    #[must_use = "resolving configuration can fail; the Result must be handled"]
    pub async fn resolve(&mut self, raw: &RawParams, cancel: &CancellationToken) -> Result<AppConfig, ConfigError> {
        let result = self.run(raw, cancel).await;
        match &result {
            Err(e) if e.is_cancelled() => self.enter(ResolveStage::Cancelled),
            Err(_) => self.enter(ResolveStage::Failed),
            Ok(_) => {}
        }
        result
    }

    async fn run(&mut self, raw: &RawParams, cancel: &CancellationToken) -> Result<AppConfig, ConfigError> {
        self.enter(ResolveStage::ParsingUrl);
        let parsed = parse_url_params(raw)?;
        let (url_config, url_params) = validate_url_params(&parsed)?;
        let access = DriveAccess {
            api_key: url_params.google_api_key,
            folder_id: url_params.drive_folder_id,
            shared_drive_id: url_params.shared_drive_id,
        };
        let strict = url_params.strict_json_parsing == Some(true);

        self.enter(ResolveStage::ListingJsonFiles);
        let listed = cancellable(cancel, self.drive.list_files(&access, &[JSON_MIME_TYPE.to_string()])).await?;
        let json_files: Vec<&DriveFile> = listed.iter().filter(|f| f.mime_type == JSON_MIME_TYPE).collect();
        debug!("Found {} JSON configuration file(s)", json_files.len());

        let mut json_config = ParamMap::new();
        for (index, file) in json_files.into_iter().enumerate() {
            self.enter(ResolveStage::FetchingJsonFile(index));
            let contribution = self.load_json_file(&access, file, strict, cancel).await?;
            merge_into(&mut json_config, &contribution);
        }

        self.enter(ResolveStage::Merging);
        let merged = merge_layers(&Settings::default().to_param_map(), &url_config, &json_config);

        self.enter(ResolveStage::FinalValidating);
        let settings = validate_final(&merged)?;
        if cancel.is_cancelled() {
            return Err(ConfigError::Cancelled);
        }

        self.enter(ResolveStage::Ready);
        let config = AppConfig::from_settings(access, settings);
        debug!("Resolved app config: {:?}", config);
        Ok(config)
    }

    /// Fetches, parses and validates one JSON file, returning its surviving fields.
    /// Fetch and parse failures contribute nothing.
    async fn load_json_file(
        &self,
        access: &DriveAccess,
        file: &DriveFile,
        strict: bool,
        cancel: &CancellationToken,
    ) -> Result<ParamMap, ConfigError> {
        let content = match cancellable(cancel, self.drive.download_file(access, &file.id)).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => {
                    debug!("Loaded \"{}\": {}", file.name, value);
                    value
                }
                Err(e) => {
                    error!("Failed to parse JSON file {}: {}", file.name, e);
                    return Ok(ParamMap::new());
                }
            },
            Err(DriveError::Cancelled) => return Err(ConfigError::Cancelled),
            Err(e) => {
                error!("Failed to retrieve JSON configuration file {}: {}", file.name, e);
                return Ok(ParamMap::new());
            }
        };

        let err = match validate_json_params(&content, &file.name) {
            Ok(contribution) => return Ok(contribution),
            Err(err) if strict => return Err(err.into()),
            Err(err) => err,
        };

        let feedback: Vec<String> = err.issues.iter().map(Issue::feedback).collect();
        error!("Failed to parse {}: {:?}", file.name, feedback);

        let Value::Object(object) = content else {
            warn!("Ignoring {}: content is not a JSON object", file.name);
            return Ok(ParamMap::new());
        };
        let offending: BTreeSet<&str> = err.issues.iter().filter_map(Issue::field).collect();
        warn!("Dropping field(s) {:?} from {}", offending, file.name);
        let kept: ParamMap = object.into_iter().filter(|(key, _)| !offending.contains(key.as_str())).collect();

        match validate_json_params(&Value::Object(kept), &file.name) {
            Ok(contribution) => Ok(contribution),
            Err(e) => {
                error!("Ignoring {} entirely, remaining fields still invalid: {}", file.name, e);
                Ok(ParamMap::new())
            }
        }
    }
}

/// Resolves the configuration with a fresh `ConfigResolver`.
#[must_use = "resolving configuration can fail; the Result must be handled"]
pub async fn resolve_app_config(drive: &dyn DriveApi, raw: &RawParams, cancel: &CancellationToken) -> Result<AppConfig, ConfigError> {
    ConfigResolver::new(drive).resolve(raw, cancel).await
}
