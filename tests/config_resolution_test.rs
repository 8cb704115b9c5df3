//! Integration tests for configuration resolution
//!
//! Runs the whole resolver against an in-memory Drive folder:
//! - URL parameter parsing and validation
//! - JSON file precedence, strict and lenient parsing
//! - Fetch and parse failures
//! - Cancellation and listing failures


use std::time::Duration;

use shopwindow_rs::config::DEFAULT_MIME_TYPES;
use shopwindow_rs::errors::{ConfigError, DriveError};
use shopwindow_rs::model::Rotation;
use shopwindow_rs::schema::ValidationStage;
use shopwindow_rs::{resolve_app_config, ConfigResolver, RawParams, ResolveStage};
use test_helpers::*;
use tokio_util::sync::CancellationToken;

const BASE: &str = "https://signage.test/?googleApiKey=K&driveFolderId=F";

fn raw(extra: &str) -> RawParams {
    RawParams::from_url(&format!("{}{}", BASE, extra)).unwrap()
}

#[tokio::test]
async fn url_parameters_override_defaults() {
    let drive = FakeDrive::new();
    let config = resolve_app_config(&drive, &raw("&rotation=90&slideLength=10"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(config.drive.api_key, "K");
    assert_eq!(config.drive.folder_id, "F");
    assert_eq!(config.drive.shared_drive_id, None);
    assert_eq!(config.rotation, Rotation::Deg90);
    assert_eq!(config.slide_length, Duration::from_secs(10));
    assert_eq!(config.fade_time, Duration::from_millis(500));
    assert_eq!(config.enabled_mime_types, DEFAULT_MIME_TYPES.map(String::from).to_vec());
    assert_eq!(config.refetch_period(), None);
}

#[tokio::test]
async fn missing_required_parameter_is_reported_before_any_drive_call() {
    let drive = FakeDrive::new();
    let raw = RawParams::from_url("https://signage.test/?googleApiKey=K&rotation=90").unwrap();
    let err = resolve_app_config(&drive, &raw, &CancellationToken::new()).await.unwrap_err();

    match err {
        ConfigError::MissingParams(e) => {
            assert_eq!(e.missing_params, vec!["driveFolderId".to_string()]);
            assert_eq!(e.given_params.get("rotation").map(String::as_str), Some("90"));
        }
        other => panic!("expected MissingParams, got {:?}", other),
    }
    assert_eq!(drive.list_calls(), 0);
}

#[tokio::test]
async fn invalid_url_parameter_fails_url_stage() {
    let drive = FakeDrive::new();
    let err = resolve_app_config(&drive, &raw("&rotation=45"), &CancellationToken::new()).await.unwrap_err();
    match err {
        ConfigError::Validation(e) => {
            assert_eq!(e.stage, ValidationStage::UrlParams);
            assert_eq!(e.issues[0].path, vec!["rotation".to_string()]);
        }
        other => panic!("expected Validation, got {:?}", other),
    }
}

#[tokio::test]
async fn json_file_overrides_url() {
    let drive = FakeDrive::new().with_json("j1", "settings.json", r#"{"slideLength": 20, "ignoreVideoLength": true}"#);
    let config = resolve_app_config(&drive, &raw("&slideLength=10&rotation=270"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(config.slide_length, Duration::from_secs(20));
    assert!(config.ignore_video_length);
    assert_eq!(config.rotation, Rotation::Deg270);
}

#[tokio::test]
async fn later_json_files_override_earlier_ones() {
    let drive = FakeDrive::new()
        .with_json("j1", "a.json", r#"{"slideLength": 10, "fadeTime": 1}"#)
        .with_json("j2", "b.json", r#"{"slideLength": 15}"#);
    let config = resolve_app_config(&drive, &raw(""), &CancellationToken::new()).await.unwrap();

    assert_eq!(config.slide_length, Duration::from_secs(15));
    assert_eq!(config.fade_time, Duration::from_secs(1));
}

#[tokio::test]
async fn lenient_parsing_drops_only_invalid_fields() {
    let drive = FakeDrive::new().with_json("j1", "settings.json", r#"{"slideLength": 3, "rotation": 180}"#);
    let config = resolve_app_config(&drive, &raw("&slideLength=10"), &CancellationToken::new()).await.unwrap();

    assert_eq!(config.slide_length, Duration::from_secs(10));
    assert_eq!(config.rotation, Rotation::Deg180);
}

#[tokio::test]
async fn strict_parsing_fails_on_invalid_json_file() {
    let drive = FakeDrive::new().with_json("j1", "settings.json", r#"{"slideLength": 3, "rotation": 180}"#);
    let err = resolve_app_config(&drive, &raw("&strictJsonParsing=true"), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ConfigError::Validation(e) => {
            assert_eq!(e.stage, ValidationStage::JsonParams { file_name: "settings.json".into() });
            assert_eq!(e.issues.len(), 1);
            assert_eq!(e.issues[0].path, vec!["slideLength".to_string()]);
        }
        other => panic!("expected Validation, got {:?}", other),
    }
}

#[tokio::test]
async fn unreadable_json_files_contribute_nothing() {
    let drive = FakeDrive::new()
        .with_file("gone", "missing.json", "application/json")
        .with_json("broken", "broken.json", "{ not json")
        .with_json("ok", "ok.json", r#"{"refetchInterval": 5, "enableRefetch": true}"#);
    let config = resolve_app_config(&drive, &raw("&strictJsonParsing=true"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(config.slide_length, Duration::from_secs(30));
    assert_eq!(config.refetch_period(), Some(Duration::from_secs(300)));
}

#[tokio::test]
async fn listing_failure_is_fatal() {
    let drive = FakeDrive::new();
    drive.set_fail_listing(true);
    let mut resolver = ConfigResolver::new(&drive);
    let err = resolver.resolve(&raw(""), &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ConfigError::Drive(DriveError::HttpError { .. })));
    assert!(!err.is_cancelled());
    assert_eq!(resolver.stage(), &ResolveStage::Failed);
}

#[tokio::test(start_paused = true)]
async fn cancellation_abandons_outstanding_listing() {
    let mut drive = FakeDrive::new();
    drive.hang_listing = true;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let mut resolver = ConfigResolver::new(&drive);
    let err = resolver.resolve(&raw(""), &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(resolver.stage(), &ResolveStage::Cancelled);
    assert_eq!(drive.list_calls(), 1);
}

#[tokio::test]
async fn successful_resolution_ends_ready() {
    let drive = FakeDrive::new();
    let mut resolver = ConfigResolver::new(&drive);
    assert_eq!(resolver.stage(), &ResolveStage::Idle);
    resolver.resolve(&raw(""), &CancellationToken::new()).await.unwrap();
    assert_eq!(resolver.stage(), &ResolveStage::Ready);
}

#[tokio::test(start_paused = true)]
async fn cancellation_abandons_outstanding_json_download() {
    let mut drive = FakeDrive::new().with_json("j1", "settings.json", r#"{"slideLength": 20}"#);
    drive.hang_download = true;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let mut resolver = ConfigResolver::new(&drive);
    let err = resolver.resolve(&raw(""), &cancel).await.unwrap_err();

    assert!(matches!(err, ConfigError::Cancelled));
    assert_eq!(resolver.stage(), &ResolveStage::Cancelled);
}

#[tokio::test]
async fn lenient_parsing_drops_oversized_integers() {
    let drive = FakeDrive::new()
        .with_json("j1", "settings.json", r#"{"slideLength": 10000000000000000, "rotation": 90}"#);
    let config = resolve_app_config(&drive, &raw("&slideLength=12"), &CancellationToken::new()).await.unwrap();

    assert_eq!(config.slide_length, Duration::from_secs(12));
    assert_eq!(config.rotation, Rotation::Deg90);
}
