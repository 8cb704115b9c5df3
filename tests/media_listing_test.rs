//! Integration tests for listing the folder's media.


use std::time::Duration;

use shopwindow_rs::config::AppConfig;
use shopwindow_rs::errors::DriveError;
use shopwindow_rs::list_media;
use shopwindow_rs::model::DriveAccess;
use shopwindow_rs::schema::Settings;
use test_helpers::*;
use tokio_util::sync::CancellationToken;

fn config() -> AppConfig {
    AppConfig::from_settings(
        DriveAccess { api_key: "K".into(), folder_id: "F".into(), shared_drive_id: None },
        Settings::default(),
    )
}

#[tokio::test]
async fn lists_enabled_media_sorted_with_kind_specific_urls() {
    let drive = FakeDrive::new()
        .with_file("v", "Intro.mp4", "video/mp4")
        .with_file("i", "banner.png", "image/png")
        .with_file("x", "notes.txt", "text/plain")
        .with_json("j", "settings.json", "{}");

    let entries = list_media(&drive, &config(), &CancellationToken::new()).await.unwrap();

    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["banner.png", "Intro.mp4"]);
    assert_eq!(entries[0].url, "https://public.test/d/i");
    assert_eq!(entries[1].url, "https://api.test/files/v?key=K&alt=media");
}

#[tokio::test(start_paused = true)]
async fn cancellation_abandons_outstanding_listing() {
    let mut drive = FakeDrive::new().with_file("i", "banner.png", "image/png");
    drive.hang_listing = true;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = list_media(&drive, &config(), &cancel).await.unwrap_err();

    assert!(matches!(err, DriveError::Cancelled));
    assert_eq!(drive.list_calls(), 1);
}

#[tokio::test]
async fn listing_failure_is_reported() {
    let drive = FakeDrive::new().with_file("i", "banner.png", "image/png");
    drive.set_fail_listing(true);

    let err = list_media(&drive, &config(), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DriveError::HttpError { .. }));
}
