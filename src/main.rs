use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use reqwest::Client as ReqwestClient;
use tokio_util::sync::CancellationToken;

use shopwindow_rs::diagnostics::render_error;
use shopwindow_rs::drive_client::{DEFAULT_API_BASE, DEFAULT_PUBLIC_HOST};
use shopwindow_rs::surface::ConsoleSurface;
use shopwindow_rs::{GoogleDriveClient, Player, RawParams};

/// Headless Google Drive slideshow player.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Page URL, or bare query string, carrying the slideshow parameters
    /// (e.g. "?googleApiKey=KEY&driveFolderId=FOLDER&slideLength=10")
    url: String,

    /// Base URL of the Drive v3 API
    #[arg(long, default_value = DEFAULT_API_BASE)]
    drive_api_base: String,

    /// Host serving unauthenticated image content
    #[arg(long, default_value = DEFAULT_PUBLIC_HOST)]
    public_host: String,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level.as_str())).init();
    info!("Starting Shop Window...");

    let raw = match RawParams::from_url(&args.url) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Could not parse page URL '{}': {}", args.url, e);
            return ExitCode::FAILURE;
        }
    };

    let drive = match GoogleDriveClient::new(ReqwestClient::new(), &args.drive_api_base, &args.public_host) {
        Ok(drive) => drive,
        Err(e) => {
            error!("Invalid Drive endpoint configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down.");
            on_signal.cancel();
        }
    });

    let mut player = Player::new(Arc::new(drive), ConsoleSurface::new());
    match player.run(&raw, shutdown).await {
        Ok(()) => {
            info!("Shop Window stopped.");
            ExitCode::SUCCESS
        }
        Err(e) => match render_error(&e) {
            Some(diagnostic) => {
                eprintln!("{}", diagnostic);
                ExitCode::FAILURE
            }
            None => ExitCode::SUCCESS,
        },
    }
}
