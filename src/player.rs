//! Ties configuration, media listing and the slideshow engine together.
//!
//! `Player::run` resolves the configuration, lists the folder's media, hands
//! the entries to the rendering surface and starts the engine. It then reacts
//! to three event sources until shutdown: fired slide timers, the optional
//! refetch interval, and finished refetches. A refetch resolves the
//! configuration again and relists the media; its result supersedes both the
//! config and the media sequence, so the running engine is torn down and a new
//! one started. Only the latest refetch counts; starting a new one cancels the
//! previous one.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};
use tokio_util::sync::CancellationToken;

use super::config::{resolve_app_config, AppConfig};
use super::drive_client::DriveApi;
use super::errors::AppError;
use super::media_lister::list_media;
use super::model::{AppState, MediaEntry};
use super::params::RawParams;
use super::scheduler::TokioScheduler;
use super::slideshow::{MediaSurface, SlideTiming, SlideshowEngine};

type RefetchResult = (u64, Result<(AppConfig, Vec<MediaEntry>), AppError>);

/// Resolves a fresh configuration and lists the media it selects.
async fn refetch(
    drive: &dyn DriveApi,
    raw: &RawParams,
    cancel: &CancellationToken,
) -> Result<(AppConfig, Vec<MediaEntry>), AppError> {
    let config = resolve_app_config(drive, raw, cancel).await?;
    let entries = list_media(drive, &config, cancel).await?;
    Ok((config, entries))
}

fn refetch_ticker(config: &AppConfig) -> Option<Interval> {
    config.refetch_period().map(|period| {
        info!("Refetching configuration and media every {:?}", period);
        tokio::time::interval_at(Instant::now() + period, period)
    })
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

pub struct Player<M: MediaSurface> {
    drive: Arc<dyn DriveApi>,
    surface: M,
    state: AppState,
    status_message: String,
}

impl<M: MediaSurface> Player<M> {
    pub fn new(drive: Arc<dyn DriveApi>, surface: M) -> Self {
        info!("Initializing Player...");
        Self {
            drive,
            surface,
            state: AppState::Connecting,
            status_message: "Initializing...".to_string(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    fn set_app_state(&mut self, new_state: AppState, message: String) {
        info!("Transitioning AppState from {} to {}. Message: {}", self.state, new_state, message);
        if let AppState::Error(_) = new_state {
            error!("AppState changed to Error: {}", message);
        }
        self.state = new_state;
        self.status_message = message;
    }

    fn fail(&mut self, err: AppError) -> AppError {
        if !err.is_cancelled() {
            let message = err.to_string();
            self.set_app_state(AppState::Error(message.clone()), message);
        }
        err
    }

    /// Presents `entries` and starts an engine over them, or enters the default view if there are none.
    fn start_engine(
        &mut self,
        config: &AppConfig,
        entries: Vec<MediaEntry>,
        scheduler: TokioScheduler,
    ) -> Result<Option<SlideshowEngine<TokioScheduler>>, AppError> {
        self.surface.present(&entries, config);
        if entries.is_empty() {
            warn!("No media with enabled mime types found in folder {}", config.drive.folder_id);
            self.set_app_state(
                AppState::DefaultView("No media found".to_string()),
                "No media with the enabled mime types was found in the Drive folder.".to_string(),
            );
            return Ok(None);
        }
        let mut engine = SlideshowEngine::new(SlideTiming::from(config), entries, scheduler);
        engine.start(&mut self.surface)?;
        self.set_app_state(AppState::Slideshow, "Slideshow started.".to_string());
        Ok(Some(engine))
    }

    /// Runs until `shutdown` fires.
    ///
    /// # Errors
    /// Any configuration or initial listing failure; `AppError::is_cancelled`
    /// is true when setup was interrupted by `shutdown`.
    #[must_use = "the player can fail during setup; the Result must be handled"]
    pub async fn run(&mut self, raw: &RawParams, shutdown: CancellationToken) -> Result<(), AppError> {
        self.set_app_state(AppState::Connecting, "Resolving configuration...".to_string());
        let mut config = match resolve_app_config(self.drive.as_ref(), raw, &shutdown).await {
            Ok(config) => config,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.set_app_state(AppState::Connecting, "Listing media...".to_string());
        let entries = match list_media(self.drive.as_ref(), &config, &shutdown).await {
            Ok(entries) => entries,
            Err(e) => return Err(self.fail(e.into())),
        };

        let (scheduler, mut fired) = TokioScheduler::new();
        let mut engine = match self.start_engine(&config, entries, scheduler.fork()) {
            Ok(engine) => engine,
            Err(e) => return Err(self.fail(e)),
        };

        let (refetch_tx, mut refetch_rx) = mpsc::unbounded_channel::<RefetchResult>();
        let mut generation: u64 = 0;
        let mut in_flight: Option<CancellationToken> = None;
        let mut ticker = refetch_ticker(&config);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping slideshow.");
                    break;
                }
                Some(timer) = fired.recv() => {
                    if let Some(engine) = engine.as_mut() {
                        if let Err(e) = engine.on_timer(timer, &mut self.surface) {
                            return Err(self.fail(e.into()));
                        }
                    }
                }
                _ = next_tick(&mut ticker) => {
                    generation += 1;
                    let token = shutdown.child_token();
                    if let Some(previous) = in_flight.replace(token.clone()) {
                        debug!("Cancelling refetch superseded by generation {}", generation);
                        previous.cancel();
                    }
                    debug!("Starting refetch (generation {})", generation);
                    let drive = Arc::clone(&self.drive);
                    let refetch_raw = raw.clone();
                    let tx = refetch_tx.clone();
                    let this_generation = generation;
                    tokio::spawn(async move {
                        let result = refetch(drive.as_ref(), &refetch_raw, &token).await;
                        let _ = tx.send((this_generation, result));
                    });
                }
                Some((result_generation, result)) = refetch_rx.recv() => {
                    if result_generation != generation {
                        debug!("Discarding result of superseded refetch (generation {})", result_generation);
                    } else {
                        in_flight = None;
                        match result {
                            Ok((new_config, entries)) => {
                                info!("Refetch returned {} entries, restarting slideshow", entries.len());
                                if let Some(mut old) = engine.take() {
                                    old.teardown();
                                }
                                if new_config.refetch_period() != config.refetch_period() {
                                    debug!("Refetch period changed to {:?}", new_config.refetch_period());
                                    ticker = refetch_ticker(&new_config);
                                }
                                config = new_config;
                                engine = match self.start_engine(&config, entries, scheduler.fork()) {
                                    Ok(engine) => engine,
                                    Err(e) => return Err(self.fail(e)),
                                };
                            }
                            Err(e) if e.is_cancelled() => debug!("Refetch generation {} cancelled", result_generation),
                            Err(e) => warn!("Refetch failed, keeping current config and media: {}", e),
                        }
                    }
                }
            }
        }

        if let Some(token) = in_flight.take() {
            token.cancel();
        }
        if let Some(mut engine) = engine.take() {
            engine.teardown();
        }
        Ok(())
    }
}
