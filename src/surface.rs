//! A headless rendering surface for running the player without a display.
//!
//! It keeps the same entry-to-element side table a real renderer would, logs
//! what would be on screen, and accepts every playback command. It never
//! knows a video's length, so videos play for the configured slide length.

use std::time::Duration;

use log::{info, trace};

use super::config::AppConfig;
use super::errors::MediaError;
use super::model::{MediaEntry, Rotation};
use super::slideshow::MediaSurface;

#[derive(Debug, Default)]
pub struct ConsoleSurface {
    urls: Vec<String>,
    names: Vec<String>,
    visible: Option<usize>,
    rotation: Rotation,
    fade_time: Duration,
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the entry currently at full opacity.
    pub fn visible(&self) -> Option<&str> {
        self.visible.and_then(|i| self.names.get(i)).map(String::as_str)
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn fade_time(&self) -> Duration {
        self.fade_time
    }
}

impl MediaSurface for ConsoleSurface {
    type Element = usize;

    fn present(&mut self, entries: &[MediaEntry], config: &AppConfig) {
        self.urls = entries.iter().map(|e| e.url.clone()).collect();
        self.names = entries.iter().map(|e| e.name.clone()).collect();
        self.visible = None;
        self.rotation = config.rotation;
        self.fade_time = config.fade_time;
        info!(
            "Presenting {} entries (rotation {} degrees, fade {:?})",
            entries.len(),
            config.rotation.degrees(),
            config.fade_time
        );
    }

    fn element(&self, entry: &MediaEntry) -> Option<usize> {
        self.urls.iter().position(|url| *url == entry.url)
    }

    fn video_duration(&self, _element: usize) -> Option<Duration> {
        None
    }

    fn pause(&mut self, element: usize) {
        trace!("pause element {}", element);
    }

    fn rewind(&mut self, element: usize) {
        trace!("rewind element {}", element);
    }

    fn play(&mut self, element: usize) -> Result<(), MediaError> {
        trace!("play element {}", element);
        Ok(())
    }

    fn mute(&mut self, element: usize) {
        trace!("mute element {}", element);
    }

    fn set_opacity(&mut self, element: usize, opacity: f32) {
        if opacity >= 1.0 && self.visible != Some(element) {
            self.visible = Some(element);
            if let Some(name) = self.names.get(element) {
                info!("Now showing '{}'", name);
            }
        } else if opacity <= 0.0 && self.visible == Some(element) {
            self.visible = None;
        }
    }
}
