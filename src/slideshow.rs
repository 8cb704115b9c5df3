//! The slideshow engine: advances a pointer through the media entries forever.
//!
//! The engine owns no clock and no pixels. Timers come from a `Scheduler`, and
//! everything visible goes through a `MediaSurface`, the rendering
//! collaborator that maps entries to on-screen elements. Each advance shows one
//! entry, starts its video if it has one, and schedules exactly one timer for
//! the next advance. At most one timer is outstanding; `teardown` (also run on
//! drop) cancels it and resets the pointer so a restart begins at entry 0.

use std::time::Duration;

use log::{debug, info, trace};

use super::config::AppConfig;
use super::errors::{MediaError, SlideshowError};
use super::model::MediaEntry;

/// Identifies one scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// One-shot timers. When a timer fires, its owner passes the id back to `SlideshowEngine::on_timer`.
pub trait Scheduler {
    fn schedule_once(&mut self, delay: Duration) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}

/// The rendering collaborator.
///
/// The surface keeps its own side table from entry URL to element handle; the
/// engine only ever borrows handles for the duration of a call.
pub trait MediaSurface {
    type Element: Copy;

    /// Renders a new entry sequence (all hidden) using the config's rotation and fade time.
    fn present(&mut self, entries: &[MediaEntry], config: &AppConfig);
    /// The element currently attached to `entry`, if it has been rendered.
    fn element(&self, entry: &MediaEntry) -> Option<Self::Element>;
    /// A video element's natural length, once known.
    fn video_duration(&self, element: Self::Element) -> Option<Duration>;
    fn pause(&mut self, element: Self::Element);
    /// Seeks back to the start.
    fn rewind(&mut self, element: Self::Element);
    fn play(&mut self, element: Self::Element) -> Result<(), MediaError>;
    fn mute(&mut self, element: Self::Element);
    fn set_opacity(&mut self, element: Self::Element, opacity: f32);
}

/// The configuration the engine needs to time each slide.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlideTiming {
    pub slide_length: Duration,
    pub fade_time: Duration,
    pub ignore_video_length: bool,
}

impl From<&AppConfig> for SlideTiming {
    fn from(config: &AppConfig) -> Self {
        Self {
            slide_length: config.slide_length,
            fade_time: config.fade_time,
            ignore_video_length: config.ignore_video_length,
        }
    }
}

impl SlideTiming {
    /// How long to show an entry.
    ///
    /// `video_length` is the natural length of a playable video, `None` for
    /// images and for videos whose length isn't known. A video ends its slide as
    /// its fade-out completes; the result is floored at zero.
    pub fn duration_for(&self, video_length: Option<Duration>) -> Duration {
        match video_length {
            Some(length) if !self.ignore_video_length => length.saturating_sub(self.fade_time),
            _ => self.slide_length,
        }
    }
}

/// Restarts a video from the beginning. A rejected play (e.g., autoplay
/// policy) is retried once muted; a second rejection is only logged.
fn play_from_start<M: MediaSurface>(surface: &mut M, element: M::Element, name: &str) {
    debug!("Triggering playback for video \"{}\".", name);
    surface.pause(element);
    surface.rewind(element);
    if let Err(e) = surface.play(element) {
        debug!("Failed to autoplay video \"{}\" ({}). Muting video and trying again...", name, e);
        surface.mute(element);
        if let Err(e) = surface.play(element) {
            debug!("Muted playback of \"{}\" also failed: {}", name, e);
        }
    }
}

/// Drives the slideshow over a fixed, ordered entry sequence.
pub struct SlideshowEngine<S: Scheduler> {
    timing: SlideTiming,
    entries: Vec<MediaEntry>,
    /// `None` until the first advance.
    pointer: Option<usize>,
    pending: Option<TimerId>,
    scheduler: S,
}

impl<S: Scheduler> SlideshowEngine<S> {
    pub fn new(timing: SlideTiming, entries: Vec<MediaEntry>, scheduler: S) -> Self {
        debug!("Creating slideshow engine over {} entries", entries.len());
        Self { timing, entries, pointer: None, pending: None, scheduler }
    }

    /// Index of the visible entry, or `None` before the first advance.
    pub fn pointer(&self) -> Option<usize> {
        self.pointer
    }

    pub fn current(&self) -> Option<&MediaEntry> {
        self.pointer.and_then(|p| self.entries.get(p))
    }

    pub fn entries(&self) -> &[MediaEntry] {
        &self.entries
    }

    /// The outstanding timer, if any.
    pub fn pending_timer(&self) -> Option<TimerId> {
        self.pending
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Starts (or restarts) from entry 0 immediately.
    ///
    /// # Errors
    /// `SlideshowError::EmptyMediaSequence` if there are no entries.
    #[must_use = "starting the slideshow can fail; the Result must be handled"]
    pub fn start<M: MediaSurface>(&mut self, surface: &mut M) -> Result<Duration, SlideshowError> {
        self.teardown();
        self.advance(surface)
    }

    /// Shows the next entry and schedules the advance after it.
    /// Returns how long the new entry will be shown.
    ///
    /// # Errors
    /// `SlideshowError::EmptyMediaSequence` if there are no entries.
    #[must_use = "advancing can fail; the Result must be handled"]
    pub fn advance<M: MediaSurface>(&mut self, surface: &mut M) -> Result<Duration, SlideshowError> {
        if self.entries.is_empty() {
            return Err(SlideshowError::EmptyMediaSequence);
        }
        if let Some(previous) = self.pending.take() {
            trace!("Cancelling outstanding timer {:?} before advancing", previous);
            self.scheduler.cancel(previous);
        }

        let index = self.pointer.map_or(0, |p| (p + 1) % self.entries.len());
        self.pointer = Some(index);
        let entry = &self.entries[index];

        let mut video_length = None;
        if entry.is_video() {
            if let Some(element) = surface.element(entry) {
                if let Some(length) = surface.video_duration(element).filter(|d| !d.is_zero()) {
                    play_from_start(surface, element, &entry.name);
                    video_length = Some(length);
                }
            }
        }
        let duration = self.timing.duration_for(video_length);

        for other in &self.entries {
            if let Some(element) = surface.element(other) {
                surface.set_opacity(element, if other.url == entry.url { 1.0 } else { 0.0 });
            }
        }

        let timer = self.scheduler.schedule_once(duration);
        trace!("Scheduled timer {:?} in {:?}", timer, duration);
        self.pending = Some(timer);
        info!("Showing entry {}/{} '{}' for {:?}", index + 1, self.entries.len(), entry.name, duration);
        Ok(duration)
    }

    /// Handles a fired timer. Timers other than the outstanding one are stale and ignored.
    /// Returns the new entry's duration if the engine advanced.
    ///
    /// # Errors
    /// `SlideshowError::EmptyMediaSequence` if there are no entries.
    #[must_use = "advancing can fail; the Result must be handled"]
    pub fn on_timer<M: MediaSurface>(&mut self, id: TimerId, surface: &mut M) -> Result<Option<Duration>, SlideshowError> {
        if self.pending != Some(id) {
            trace!("Ignoring stale timer {:?} (outstanding: {:?})", id, self.pending);
            return Ok(None);
        }
        self.pending = None;
        self.advance(surface).map(Some)
    }

    /// Cancels any outstanding timer and resets the pointer to "not started".
    pub fn teardown(&mut self) {
        if let Some(timer) = self.pending.take() {
            debug!("Tearing down slideshow: cancelling timer {:?}", timer);
            self.scheduler.cancel(timer);
        }
        self.pointer = None;
    }
}

impl<S: Scheduler> Drop for SlideshowEngine<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
