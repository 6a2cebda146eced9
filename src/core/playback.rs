/// The playback engine: a timed walk through one theme's script.
///
/// States run `Idle -> Playing -> Complete`. Every frame change narrates the
/// new line (when narration is available) and arms a single one-shot timer
/// for the dwell. Replay restarts from frame 0 out of any state; dispose
/// cancels everything and makes later timer firings inert.
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::core::catalog::{CatalogError, ScriptCatalog};
use crate::core::narration::Narrator;
use crate::core::scheduler::{ManualScheduler, Scheduler, TimerToken};
use crate::schema::dialogue::{DialogueLine, Script, SpeakerId};
use crate::schema::theme::ThemeId;

/// How long a frame stays on screen before the next one.
pub const DEFAULT_DWELL: Duration = Duration::from_millis(2500);

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("playback already started (status {0:?})")]
    AlreadyStarted(PlaybackStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// Constructed, not yet started.
    Idle,
    /// A dwell timer is armed and frames are advancing.
    Playing,
    /// Last frame shown, no timer pending.
    Complete,
}

/// Read-only snapshot for a view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameView {
    pub theme: ThemeId,
    pub frame_index: usize,
    pub frame_count: usize,
    pub speaker: SpeakerId,
    pub text: String,
    pub status: PlaybackStatus,
    pub is_complete: bool,
    pub narration_available: bool,
}

/// Drives one script. Owns its narrator and scheduler handles.
#[derive(Debug)]
pub struct PlaybackEngine<N: Narrator, S: Scheduler> {
    theme: ThemeId,
    script: Script,
    dwell: Duration,
    frame_index: usize,
    status: PlaybackStatus,
    narration_available: bool,
    pending: Option<TimerToken>,
    disposed: bool,
    narrator: N,
    scheduler: S,
}

impl<N: Narrator, S: Scheduler> PlaybackEngine<N, S> {
    /// Build an engine at frame 0 in `Idle`. Narration availability is
    /// checked here, once.
    pub fn new(theme: ThemeId, script: Script, narrator: N, scheduler: S) -> Self {
        let narration_available = narrator.is_available();
        log::debug!(
            "playback[{theme}]: created ({} frames, narration {})",
            script.len(),
            if narration_available { "on" } else { "off" }
        );
        Self {
            theme,
            script,
            dwell: DEFAULT_DWELL,
            frame_index: 0,
            status: PlaybackStatus::Idle,
            narration_available,
            pending: None,
            disposed: false,
            narrator,
            scheduler,
        }
    }

    /// Build an engine for a catalog theme. Unknown themes are an error
    /// here; the navigation layer is expected to filter them first.
    pub fn for_theme(
        catalog: &ScriptCatalog,
        theme: &ThemeId,
        narrator: N,
        scheduler: S,
    ) -> Result<Self, PlaybackError> {
        let script = catalog.get_script(theme)?.clone();
        Ok(Self::new(theme.clone(), script, narrator, scheduler))
    }

    pub fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    /// Begin playback. Only valid from `Idle`.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        if self.disposed {
            log::debug!("playback[{}]: start ignored after dispose", self.theme);
            return Ok(());
        }
        if self.status != PlaybackStatus::Idle {
            return Err(PlaybackError::AlreadyStarted(self.status));
        }
        self.status = PlaybackStatus::Playing;
        self.enter_frame();
        Ok(())
    }

    /// Restart from frame 0, whatever the current state.
    pub fn replay(&mut self) {
        if self.disposed {
            log::debug!("playback[{}]: replay ignored after dispose", self.theme);
            return;
        }
        self.cancel_pending();
        self.narrator.stop();
        self.frame_index = 0;
        self.status = PlaybackStatus::Playing;
        log::debug!("playback[{}]: replay", self.theme);
        self.enter_frame();
    }

    /// Cancel the timer, silence narration and stop reacting to timers.
    /// Safe to call any number of times.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.cancel_pending();
        self.narrator.stop();
        self.disposed = true;
        log::debug!("playback[{}]: disposed", self.theme);
    }

    /// Deliver a fired timer. Tokens other than the one currently armed are
    /// stale (cancelled by replay or dispose) and ignored.
    pub fn on_timer(&mut self, token: TimerToken) {
        if self.pending != Some(token) {
            log::trace!("playback[{}]: stale timer {:?}", self.theme, token);
            return;
        }
        self.pending = None;
        self.advance();
    }

    fn advance(&mut self) {
        if self.disposed || self.status != PlaybackStatus::Playing {
            return;
        }
        if self.frame_index == self.script.last_index() {
            self.status = PlaybackStatus::Complete;
            self.cancel_pending();
            self.narrator.stop();
            log::debug!("playback[{}]: complete", self.theme);
            return;
        }
        self.frame_index += 1;
        self.enter_frame();
    }

    /// Per-frame side effect: narrate the current line, then arm the dwell.
    fn enter_frame(&mut self) {
        let line = &self.script[self.frame_index];
        log::debug!(
            "playback[{}]: frame {} speaker {}",
            self.theme,
            self.frame_index,
            line.speaker()
        );
        if self.narration_available {
            self.narrator.speak(line.text());
        }
        self.cancel_pending();
        self.pending = Some(self.scheduler.arm(self.dwell));
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel(token);
        }
    }

    pub fn theme(&self) -> &ThemeId {
        &self.theme
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn current_line(&self) -> &DialogueLine {
        &self.script[self.frame_index]
    }

    pub fn current_speaker(&self) -> SpeakerId {
        self.current_line().speaker()
    }

    pub fn is_complete(&self) -> bool {
        self.frame_index == self.script.last_index() && self.status == PlaybackStatus::Complete
    }

    pub fn narration_available(&self) -> bool {
        self.narration_available
    }

    pub fn has_pending_timer(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn narrator(&self) -> &N {
        &self.narrator
    }

    pub fn frame_view(&self) -> FrameView {
        let line = self.current_line();
        FrameView {
            theme: self.theme.clone(),
            frame_index: self.frame_index,
            frame_count: self.script.len(),
            speaker: line.speaker(),
            text: line.text().to_string(),
            status: self.status,
            is_complete: self.is_complete(),
            narration_available: self.narration_available,
        }
    }
}

impl<N: Narrator> PlaybackEngine<N, ManualScheduler> {
    /// Fire every timer due within the next `elapsed` of virtual time,
    /// including timers armed by the firings themselves.
    pub fn run_for(&mut self, elapsed: Duration) {
        let timers = self.scheduler.clone();
        let until = timers.now() + elapsed;
        while let Some(token) = timers.pop_due(until) {
            self.on_timer(token);
        }
        timers.settle(until);
    }

    pub fn clock(&self) -> &ManualScheduler {
        &self.scheduler
    }
}

impl<N: Narrator, S: Scheduler> Drop for PlaybackEngine<N, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
