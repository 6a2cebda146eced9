/// Session: navigation between the theme selection view and playback.
///
/// This is the only surface a view layer mutates through: theme selected,
/// back, replay, and timer firings. Every activation builds a fresh engine;
/// leaving playback disposes it.
use std::time::Duration;
use thiserror::Error;

use crate::core::catalog::{CatalogError, ScriptCatalog};
use crate::core::link::Location;
use crate::core::narration::Narrator;
use crate::core::playback::{FrameView, PlaybackEngine, PlaybackError, DEFAULT_DWELL};
use crate::core::scheduler::{ManualScheduler, Scheduler, TimerToken};
use crate::core::stage::{self, Stage};
use crate::schema::theme::ThemeId;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown theme: {0}")]
    UnknownTheme(ThemeId),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),
}

/// What the user is looking at.
#[derive(Debug)]
pub enum View<N: Narrator, S: Scheduler> {
    ThemeSelect,
    Playing(PlaybackEngine<N, S>),
}

/// Navigation state plus the shared narrator and scheduler handles that
/// each new engine receives a clone of.
#[derive(Debug)]
pub struct Session<N: Narrator + Clone, S: Scheduler + Clone> {
    catalog: ScriptCatalog,
    location: Location,
    dwell: Duration,
    narrator: N,
    scheduler: S,
    view: View<N, S>,
}

/// Builder for constructing a `Session`.
pub struct SessionBuilder {
    catalog: Option<ScriptCatalog>,
    location: String,
    dwell: Duration,
}

impl<N: Narrator + Clone, S: Scheduler + Clone> Session<N, S> {
    /// Select a theme: update the location and start a new engine.
    pub fn on_theme_selected(&mut self, theme: &ThemeId) -> Result<(), SessionError> {
        if !self.catalog.contains(theme) {
            log::warn!("session: rejected unknown theme {theme}");
            return Err(SessionError::UnknownTheme(theme.clone()));
        }
        self.location = self.location.with_theme(theme);
        self.activate(theme)
    }

    /// Leave playback: dispose the engine and drop the theme from the location.
    pub fn on_back(&mut self) {
        if let View::Playing(engine) = &mut self.view {
            engine.dispose();
            log::info!("session: leaving theme {}", engine.theme());
        }
        self.view = View::ThemeSelect;
        self.location = self.location.without_theme();
    }

    /// Replay the current theme. Returns false on the selection view.
    pub fn on_replay(&mut self) -> bool {
        match &mut self.view {
            View::Playing(engine) => {
                engine.replay();
                true
            }
            View::ThemeSelect => false,
        }
    }

    /// Hand a fired timer to the active engine, if any.
    pub fn on_timer(&mut self, token: TimerToken) {
        if let View::Playing(engine) = &mut self.view {
            engine.on_timer(token);
        }
    }

    fn activate(&mut self, theme: &ThemeId) -> Result<(), SessionError> {
        // Replacing the view drops, and so disposes, any previous engine.
        self.view = View::ThemeSelect;
        let mut engine = PlaybackEngine::for_theme(
            &self.catalog,
            theme,
            self.narrator.clone(),
            self.scheduler.clone(),
        )?
        .with_dwell(self.dwell);
        engine.start()?;
        log::info!("session: playing theme {theme}");
        self.view = View::Playing(engine);
        Ok(())
    }

    pub fn view(&self) -> &View<N, S> {
        &self.view
    }

    pub fn engine(&self) -> Option<&PlaybackEngine<N, S>> {
        match &self.view {
            View::Playing(engine) => Some(engine),
            View::ThemeSelect => None,
        }
    }

    pub fn active_theme(&self) -> Option<&ThemeId> {
        self.engine().map(|e| e.theme())
    }

    pub fn frame_view(&self) -> Option<FrameView> {
        self.engine().map(|e| e.frame_view())
    }

    /// The stage for the active theme with its current speaker highlighted.
    pub fn stage(&self) -> Option<Stage> {
        let engine = self.engine()?;
        stage::render_stage(&self.catalog, engine.theme(), Some(engine.current_speaker())).ok()
    }

    pub fn catalog(&self) -> &ScriptCatalog {
        &self.catalog
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The full current location, which reproduces the active theme.
    pub fn share_link(&self) -> String {
        self.location.to_string()
    }

    pub fn narrator(&self) -> &N {
        &self.narrator
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

impl<N: Narrator + Clone> Session<N, ManualScheduler> {
    /// Advance virtual time by `elapsed`, delivering every timer that falls
    /// due along the way.
    pub fn run_for(&mut self, elapsed: Duration) {
        let timers = self.scheduler.clone();
        let until = timers.now() + elapsed;
        while let Some(token) = timers.pop_due(until) {
            self.on_timer(token);
        }
        timers.settle(until);
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            catalog: None,
            location: String::new(),
            dwell: DEFAULT_DWELL,
        }
    }

    pub fn with_catalog(mut self, catalog: ScriptCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Initial location; a valid `theme` parameter starts playback directly.
    pub fn location(mut self, url: &str) -> Self {
        self.location = url.to_string();
        self
    }

    pub fn dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    pub fn build<N, S>(self, narrator: N, scheduler: S) -> Result<Session<N, S>, SessionError>
    where
        N: Narrator + Clone,
        S: Scheduler + Clone,
    {
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => ScriptCatalog::builtin()?,
        };
        let location = Location::parse(&self.location);
        let deep_link = location
            .theme_param()
            .map(ThemeId::from)
            .filter(|theme| {
                let known = catalog.contains(theme);
                if !known {
                    log::warn!("session: ignoring unknown theme {theme} in location");
                }
                known
            });

        let mut session = Session {
            catalog,
            location,
            dwell: self.dwell,
            narrator,
            scheduler,
            view: View::ThemeSelect,
        };
        if let Some(theme) = deep_link {
            session.activate(&theme)?;
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::narration::RecordingNarrator;
    use crate::core::playback::PlaybackStatus;

    fn session(url: &str) -> Session<RecordingNarrator, ManualScheduler> {
        SessionBuilder::new()
            .location(url)
            .build(RecordingNarrator::available(), ManualScheduler::new())
            .unwrap()
    }

    #[test]
    fn no_param_shows_selection() {
        let s = session("http://localhost/");
        assert!(matches!(s.view(), View::ThemeSelect));
        assert!(s.frame_view().is_none());
        assert!(s.narrator().commands().is_empty());
    }

    #[test]
    fn unknown_param_shows_selection() {
        let s = session("http://localhost/?theme=westerns");
        assert!(s.engine().is_none());
    }

    #[test]
    fn valid_param_starts_playback() {
        let s = session("http://localhost/?theme=pirates");
        let engine = s.engine().unwrap();
        assert_eq!(engine.theme().as_str(), "pirates");
        assert_eq!(engine.status(), PlaybackStatus::Playing);
        assert_eq!(s.narrator().spoken(), ["Do ye like fishsticks, matey?"]);
        assert_eq!(s.share_link(), "http://localhost/?theme=pirates");
    }

    #[test]
    fn selecting_theme_updates_location() {
        let mut s = session("http://localhost/");
        s.on_theme_selected(&ThemeId::from("space")).unwrap();
        assert_eq!(s.active_theme(), Some(&ThemeId::from("space")));
        assert_eq!(s.share_link(), "http://localhost/?theme=space");
    }

    #[test]
    fn selecting_unknown_theme_fails_without_side_effects() {
        let mut s = session("http://localhost/");
        let err = s.on_theme_selected(&ThemeId::from("westerns")).unwrap_err();
        assert!(matches!(err, SessionError::UnknownTheme(_)));
        assert!(s.engine().is_none());
        assert_eq!(s.share_link(), "http://localhost/");
    }

    #[test]
    fn back_disposes_engine_and_clears_param() {
        let mut s = session("http://localhost/?theme=classic");
        assert_eq!(s.scheduler().pending_count(), 1);
        s.on_back();
        assert!(s.engine().is_none());
        assert_eq!(s.scheduler().pending_count(), 0);
        assert_eq!(s.share_link(), "http://localhost/");

        let before = s.narrator().speak_count();
        s.run_for(Duration::from_secs(30));
        assert_eq!(s.narrator().speak_count(), before);
    }

    #[test]
    fn switching_themes_replaces_engine() {
        let mut s = session("http://localhost/?theme=classic");
        s.run_for(Duration::from_millis(2500));
        s.on_theme_selected(&ThemeId::from("fantasy")).unwrap();

        let engine = s.engine().unwrap();
        assert_eq!(engine.frame_index(), 0);
        assert_eq!(s.scheduler().pending_count(), 1);
        assert_eq!(
            s.narrator().spoken().last().map(String::as_str),
            Some("Dost thou enjoy fishsticks?")
        );
    }

    #[test]
    fn replay_only_while_playing() {
        let mut s = session("http://localhost/");
        assert!(!s.on_replay());
        s.on_theme_selected(&ThemeId::from("classic")).unwrap();
        s.run_for(Duration::from_secs(15));
        assert!(s.engine().unwrap().is_complete());
        assert!(s.on_replay());
        assert_eq!(s.engine().unwrap().frame_index(), 0);
    }

    #[test]
    fn stage_highlights_current_speaker() {
        let mut s = session("http://localhost/?theme=classic");
        s.run_for(Duration::from_millis(2500));
        let stage = s.stage().unwrap();
        assert!(stage.characters[1].talking);
        assert!(!stage.characters[0].talking);
    }

    #[test]
    fn custom_dwell_applies_to_new_engines() {
        let mut s = SessionBuilder::new()
            .dwell(Duration::from_millis(500))
            .build(RecordingNarrator::available(), ManualScheduler::new())
            .unwrap();
        s.on_theme_selected(&ThemeId::from("classic")).unwrap();
        s.run_for(Duration::from_millis(500));
        assert_eq!(s.engine().unwrap().frame_index(), 1);
    }
}
