//! WASM bindings for dialogue-player: drives the browser front end.
//!
//! The page owns the real clock and the speech API. It calls `tick` from
//! its animation loop, renders `frame()`, and feeds `take_narration()` to
//! `speechSynthesis`.

use std::time::Duration;
use wasm_bindgen::prelude::*;

use dialogue_player::core::narration::{NarrationCommand, RecordingNarrator};
use dialogue_player::core::playback::FrameView;
use dialogue_player::core::scheduler::ManualScheduler;
use dialogue_player::core::session::{Session, SessionBuilder};
use dialogue_player::core::stage::{self, SpeechBubble, Stage, NARRATION_ADVISORY};
use dialogue_player::schema::theme::ThemeId;

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
enum FrameInfo {
    ThemeSelect,
    Playing {
        frame: FrameView,
        stage: Stage,
        bubble: SpeechBubble,
        advisory: Option<&'static str>,
    },
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

#[wasm_bindgen]
pub struct PlayerDemo {
    session: Session<RecordingNarrator, ManualScheduler>,
    narrator: RecordingNarrator,
    clock: ManualScheduler,
}

#[wasm_bindgen]
impl PlayerDemo {
    /// Create a player for the page at `location`. `speech_supported`
    /// reports whether the browser exposes a speech synthesis API.
    #[wasm_bindgen(constructor)]
    pub fn new(location: &str, speech_supported: bool) -> Result<PlayerDemo, JsError> {
        let narrator = if speech_supported {
            RecordingNarrator::available()
        } else {
            RecordingNarrator::unavailable()
        };
        let clock = ManualScheduler::new();
        let session = build_session(location, &narrator, &clock)?;
        Ok(PlayerDemo {
            session,
            narrator,
            clock,
        })
    }

    /// Return a JSON array of theme cards in catalog order.
    pub fn themes(&self) -> Result<String, JsError> {
        to_json(&stage::theme_cards(self.session.catalog()))
    }

    /// Navigate to a new location, as on a page load or history change.
    pub fn open(&mut self, location: &str) -> Result<(), JsError> {
        // Tear down the old engine before its replacement arms timers.
        self.session.on_back();
        self.session = build_session(location, &self.narrator, &self.clock)?;
        Ok(())
    }

    pub fn select_theme(&mut self, theme: &str) -> Result<(), JsError> {
        self.session
            .on_theme_selected(&ThemeId::from(theme))
            .map_err(|e| JsError::new(&e.to_string()))
    }

    pub fn back(&mut self) {
        self.session.on_back();
    }

    /// Returns false when no theme is playing.
    pub fn replay(&mut self) -> bool {
        self.session.on_replay()
    }

    /// Advance the player clock by `elapsed_ms`.
    pub fn tick(&mut self, elapsed_ms: u32) {
        self.session
            .run_for(Duration::from_millis(u64::from(elapsed_ms)));
    }

    /// Return a JSON description of what to draw right now.
    pub fn frame(&self) -> Result<String, JsError> {
        to_json(&self.frame_info())
    }

    /// Drain pending narration commands as a JSON array of
    /// `{"kind": "speak", "text": ...}` and `{"kind": "stop"}` objects.
    pub fn take_narration(&self) -> Result<String, JsError> {
        let commands: Vec<NarrationCommand> = self.narrator.take();
        to_json(&commands)
    }

    /// The current location, suitable for copying as a share link.
    pub fn share_link(&self) -> String {
        self.session.share_link()
    }
}

// Private helpers
impl PlayerDemo {
    fn frame_info(&self) -> FrameInfo {
        let (Some(engine), Some(scene)) = (self.session.engine(), self.session.stage()) else {
            return FrameInfo::ThemeSelect;
        };
        let frame = engine.frame_view();
        let advisory = (!frame.narration_available).then_some(NARRATION_ADVISORY);
        FrameInfo::Playing {
            bubble: stage::speech_bubble(engine.current_line()),
            frame,
            stage: scene,
            advisory,
        }
    }
}

fn build_session(
    location: &str,
    narrator: &RecordingNarrator,
    clock: &ManualScheduler,
) -> Result<Session<RecordingNarrator, ManualScheduler>, JsError> {
    SessionBuilder::new()
        .location(location)
        .build(narrator.clone(), clock.clone())
        .map_err(|e| JsError::new(&format!("Session error: {e}")))
}
