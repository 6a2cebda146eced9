/// Stage composition: what the view draws for a theme and active speaker.
///
/// Pure functions of their inputs; nothing here loads assets or fails
/// beyond an unknown theme.
use serde::Serialize;

use crate::core::catalog::{CatalogError, ScriptCatalog};
use crate::schema::dialogue::{DialogueLine, SpeakerId};
use crate::schema::theme::{Color, ThemeId};

/// Shown in place of audio when no speech backend exists.
pub const NARRATION_ADVISORY: &str = "Text-to-speech not supported in this environment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn of(speaker: SpeakerId) -> Side {
        match speaker {
            SpeakerId::One => Side::Left,
            SpeakerId::Two => Side::Right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterSprite {
    pub speaker: SpeakerId,
    pub label: String,
    pub color: Color,
    pub side: Side,
    pub talking: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub background: Color,
    pub characters: [CharacterSprite; 2],
}

impl Stage {
    pub fn character(&self, speaker: SpeakerId) -> &CharacterSprite {
        match speaker {
            SpeakerId::One => &self.characters[0],
            SpeakerId::Two => &self.characters[1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechBubble {
    pub text: String,
    pub speaker: SpeakerId,
    /// The bubble tail points at the speaker, so it sits on their side.
    pub side: Side,
}

/// A selectable theme as shown on the theme selection view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeCard {
    pub id: ThemeId,
    pub name: String,
    pub accent_color: Color,
}

pub fn render_stage(
    catalog: &ScriptCatalog,
    theme: &ThemeId,
    active_speaker: Option<SpeakerId>,
) -> Result<Stage, CatalogError> {
    let palette = catalog.get_palette(theme)?;
    let sprite = |speaker: SpeakerId| CharacterSprite {
        speaker,
        label: speaker.number().to_string(),
        color: palette.speaker(speaker).clone(),
        side: Side::of(speaker),
        talking: active_speaker == Some(speaker),
    };
    Ok(Stage {
        background: palette.background.clone(),
        characters: [sprite(SpeakerId::One), sprite(SpeakerId::Two)],
    })
}

pub fn speech_bubble(line: &DialogueLine) -> SpeechBubble {
    SpeechBubble {
        text: line.text().to_string(),
        speaker: line.speaker(),
        side: Side::of(line.speaker()),
    }
}

pub fn theme_cards(catalog: &ScriptCatalog) -> Vec<ThemeCard> {
    catalog
        .themes()
        .map(|entry| ThemeCard {
            id: entry.id.clone(),
            name: entry.name.clone(),
            accent_color: entry.accent_color.clone(),
        })
        .collect()
}
