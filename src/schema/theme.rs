use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::dialogue::{Script, SpeakerId};

/// Newtype wrapper for theme identifiers (`"classic"`, `"pirates"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemeId(pub String);

impl ThemeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThemeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color {0:?} (expected #rrggbb)")]
pub struct ColorError(pub String);

/// A `#rrggbb` color as written in catalog files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    hex: String,
    rgb: (u8, u8, u8),
}

impl Color {
    pub fn parse(hex: &str) -> Result<Self, ColorError> {
        let digits = hex
            .strip_prefix('#')
            .filter(|d| d.len() == 6 && d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| ColorError(hex.to_string()))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ColorError(hex.to_string()))
        };
        Ok(Self {
            hex: hex.to_ascii_lowercase(),
            rgb: (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        })
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        self.rgb
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.hex
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Display metadata for the theme selection view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeMetadata {
    pub display_name: String,
    pub accent_color: Color,
}

/// Stage colors: the backdrop and one fill per character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub background: Color,
    pub speaker_one: Color,
    pub speaker_two: Color,
}

impl Palette {
    pub fn speaker(&self, speaker: SpeakerId) -> &Color {
        match speaker {
            SpeakerId::One => &self.speaker_one,
            SpeakerId::Two => &self.speaker_two,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        // Classic stage colors; used when a catalog entry omits its palette.
        Self {
            background: Color {
                hex: "#e2e8f0".to_string(),
                rgb: (0xe2, 0xe8, 0xf0),
            },
            speaker_one: Color {
                hex: "#ef4444".to_string(),
                rgb: (0xef, 0x44, 0x44),
            },
            speaker_two: Color {
                hex: "#3b82f6".to_string(),
                rgb: (0x3b, 0x82, 0xf6),
            },
        }
    }
}

/// A theme as stored in a catalog file: metadata, stage palette and script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeEntry {
    pub id: ThemeId,
    pub name: String,
    pub accent_color: Color,
    #[serde(default)]
    pub palette: Palette,
    pub script: Script,
}

impl ThemeEntry {
    pub fn metadata(&self) -> ThemeMetadata {
        ThemeMetadata {
            display_name: self.name.clone(),
            accent_color: self.accent_color.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parse() {
        let c = Color::parse("#4A5568").unwrap();
        assert_eq!(c.hex(), "#4a5568");
        assert_eq!(c.rgb(), (0x4a, 0x55, 0x68));
    }

    #[test]
    fn color_parse_rejects_malformed() {
        assert!(Color::parse("4a5568").is_err());
        assert!(Color::parse("#4a556").is_err());
        assert!(Color::parse("#zzzzzz").is_err());
        assert!(Color::parse("#ééé").is_err());
    }

    #[test]
    fn default_palette_matches_parsed_colors() {
        let palette = Palette::default();
        assert_eq!(palette.background, Color::parse("#e2e8f0").unwrap());
        assert_eq!(palette.speaker(SpeakerId::One), &Color::parse("#ef4444").unwrap());
        assert_eq!(palette.speaker(SpeakerId::Two), &Color::parse("#3b82f6").unwrap());
    }

    #[test]
    fn theme_entry_from_ron() {
        let src = r##"(
            id: "classic",
            name: "Classic",
            accent_color: "#4a5568",
            script: [(speaker: 1, text: "Do you like fishsticks?")],
        )"##;
        let entry: ThemeEntry = ron::from_str(src).unwrap();
        assert_eq!(entry.id, ThemeId::from("classic"));
        assert_eq!(entry.metadata().display_name, "Classic");
        assert_eq!(entry.palette, Palette::default());
        assert_eq!(entry.script.len(), 1);
    }

    #[test]
    fn theme_id_display() {
        assert_eq!(ThemeId::new("space").to_string(), "space");
        assert_eq!(ThemeId::from("space").as_str(), "space");
    }
}
