use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which of the two fixed characters utters a line.
///
/// Serialized as the bare integer `1` or `2` so catalog files read the way
/// the characters are labelled on stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SpeakerId {
    /// The interviewer, drawn on the left.
    One,
    /// The respondent, drawn on the right.
    Two,
}

impl SpeakerId {
    /// Numeric label shown on the character sprite.
    pub fn number(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// The speaker who answers this one.
    pub fn other(&self) -> SpeakerId {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

impl TryFrom<u8> for SpeakerId {
    type Error = DialogueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(DialogueError::UnknownSpeaker(other)),
        }
    }
}

impl From<SpeakerId> for u8 {
    fn from(speaker: SpeakerId) -> Self {
        speaker.number()
    }
}

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogueError {
    #[error("unknown speaker id {0} (expected 1 or 2)")]
    UnknownSpeaker(u8),
    #[error("dialogue line text is empty")]
    EmptyText,
    #[error("script has no lines")]
    EmptyScript,
}

/// One line of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLine")]
pub struct DialogueLine {
    speaker: SpeakerId,
    text: String,
}

#[derive(Deserialize)]
struct RawLine {
    speaker: SpeakerId,
    text: String,
}

impl TryFrom<RawLine> for DialogueLine {
    type Error = DialogueError;

    fn try_from(raw: RawLine) -> Result<Self, Self::Error> {
        DialogueLine::new(raw.speaker, raw.text)
    }
}

impl DialogueLine {
    /// Build a line, rejecting blank text.
    pub fn new(speaker: SpeakerId, text: impl Into<String>) -> Result<Self, DialogueError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DialogueError::EmptyText);
        }
        Ok(Self { speaker, text })
    }

    pub fn speaker(&self) -> SpeakerId {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// An ordered, never-empty sequence of lines. Order is playback order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DialogueLine>", into = "Vec<DialogueLine>")]
pub struct Script {
    lines: Vec<DialogueLine>,
}

impl Script {
    pub fn new(lines: Vec<DialogueLine>) -> Result<Self, DialogueError> {
        if lines.is_empty() {
            return Err(DialogueError::EmptyScript);
        }
        Ok(Self { lines })
    }

    /// Number of frames. Always at least one.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false; present for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.lines.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&DialogueLine> {
        self.lines.get(index)
    }

    pub fn first(&self) -> &DialogueLine {
        &self.lines[0]
    }

    pub fn lines(&self) -> &[DialogueLine] {
        &self.lines
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DialogueLine> {
        self.lines.iter()
    }
}

impl TryFrom<Vec<DialogueLine>> for Script {
    type Error = DialogueError;

    fn try_from(lines: Vec<DialogueLine>) -> Result<Self, Self::Error> {
        Script::new(lines)
    }
}

impl From<Script> for Vec<DialogueLine> {
    fn from(script: Script) -> Self {
        script.lines
    }
}

impl std::ops::Index<usize> for Script {
    type Output = DialogueLine;

    fn index(&self, index: usize) -> &Self::Output {
        &self.lines[index]
    }
}

impl<'a> IntoIterator for &'a Script {
    type Item = &'a DialogueLine;
    type IntoIter = std::slice::Iter<'a, DialogueLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}
