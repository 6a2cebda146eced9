//! Deep links and the share control.
//!
//! The active theme lives in a single `theme` query parameter, so the
//! current location is always a link that reproduces the same theme.

use std::fmt;
use thiserror::Error;

use crate::schema::theme::ThemeId;

/// Query parameter carrying the active theme.
pub const THEME_PARAM: &str = "theme";

/// A page location split into the parts deep-linking cares about.
///
/// Query pairs keep their order and any parameters other than `theme`
/// survive a round trip untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    base: String,
    query: Vec<(String, String)>,
    fragment: Option<String>,
}

impl Location {
    pub fn parse(url: &str) -> Location {
        let (rest, fragment) = match url.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (url, None),
        };
        let (base, query) = match rest.split_once('?') {
            Some((base, query)) => (base, parse_query(query)),
            None => (rest, Vec::new()),
        };
        Location {
            base: base.to_string(),
            query,
            fragment,
        }
    }

    /// Raw value of the `theme` parameter, if present and non-empty.
    pub fn theme_param(&self) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == THEME_PARAM)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// Set `theme`: the first existing pair keeps its position and any
    /// duplicates are dropped. Appended when absent.
    pub fn with_theme(&self, theme: &ThemeId) -> Location {
        let value = theme.as_str().to_string();
        let mut query = Vec::with_capacity(self.query.len() + 1);
        let mut placed = false;
        for (key, old) in &self.query {
            if key != THEME_PARAM {
                query.push((key.clone(), old.clone()));
            } else if !placed {
                query.push((key.clone(), value.clone()));
                placed = true;
            }
        }
        if !placed {
            query.push((THEME_PARAM.to_string(), value));
        }
        Location {
            base: self.base.clone(),
            query,
            fragment: self.fragment.clone(),
        }
    }

    pub fn without_theme(&self) -> Location {
        Location {
            base: self.base.clone(),
            query: self
                .query
                .iter()
                .filter(|(key, _)| key != THEME_PARAM)
                .cloned()
                .collect(),
            fragment: self.fragment.clone(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(
                f,
                "{sep}{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable")]
    Unavailable,
    #[error("clipboard write failed: {0}")]
    WriteFailed(String),
}

/// Somewhere a share link can be copied to.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The share button: copies a link and shows "Copied!" for a moment.
///
/// Time is passed in by the caller as milliseconds on any monotonic clock.
#[derive(Debug, Clone, Default)]
pub struct ShareControl {
    copied_until_ms: Option<u64>,
}

impl ShareControl {
    /// How long the confirmation stays visible.
    pub const FEEDBACK_MS: u64 = 2000;

    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `link`. Failures are logged and leave the control unchanged.
    pub fn share(&mut self, link: &str, clipboard: &mut impl Clipboard, now_ms: u64) -> bool {
        match clipboard.write_text(link) {
            Ok(()) => {
                self.copied_until_ms = Some(now_ms + Self::FEEDBACK_MS);
                true
            }
            Err(e) => {
                log::warn!("share: failed to copy link: {e}");
                false
            }
        }
    }

    pub fn is_copied(&self, now_ms: u64) -> bool {
        self.copied_until_ms.is_some_and(|until| now_ms < until)
    }

    pub fn label(&self, now_ms: u64) -> &'static str {
        if self.is_copied(now_ms) {
            "Copied!"
        } else {
            "Share Link"
        }
    }
}
