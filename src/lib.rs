//! Dialogue Player: timed two-character dialogue playback for themed scripts.
//!
//! A catalog of themes maps each theme to a short script of alternating
//! lines. The playback engine walks a script one frame at a time on a fixed
//! dwell, handing each line to an optional narrator. A session layer adds
//! theme selection, deep links and the share control on top.

pub mod core;
pub mod schema;
