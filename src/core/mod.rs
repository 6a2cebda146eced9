pub mod catalog;
pub mod config;
pub mod link;
pub mod narration;
pub mod playback;
pub mod scheduler;
pub mod session;
pub mod stage;
