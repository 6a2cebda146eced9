pub mod dialogue;
pub mod theme;
