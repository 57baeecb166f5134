pub mod config;
pub mod error;
pub mod metadata;
pub mod naming;
pub mod narration;
pub mod planner;
pub mod subtitles;
pub mod types;
