//! scrapemon Library
//!
//! Command-line front end for the scrapemon dashboard: replays captured push
//! streams and turns live ones into NDJSON events. The ingestion core lives in
//! `scrapemon-core` and `scrapemon-app`.

pub mod headless;
pub mod replay;

// Re-export main entry points
pub use headless::runner::run_watch;
pub use replay::{run_replay, ReplayOptions};
