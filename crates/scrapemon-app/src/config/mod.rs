//! Configuration file parsing for scrapemon
//!
//! Supports:
//! - `.scrapemon/config.toml` - Log store settings

pub mod settings;
pub mod types;

pub use settings::{init_config_dir, load_settings, CONFIG_FILENAME, SCRAPEMON_DIR};
pub use types::*;
