//! Settings loading and config directory setup

use std::path::Path;

use scrapemon_core::prelude::*;

use super::types::Settings;

pub const CONFIG_FILENAME: &str = "config.toml";
pub const SCRAPEMON_DIR: &str = ".scrapemon";

const DEFAULT_CONFIG: &str = r#"# scrapemon configuration

[logs]
max_logs = 1000          # Records kept before the oldest is dropped
max_failures = 100       # Failure list cap, separate from max_logs
record_progress = false  # Also log every progress tick
"#;

/// Load settings from .scrapemon/config.toml
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(SCRAPEMON_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create .scrapemon/ with a commented default config.toml if absent
///
/// An existing config file is left untouched.
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let config_dir = project_path.join(SCRAPEMON_DIR);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .map_err(|e| Error::config(format!("Failed to create .scrapemon dir: {}", e)))?;
    }

    let config_path = config_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        std::fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config at {:?}", config_path);
    }

    Ok(())
}
