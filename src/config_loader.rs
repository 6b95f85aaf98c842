// Configuration loader for the Audio Analysis API
//
// This module loads the optional TOML configuration file and exports its values
// as environment variables, so that `config` only ever reads the environment.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use toml::{Table, Value};

pub const CONFIG_FILE_PATH: &str = "audio_api.conf";

/// Loads `audio_api.conf` from the working directory
///
/// Configuration precedence (highest to lowest):
/// 1. Environment variables
/// 2. Configuration file values
/// 3. Default values (not handled here - application defaults)
///
/// # Returns
///
/// Returns true if the config file was successfully loaded, false otherwise
pub fn load_config() -> bool {
    load_config_file(Path::new(CONFIG_FILE_PATH))
}

/// Loads the given configuration file, see [`load_config`]
pub fn load_config_file(config_path: &Path) -> bool {
    if !config_path.exists() {
        debug!("Configuration file not found at: {}", config_path.display());
        return false;
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read configuration file: {}", e);
            return false;
        }
    };

    let config_map = match parse_config(&config_content) {
        Ok(map) => map,
        Err(e) => {
            warn!("Failed to parse configuration file: {}", e);
            return false;
        }
    };

    for (key, value) in missing_entries(config_map, |key| env::var(key).ok()) {
        debug!("Setting env var from config file: {}", key);
        env::set_var(key, value);
    }

    info!("Configuration loaded from {}", config_path.display());
    true
}

/// Flattens a TOML document into key-value pairs
///
/// The file is expected to be flat; arrays and tables are skipped.
pub fn parse_config(content: &str) -> Result<HashMap<String, String>, toml::de::Error> {
    let table: Table = content.parse()?;

    Ok(table
        .into_iter()
        .filter_map(|(key, value)| match scalar_to_string(value) {
            Some(value) => Some((key, value)),
            None => {
                warn!("Skipping unsupported TOML value type for key: {}", key);
                None
            }
        })
        .collect())
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Entries of `config_map` whose key is not already defined according to `lookup`
fn missing_entries<F>(config_map: HashMap<String, String>, lookup: F) -> Vec<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    config_map
        .into_iter()
        .filter(|(key, _)| {
            let present = lookup(key).is_some();
            if present {
                debug!("Env var already exists, skipping: {}", key);
            }
            !present
        })
        .collect()
}
