//! Environment Configuration Loader
//!
//! Loads `KEY=VALUE` pairs (API keys, peer command, model name) from an
//! environment file before anything reads configuration.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qb_core::config::load_environment;
//!
//! fn main() {
//!     load_environment();
//!     // GEMINI_API_KEY, QB_PEER_COMMAND, ... are now available
//! }
//! ```

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Variable naming a custom environment file
pub const ENV_FILE_VAR: &str = "QB_ENV_FILE";

/// Paths checked in order of priority
pub const ENV_FILE_PATHS: &[&str] = &["/etc/querybridge/environment", ".env"];

/// Load environment variables from the first environment file found.
///
/// `$QB_ENV_FILE` wins over the fixed paths. Existing variables are never
/// overridden. Returns the path that was loaded.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var(ENV_FILE_VAR) {
        if let Some(path) = load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded_path) = load_env_file(path) {
            return Some(loaded_path);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

/// Load a single environment file. Returns `None` if it does not exist or
/// cannot be read.
pub fn load_env_file(path: &str) -> Option<String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return None;
    }

    match fs::read_to_string(path_obj) {
        Ok(content) => {
            let mut loaded_count = 0;
            let mut skipped_count = 0;

            for line in content.lines() {
                let line = line.trim();

                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if let Some((key, value)) = parse_env_line(line) {
                    if std::env::var(&key).is_err() {
                        std::env::set_var(&key, &value);
                        loaded_count += 1;
                        debug!("Loaded: {}={}", key, redact(&key, &value));
                    } else {
                        skipped_count += 1;
                        debug!("Skipped (already set): {}", key);
                    }
                }
            }

            info!(
                "Loaded {} environment variables from {} ({} skipped - already set)",
                loaded_count, path, skipped_count
            );

            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

fn redact<'a>(key: &str, value: &'a str) -> &'a str {
    if key.contains("KEY") || key.contains("TOKEN") || key.contains("SECRET") {
        "***"
    } else {
        value
    }
}

/// Parse a single environment line into key-value pair.
///
/// Handles `KEY=VALUE`, `KEY="VALUE"`, `KEY='VALUE'` and an optional
/// leading `export `.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.strip_prefix("export ").unwrap_or(line);
    let mut parts = line.splitn(2, '=');
    let key = parts.next()?.trim();
    let value = parts.next()?.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Get a configuration value with a default.
pub fn get_config(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an optional configuration value. Empty values count as unset.
pub fn get_config_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an integer configuration value.
pub fn get_config_int(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
