pub mod generate;
pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};

pub use parse::{load_collector, load_collectors, load_config, ConfigError};
pub use types::{CollectorConfig, Config, WebConfig};

const ENV_VAR_PATTERN: &str = r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Expands environment variables in a string.
/// Supports $env{VAR_NAME} syntax.
/// If an environment variable is not set, it's left unchanged.
pub fn expand_env_vars(text: &str) -> Result<String, regex::Error> {
    let re = Regex::new(ENV_VAR_PATTERN)?;

    Ok(re
        .replace_all(text, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string())
}

/// Names of `$env{...}` references still present in `text`, sorted and
/// deduplicated. Full-line YAML comments are not scanned.
pub fn unexpanded_env_vars(text: &str) -> Result<Vec<String>, regex::Error> {
    let re = Regex::new(ENV_VAR_PATTERN)?;
    let mut names: Vec<String> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| re.captures_iter(line).map(|cap| cap[1].to_string()))
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

/// Expands tilde (~) in paths to the user's home directory.
/// If the path starts with "~/" or is exactly "~", replaces it with the home directory.
/// Returns the path unchanged if it doesn't start with tilde or the home directory
/// cannot be determined.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config file path based on explicit argument or default locations.
/// Returns the first existing path from:
/// 1. Explicit path (if provided, with tilde expansion)
/// 2. ~/.config/collectord/config.yml
/// 3. /etc/collectord/config.yml
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/collectord/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/collectord/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}
