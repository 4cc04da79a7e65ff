//! Configuration loading and data folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents
///
/// All fields optional: anything absent falls back to environment variables
/// or compiled defaults. API keys configured here are the lowest-priority
/// source (database and environment win).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder holding the SQLite database
    pub data_folder: Option<String>,
    /// Ticketmaster Discovery API key
    pub ticketmaster_api_key: Option<String>,
    /// PredictHQ access token
    pub predicthq_api_key: Option<String>,
    /// Firecrawl API key for the city scraper
    pub firecrawl_api_key: Option<String>,
    /// OpenAI API key for AI-assisted category matching
    pub openai_api_key: Option<String>,
}

/// Load the TOML config file for a service, if present.
///
/// Missing file is not an error (an empty config is returned); a file that
/// exists but fails to parse is.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file; using defaults");
        return Ok(TomlConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config failed: {}", e)))?;
    tracing::info!(path = %path.display(), "Loaded TOML config");
    Ok(config)
}

/// Write the TOML config file (best-effort atomic: temp file + rename).
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Default config file path for the platform (`~/.config/dscout/<service>.toml`)
pub fn default_config_path(service: &str) -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("dscout").join(format!("{}.toml", service)))
        .unwrap_or_else(|| PathBuf::from(format!("./{}.toml", service)))
}

/// Data folder resolution, priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_folder {
        return PathBuf::from(path);
    }

    default_data_folder()
}

/// Create the data folder if missing and return the database path inside it.
pub fn ensure_data_folder(data_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(data_folder)
        .map_err(|e| Error::Config(format!("Create data folder failed: {}", e)))?;
    Ok(data_folder.join("dscout.db"))
}

/// Get OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("dscout"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/dscout"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("dscout"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/dscout"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("dscout"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\dscout"))
    } else {
        PathBuf::from("./dscout_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_file_is_empty_config() {
        let dir = TempDir::new().unwrap();
        let config = load_toml_config(&dir.path().join("nope.toml")).unwrap();
        assert!(config.data_folder.is_none());
        assert!(config.ticketmaster_api_key.is_none());
    }

    #[test]
    fn config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");

        let config = TomlConfig {
            data_folder: Some("/tmp/dscout".to_string()),
            ticketmaster_api_key: Some("tm-key".to_string()),
            ..Default::default()
        };
        write_toml_config(&config, &path).unwrap();

        let loaded = load_toml_config(&path).unwrap();
        assert_eq!(loaded.data_folder.as_deref(), Some("/tmp/dscout"));
        assert_eq!(loaded.ticketmaster_api_key.as_deref(), Some("tm-key"));
        assert!(loaded.openai_api_key.is_none());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "data_folder = [not toml").unwrap();
        assert!(load_toml_config(&path).is_err());
    }

    #[test]
    fn cli_arg_wins_over_toml() {
        let config = TomlConfig {
            data_folder: Some("/from/toml".to_string()),
            ..Default::default()
        };
        let resolved = resolve_data_folder(Some("/from/cli"), "DSCOUT_TEST_UNSET_VAR", &config);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn toml_wins_over_default() {
        let config = TomlConfig {
            data_folder: Some("/from/toml".to_string()),
            ..Default::default()
        };
        let resolved = resolve_data_folder(None, "DSCOUT_TEST_UNSET_VAR", &config);
        assert_eq!(resolved, PathBuf::from("/from/toml"));
    }
}
