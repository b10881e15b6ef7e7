use crate::core::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "PGODBC_CONFIG";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub connection: Option<ConnectionConfig>,
    pub ui: Option<UIConfig>,
}

/// Connection-related configuration.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectionConfig {
    /// Data source name used when none is given on the command line
    pub dsn: Option<String>,
}

/// UI-related configuration.
#[derive(Debug, Default, Deserialize)]
pub struct UIConfig {
    pub page_size: Option<usize>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn default_dsn(&self) -> Option<&str> {
        self.connection
            .as_ref()?
            .dsn
            .as_deref()
            .filter(|dsn| !dsn.trim().is_empty())
    }

    /// Rows shown per page in the results grid.
    pub fn page_size(&self) -> usize {
        self.ui.as_ref().and_then(|ui| ui.page_size).unwrap_or(20)
    }

    pub fn log_level(&self) -> &str {
        self.ui
            .as_ref()
            .and_then(|ui| ui.log_level.as_deref())
            .unwrap_or("warn")
    }
}

/// Location of the configuration file: `$PGODBC_CONFIG`, or
/// `<config dir>/pgodbc/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("pgodbc").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = pgodbc::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
}

/// Loads the configuration from [`config_path`], falling back to defaults
/// when there is no file.
pub fn load_default_config() -> Result<Config> {
    match config_path() {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "loading configuration");
            load_config(path)
        }
        _ => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_CONFIG: &str = r#"
[connection]
dsn = "mydb"

[ui]
page_size = 50
log_level = "debug"
"#;

    #[test]
    fn test_load_config_from_str() {
        let config: Config = toml::from_str(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.default_dsn(), Some("mydb"));
        assert_eq!(config.page_size(), 50);
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_defaults_for_missing_sections() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.default_dsn(), None);
        assert_eq!(config.page_size(), 20);
        assert_eq!(config.log_level(), "warn");
    }

    #[test]
    fn test_blank_dsn_is_ignored() {
        let config: Config = toml::from_str("[connection]\ndsn = \"  \"\n").unwrap();
        assert_eq!(config.default_dsn(), None);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CONFIG.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.default_dsn(), Some("mydb"));
    }

    #[test]
    fn test_malformed_config_is_a_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[connection\ndsn = ").unwrap();

        match load_config(file.path()) {
            Err(Error::Config(_)) => {}
            other => panic!("Expected Config error, got {:?}", other),
        }
    }
}
