//! Configuration file loader and environment overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::PlatformConfig;

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .collab-orchestrator.toml
        search_paths.push(PathBuf::from(".collab-orchestrator.toml"));

        // 2. User config directory: ~/.config/collab-orchestrator/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("collab-orchestrator").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// Environment overrides are not applied; see [`ConfigLoader::load_with_env`].
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load(&self) -> Result<PlatformConfig, ConfigError> {
        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                return Self::load_from_path(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(PlatformConfig::default())
    }

    /// Load configuration and apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or an override is malformed.
    pub fn load_with_env(&self) -> Result<PlatformConfig, ConfigError> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_from_path(path: &Path) -> Result<PlatformConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Apply `AI_*` environment overrides on top of a loaded config.
///
/// `lookup` resolves a variable name to its value; pass
/// `|k| std::env::var(k).ok()` for the real environment.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnv` if a value cannot be parsed.
pub fn apply_env_overrides<F>(config: &mut PlatformConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("AI_PROVIDER") {
        config.ai.provider = parse_env("AI_PROVIDER", &v)?;
    }
    if let Some(v) = lookup("AI_MODEL") {
        config.ai.model = v;
    }
    if let Some(v) = lookup("AI_BASE_URL") {
        config.ai.base_url = Some(v);
    }
    if let Some(v) = lookup("AI_TEMPERATURE") {
        config.ai.temperature = parse_env("AI_TEMPERATURE", &v)?;
    }
    if let Some(v) = lookup("AI_MAX_TOKENS") {
        config.ai.max_tokens = parse_env("AI_MAX_TOKENS", &v)?;
    }
    if let Some(v) = lookup("AI_TIMEOUT_SECS") {
        config.ai.timeout_secs = parse_env("AI_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = lookup("AI_REQUESTS_PER_MINUTE") {
        config.rate_limit.requests_per_minute = parse_env("AI_REQUESTS_PER_MINUTE", &v)?;
    }
    if let Some(v) = lookup("AI_REQUESTS_PER_HOUR") {
        config.rate_limit.requests_per_hour = parse_env("AI_REQUESTS_PER_HOUR", &v)?;
    }
    if let Some(v) = lookup("AI_DAILY_BUDGET") {
        config.budget.daily_limit = parse_env("AI_DAILY_BUDGET", &v)?;
    }
    if let Some(v) = lookup("AI_MONTHLY_BUDGET") {
        config.budget.monthly_limit = parse_env("AI_MONTHLY_BUDGET", &v)?;
    }
    Ok(())
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;
    use crate::config::ProviderKind;

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(".collab-orchestrator.toml"));
    }

    #[test]
    fn test_config_loader_returns_defaults_when_no_file() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml"));
        let config = loader.load().unwrap();
        assert_eq!(config, PlatformConfig::default());
    }

    #[test]
    fn test_config_loader_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [ai]
            provider = "gemini"
            model = "gemini-2.0-flash"

            [budget]
            daily_limit = 3.5
            "#
        )
        .unwrap();

        let config = ConfigLoader::with_path(file.path().to_path_buf())
            .load()
            .unwrap();
        assert_eq!(config.ai.provider, ProviderKind::Gemini);
        assert_eq!(config.ai.model, "gemini-2.0-flash");
        assert!((config.budget.daily_limit - 3.5).abs() < f64::EPSILON);
        assert!((config.budget.monthly_limit - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ai\nmodel = ").unwrap();
        let err = ConfigLoader::with_path(file.path().to_path_buf())
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AI_PROVIDER", "claude"),
            ("AI_MODEL", "claude-3-haiku"),
            ("AI_REQUESTS_PER_MINUTE", "7"),
            ("AI_DAILY_BUDGET", "2.5"),
        ]);
        let mut config = PlatformConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| (*v).to_string())).unwrap();

        assert_eq!(config.ai.provider, ProviderKind::Claude);
        assert_eq!(config.ai.model, "claude-3-haiku");
        assert_eq!(config.rate_limit.requests_per_minute, 7);
        assert_eq!(config.rate_limit.requests_per_hour, 1000);
        assert!((config.budget.daily_limit - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_env_override_invalid_number() {
        let mut config = PlatformConfig::default();
        let err = apply_env_overrides(&mut config, |k| {
            (k == "AI_MAX_TOKENS").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("AI_MAX_TOKENS"));
    }
}
