//! Where a `TelebindConfig` comes from.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `telebind.toml`, `config.toml`
//! - `yaml-config`: `telebind.yaml`, `telebind.yml`, `config.yaml`, `config.yml`
//!
//! With both enabled, both formats are searched and merged.
//!
//! # Layering, lowest to highest
//!
//! 1. Built-in defaults
//! 2. Programmatic defaults passed to [`ConfigLoader::merge`]
//! 3. Profile-specific config file (`telebind.{profile}.toml`)
//! 4. Main config file (`telebind.toml`)
//! 5. Environment variables (`TELEBIND_*`)
//! 6. Programmatic overrides passed to [`ConfigLoader::set`]
//!
//! # Environment variables
//!
//! `TELEBIND_` prefix, `__` between nesting levels:
//!
//! - `TELEBIND_BOT__TOKEN=123:abc` → `bot.token = "123:abc"`
//! - `TELEBIND_POLLING__TIMEOUT_SECS=50` → `polling.timeout_secs = 50`
//! - `TELEBIND_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! `TELEBIND_PROFILE` selects the profile.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./deploy/telebind.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::TelebindConfig;

/// Prefix of recognised environment variables.
pub const ENV_PREFIX: &str = "TELEBIND_";

/// Environment variable naming the active profile.
pub const PROFILE_ENV: &str = "TELEBIND_PROFILE";

/// Selects the extra `telebind.{profile}.*` file layered under the main one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `TELEBIND_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }

    /// Accepts the long and short forms of the built-in profiles.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            _ => Self::Custom(name.to_string()),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
pub struct ConfigLoader {
    figment: Figment,
    /// Merged after every other source.
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Explicit file; disables the search.
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/telebind` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join("telebind")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Layers programmatic values above the built-in defaults.
    ///
    /// Every field of `config` is merged, so files and the environment
    /// still override it.
    pub fn merge(mut self, config: TelebindConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Forces one dotted key, e.g. `set("polling.limit", 10)`.
    ///
    /// Overrides win over files and the environment.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads and returns the configuration. Does not validate it.
    pub fn load(self) -> ConfigResult<TelebindConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: TelebindConfig = figment.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            poll_timeout_secs = config.polling.timeout_secs,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(TelebindConfig::default()));

        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    /// Merges one file, choosing the format by extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("telebind"));
        }
        paths
    }

    /// Searches `search_paths × base_names` for one format.
    ///
    /// The profile variant of a name is merged before its base file; the
    /// first base file found ends the search.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    fn load_config_files(&self, figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        #[allow(unused_mut)]
        let mut figment = figment;
        #[allow(unused_mut)]
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["telebind.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["telebind.yaml", "telebind.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!(
                paths = ?search_paths,
                "No configuration file found, using defaults"
            );
        }
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogLevel;
    use crate::poller::FailurePolicy;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_sources() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::new()
            .without_env()
            .search_path(dir.path())
            .load()
            .unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.polling.timeout_secs, 12);
        assert!(config.bot.token.is_empty());
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_explicit_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot.toml");
        fs::write(
            &path,
            r#"
[bot]
token = "42:secret"

[polling]
timeout_secs = 50
limit = 20
allowed_updates = ["message", "callback_query"]
failure_policy = "continue"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = ConfigLoader::new().without_env().file(&path).load().unwrap();

        assert_eq!(config.bot.token, "42:secret");
        assert_eq!(config.polling.timeout_secs, 50);
        assert_eq!(config.polling.limit, Some(20));
        assert_eq!(config.polling.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.bot.request_timeout_secs, 30);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        let err = ConfigLoader::new().without_env().file(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(p) if p == path));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telebind.ini");
        fs::write(&path, "token = x").unwrap();

        let err = ConfigLoader::new().without_env().file(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_is_layered_under_base_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("telebind.production.toml"),
            "[polling]\ntimeout_secs = 45\nlimit = 10\n",
        )
        .unwrap();
        fs::write(dir.path().join("telebind.toml"), "[polling]\nlimit = 50\n").unwrap();

        let config = ConfigLoader::new()
            .without_env()
            .profile("prod")
            .search_path(dir.path())
            .load()
            .unwrap();

        assert_eq!(config.polling.timeout_secs, 45);
        assert_eq!(config.polling.limit, Some(50));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_invalid_value_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telebind.toml");
        fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();

        let err = ConfigLoader::new().without_env().file(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_merge_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let mut overrides = TelebindConfig::default();
        overrides.bot.token = "7:merged".into();

        let config = ConfigLoader::new()
            .without_env()
            .search_path(dir.path())
            .merge(overrides)
            .load()
            .unwrap();

        assert_eq!(config.bot.token, "7:merged");
    }

    #[test]
    fn test_set_wins_over_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telebind.toml");
        fs::write(&path, "[bot]\ntoken = \"1:file\"\n").unwrap();

        let config = ConfigLoader::new()
            .without_env()
            .file(&path)
            .set("bot.token", "2:override")
            .load()
            .unwrap();

        assert_eq!(config.bot.token, "2:override");
    }

    #[test]
    fn test_env_overrides() {
        let dir = TempDir::new().unwrap();
        // SAFETY: no other test reads this variable.
        unsafe {
            std::env::set_var("TELEBIND_POLLING__ERROR_BACKOFF_MS", "1500");
        }
        let config = ConfigLoader::new()
            .with_env()
            .search_path(dir.path())
            .load()
            .unwrap();
        unsafe {
            std::env::remove_var("TELEBIND_POLLING__ERROR_BACKOFF_MS");
        }

        assert_eq!(config.polling.error_backoff_ms, 1500);
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
