//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`hookwire.{profile}.toml`)
//! 3. Main config file (`hookwire.toml` or `config.toml`)
//! 4. Environment variables (`HOOKWIRE_*`, plus `MAKE_WEBHOOK_URL`)
//! 5. Programmatic overrides ([`ConfigLoader::set`])
//!
//! Files are searched in the current directory and in `hookwire/` under the
//! user config directory; the first directory holding a main file wins.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `hookwire.toml`, `config.toml`
//! - `yaml-config`: `hookwire.yaml`, `hookwire.yml`, `config.yaml`, `config.yml`
//!
//! # Environment Variable Mapping
//!
//! Variables use the `HOOKWIRE_` prefix with `__` as the nesting separator:
//!
//! - `HOOKWIRE_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `HOOKWIRE_AUTOMATION__RETRY_ATTEMPTS=5` → `automation.retry_attempts = 5`
//! - `MAKE_WEBHOOK_URL=https://…` → `legacy.webhook_url`
//!
//! ```rust,ignore
//! use hookwire_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
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
use tracing::{debug, info, trace};

use super::error::{ConfigError, ConfigResult};
use super::schema::HookwireConfig;

/// Environment variable holding the legacy task webhook URL.
pub const LEGACY_URL_ENV: &str = "MAKE_WEBHOOK_URL";

const ENV_PREFIX: &str = "HOOKWIRE_";
const PROFILE_ENV: &str = "HOOKWIRE_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Returns the profile name as used in file names.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `dev` and `prod` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `HOOKWIRE_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
pub struct ConfigLoader {
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
    defaults: HookwireConfig,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with the profile taken from the environment.
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
            defaults: HookwireConfig::default(),
            overrides: Figment::new(),
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path. Setting any path replaces the default locations.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables environment variables (the default).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Uses `config` in place of the built-in defaults.
    pub fn defaults(mut self, config: HookwireConfig) -> Self {
        self.defaults = config;
        self
    }

    /// Sets a single value on top of every other source.
    ///
    /// `key` is a dotted path such as `"logging.output"`.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads and returns the configuration.
    ///
    /// The result is not validated; see
    /// [`validate_config`](super::validate_config).
    pub fn load(self) -> ConfigResult<HookwireConfig> {
        let profile = self.profile.clone();
        let config: HookwireConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            parsers = config.parsers.len(),
            webhooks = config.webhooks.len(),
            legacy = config.legacy.webhook_url.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(&self.defaults));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment
                .merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"))
                .merge(
                    Env::raw()
                        .only(&[LEGACY_URL_ENV])
                        .map(|_| "legacy.webhook_url".into()),
                );
        }

        Ok(figment.merge(self.overrides))
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
            paths.push(config_dir.join("hookwire"));
        }
        paths
    }

    /// Merges the profile file and then the main file from the first search
    /// path that has a main file.
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
        for dir in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };
                let base_path = dir.join(base_name);
                if !base_path.exists() {
                    continue;
                }

                let profile_path = dir.join(format!("{stem}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile configuration");
                    figment = merge_fn(figment, &profile_path);
                }
                info!(path = %base_path.display(), "Loading configuration file");
                return (merge_fn(figment, &base_path), true);
            }
        }
        (figment, false)
    }

    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        #[allow(unused_variables)]
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["hookwire.toml", "config.toml"],
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
                &["hookwire.yaml", "hookwire.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            debug!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Merges one file, dispatching on its extension.
fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<HookwireConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<HookwireConfig> {
    ConfigLoader::new().file(path).load()
}
