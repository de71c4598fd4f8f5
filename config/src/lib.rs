//! Configuration loading for Gatehouse.
//!
//! `~/.gatehouse/config.toml` (or the file named by `GATEHOUSE_CONFIG`) is
//! deserialized into the raw `Option` structs below and then resolved into
//! [`Settings`], where defaults are applied and values validated.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

use gatehouse_core::{FeatureFlags, GateSettings};
use gatehouse_types::{BasePath, Feature};

pub const CONFIG_ENV: &str = "GATEHOUSE_CONFIG";
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DATA_DIR: &str = ".gatehouse";

const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatehouseConfig {
    pub server: Option<ServerConfig>,
    pub store: Option<StoreConfig>,
    pub theme: Option<ThemeConfig>,
    pub features: Option<FeaturesConfig>,
    pub urls: Option<UrlsConfig>,
    pub app: Option<AppConfig>,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub base_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ThemeConfig {
    /// Theme directory. The built-in theme is used when unset.
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_true")]
    pub admin_console: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            admin_console: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UrlsConfig {
    pub admin: Option<String>,
    pub local_admin: Option<String>,
    pub base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub product_name: Option<String>,
    pub admin_creation_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    pub file: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config at {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path,
        }
    }
}

/// Feature switches resolved from `[features]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub admin_console: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            admin_console: true,
        }
    }
}

impl FeatureFlags for Features {
    fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::AdminConsole => self.admin_console,
        }
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: SocketAddr,
    pub base_path: BasePath,
    pub store_path: PathBuf,
    pub theme_dir: Option<PathBuf>,
    pub features: Features,
    pub gate: GateSettings,
    pub log_file: Option<PathBuf>,
}

impl GatehouseConfig {
    /// Load the config file from [`config_path`]. `Ok(None)` when there is no
    /// file (or no home directory to look in).
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Apply defaults and validate. `origin` is only used in error messages.
    pub fn resolve(self, origin: &Path) -> Result<Settings, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            path: origin.to_path_buf(),
            reason,
        };

        let server = self.server.unwrap_or_default();
        let bind_raw = server
            .bind
            .map_or_else(|| DEFAULT_BIND.to_string(), |raw| expand_env_vars(&raw));
        let bind: SocketAddr = bind_raw
            .trim()
            .parse()
            .map_err(|e| invalid(format!("server.bind {bind_raw:?}: {e}")))?;

        let base_path = match server.base_path {
            Some(raw) => BasePath::parse(&expand_env_vars(&raw))
                .map_err(|e| invalid(format!("server.base_path: {e}")))?,
            None => BasePath::root(),
        };

        let store_path = self
            .store
            .and_then(|store| store.path)
            .map_or_else(default_store_path, |raw| expand_path(&raw));

        let theme_dir = self
            .theme
            .and_then(|theme| theme.dir)
            .map(|raw| expand_path(&raw));

        let features = self.features.unwrap_or_default();
        let features = Features {
            admin_console: features.admin_console,
        };

        let defaults = GateSettings::default();
        let urls = self.urls.unwrap_or_default();
        let app = self.app.unwrap_or_default();
        let non_empty = |value: Option<String>, key: &str| -> Result<Option<String>, ConfigError> {
            match value.map(|raw| expand_env_vars(&raw)) {
                Some(value) if value.trim().is_empty() => {
                    Err(invalid(format!("{key} must not be empty")))
                }
                other => Ok(other),
            }
        };

        let gate = GateSettings {
            admin_url: non_empty(urls.admin, "urls.admin")?.unwrap_or(defaults.admin_url),
            local_admin_url: non_empty(urls.local_admin, "urls.local_admin")?.unwrap_or_else(
                || {
                    format!(
                        "http://localhost:{}{}",
                        bind.port(),
                        base_path.with_trailing_slash()
                    )
                },
            ),
            base_url: non_empty(urls.base, "urls.base")?.unwrap_or(defaults.base_url),
            product_name: non_empty(app.product_name, "app.product_name")?
                .unwrap_or(defaults.product_name),
            admin_creation_message: non_empty(
                app.admin_creation_message,
                "app.admin_creation_message",
            )?
            .unwrap_or(defaults.admin_creation_message),
            resources_path: defaults.resources_path,
        };

        let log_file = self
            .log
            .and_then(|log| log.file)
            .map(|raw| expand_path(&raw));

        Ok(Settings {
            bind,
            base_path,
            store_path,
            theme_dir,
            features,
            gate,
            log_file,
        })
    }
}

impl Settings {
    /// Load and resolve, falling back to defaults when there is no file.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path().unwrap_or_else(|| PathBuf::from(DATA_DIR).join("config.toml"));
        GatehouseConfig::load_from(&path)?
            .unwrap_or_default()
            .resolve(&path)
    }
}

/// `GATEHOUSE_CONFIG` if set, else `~/.gatehouse/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(explicit));
    }
    dirs::home_dir().map(|home| home.join(DATA_DIR).join("config.toml"))
}

fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .map_or_else(|| PathBuf::from(DATA_DIR), |home| home.join(DATA_DIR))
        .join("accounts.db")
}

/// Expand `${VAR}` references and a leading `~/`.
fn expand_path(raw: &str) -> PathBuf {
    let expanded = expand_env_vars(raw);
    if let Some(rest) = expanded.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(expanded)
}

/// Replace `${VAR}` with the variable's value. Missing variables become
/// empty; `${}` and an unclosed `${` are kept as written.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                out.push_str(&env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            Some(_) => {
                out.push_str("${}");
                rest = &after[1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
