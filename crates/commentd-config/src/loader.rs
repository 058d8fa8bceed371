//! Layered loading: defaults, then a file, then `COMMENTD__*` variables,
//! then caller overrides, then validation.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{CommentdConfig, ConfigError, LogFormat};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "COMMENTD";

/// Builds a [`CommentdConfig`] from its sources.
///
/// Each layer replaces what the previous one set: built-in defaults, a TOML
/// or JSON file, `PREFIX__SECTION__KEY` environment variables, and finally
/// the closure given to [`load_with`](Self::load_with).
///
/// # Example
///
/// ```no_run
/// use commentd_config::ConfigLoader;
///
/// # fn main() -> Result<(), commentd_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("commentd.toml")?
///     .with_env_prefix("COMMENTD")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: CommentdConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CommentdConfig::default(),
            env_prefix: None,
        }
    }

    /// Replaces the configuration with the contents of `path`, parsed as
    /// TOML or JSON according to its extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file does not exist, cannot be read,
    /// or contains invalid TOML/JSON (including unknown fields).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file keeps the
    /// current configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Parses `content` as `toml` or `json`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the content cannot be parsed or the format
    /// is unsupported.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::unsupported_format(format)),
        };
        Ok(self)
    }

    /// Enable environment variable overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`, for
    /// example `COMMENTD__SERVER__PORTS=8080,8081`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    ///
    /// Call before [`load`](Self::load) so the variables it defines are seen
    /// by the environment override layer.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        // A missing .env file is not an error.
        let _ = dotenvy::dotenv();
        self
    }

    /// Apply environment overrides and validate the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment variable cannot be parsed or
    /// the configuration is invalid.
    pub fn load(self) -> Result<CommentdConfig, ConfigError> {
        self.load_with(|_| {})
    }

    /// Like [`load`](Self::load), but lets `overrides` change the
    /// configuration after environment variables and before validation.
    ///
    /// Command-line arguments go through here so they win over both the
    /// file and the environment.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn load_with<F>(mut self, overrides: F) -> Result<CommentdConfig, ConfigError>
    where
        F: FnOnce(&mut CommentdConfig),
    {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: HashMap<String, String> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            self.apply_env_overrides(&prefix, &vars)?;
        }

        overrides(&mut self.config);
        self.config.validate()?;

        Ok(self.config)
    }

    fn parse_file(content: &str, path: &Path) -> Result<CommentdConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            other => Err(ConfigError::unsupported_format(other.unwrap_or_default())),
        }
    }

    fn apply_env_overrides(
        &mut self,
        prefix: &str,
        vars: &HashMap<String, String>,
    ) -> Result<(), ConfigError> {
        for (key, value) in vars {
            self.apply_env_var(key, value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(key_without_prefix) = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
        else {
            // Shares the prefix but not the PREFIX__ separator, e.g. COMMENTD_HOME.
            return Ok(());
        };

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            ["SERVER", "BIND_ADDR"] => {
                self.config.server.bind_addr = value.to_string();
            }
            ["SERVER", "PORTS"] => {
                self.config.server.ports = parse_ports(value)
                    .ok_or_else(|| ConfigError::env_var(key, "expected port list"))?;
            }
            ["SERVER", "BUFFER_CAPACITY"] => {
                self.config.server.buffer_capacity = value
                    .parse()
                    .map_err(|_| ConfigError::env_var(key, "expected integer"))?;
            }
            ["SERVER", "LISTEN_BACKLOG"] => {
                self.config.server.listen_backlog = value
                    .parse()
                    .map_err(|_| ConfigError::env_var(key, "expected integer"))?;
            }

            ["STORAGE", "COMMENT_DIR"] => {
                self.config.storage.comment_dir = PathBuf::from(value);
            }
            ["STORAGE", "LOG_DIR"] => {
                self.config.storage.log_dir = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }

            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                self.config.telemetry.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_var(key, "expected boolean"))?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                self.config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                self.config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_var(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "ANSI_ENABLED"] => {
                self.config.telemetry.logging.ansi_enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_var(key, "expected boolean"))?;
            }

            ["TELEMETRY", "METRICS", "ENABLED"] => {
                self.config.telemetry.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_var(key, "expected boolean"))?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => {
                self.config.telemetry.metrics.addr = value.to_string();
            }

            // Unknown key - ignore
            _ => {}
        }

        Ok(())
    }
}

/// Parses a comma or whitespace separated port list.
pub fn parse_ports(s: &str) -> Option<Vec<u16>> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse().ok())
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
