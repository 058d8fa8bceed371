//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why a configuration could not be produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The `--config` file does not exist.
    #[error("config file {path} does not exist")]
    FileNotFound {
        /// Path that was given.
        path: PathBuf,
    },

    /// The config file exists but could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Only `.toml` and `.json` are understood.
    #[error("unsupported config format {format:?}")]
    UnsupportedFormat {
        /// The extension or format name that was given.
        format: String,
    },

    /// Malformed TOML, or a field commentd does not know.
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON, or a field commentd does not know.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// A `COMMENTD__*` variable whose value does not parse.
    #[error("environment variable {var}: {reason}")]
    EnvVar {
        /// Variable name.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// A value that parsed but cannot be used, e.g. a duplicate port.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the field, e.g. `server.ports`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub(crate) fn env_var(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvVar {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`InvalidValue`](Self::InvalidValue) error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The offending field for value errors, if known.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { field, .. } => Some(field),
            Self::EnvVar { var, .. } => Some(var),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = ConfigError::file_not_found("/etc/commentd/commentd.toml");
        assert_eq!(
            err.to_string(),
            "config file /etc/commentd/commentd.toml does not exist"
        );

        let err = ConfigError::invalid_value("server.ports", "duplicate port 8080");
        assert_eq!(
            err.to_string(),
            "invalid configuration value for server.ports: duplicate port 8080"
        );

        let err = ConfigError::unsupported_format("yaml");
        assert_eq!(err.to_string(), "unsupported config format \"yaml\"");
    }

    #[test]
    fn test_field() {
        let err = ConfigError::env_var("COMMENTD__SERVER__PORTS", "expected port list");
        assert_eq!(err.field(), Some("COMMENTD__SERVER__PORTS"));

        let err = ConfigError::invalid_value("storage.comment_dir", "must not be empty");
        assert_eq!(err.field(), Some("storage.comment_dir"));

        assert_eq!(ConfigError::file_not_found("x.toml").field(), None);
    }
}
