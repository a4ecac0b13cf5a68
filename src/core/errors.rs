//! HG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::PathBuf;

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HgError>;

/// Top-level error type for habitgrid.
#[derive(Debug, Error)]
pub enum HgError {
    #[error("[HG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[HG-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[HG-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[HG-2001] unknown section '{title}' ({period})")]
    UnknownSection { title: String, period: &'static str },

    #[error("[HG-2002] unknown tracker '{name}' ({period})")]
    UnknownTracker { name: String, period: &'static str },

    #[error("[HG-2003] duplicate {what}: {details}")]
    Duplicate {
        what: &'static str,
        details: String,
    },

    #[error("[HG-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[HG-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[HG-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[HG-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[HG-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl HgError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "HG-1001",
            Self::MissingConfig { .. } => "HG-1002",
            Self::ConfigParse { .. } => "HG-1003",
            Self::UnknownSection { .. } => "HG-2001",
            Self::UnknownTracker { .. } => "HG-2002",
            Self::Duplicate { .. } => "HG-2003",
            Self::Serialization { .. } => "HG-2101",
            Self::Sql { .. } => "HG-2102",
            Self::Io { .. } => "HG-3002",
            Self::ChannelClosed { .. } => "HG-3003",
            Self::Runtime { .. } => "HG-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::ChannelClosed { .. } | Self::Sql { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for HgError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for HgError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HgError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
