//! Error types for route loading and compilation.
//!
//! Every variant here is a startup failure: configuration problems are caught
//! while the route table is built and never surface while serving.

use std::path::PathBuf;

/// Errors raised while loading or compiling route definitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The route file could not be read.
    #[error("failed to read route file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The route file is not a valid JSON array of route entries.
    #[error("failed to parse route file {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The route file is not a valid YAML list of route entries.
    #[error("failed to parse route file {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A latency offset does not have the shape its mode expects.
    #[error(transparent)]
    Shape(#[from] ConfigShapeError),

    /// Status code outside the 100-599 range.
    #[error("route {method} {path}: invalid status code {status}")]
    InvalidStatus {
        method: String,
        path: String,
        status: u16,
    },

    /// Header name or value that cannot be sent over HTTP.
    #[error("route {method} {path}: invalid header `{name}`: {reason}")]
    InvalidHeader {
        method: String,
        path: String,
        name: String,
        reason: String,
    },

    /// Path pattern the router cannot accept.
    #[error("route {method} {path}: {reason}")]
    InvalidPath {
        method: String,
        path: String,
        reason: String,
    },
}

/// A `response_offset` that does not match its `response_offset_mode`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("route {method} {path}: response_offset_mode {mode:?} {reason}, got {offset}")]
pub struct ConfigShapeError {
    pub method: String,
    pub path: String,
    pub mode: String,
    pub reason: String,
    /// The offending payload, rendered as JSON.
    pub offset: String,
}

/// Errors raised while resolving process settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// An environment override that cannot be parsed.
    #[error("environment variable {name}={value:?} is not a valid {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}
