//! Configuration for the mock server.
//!
//! Defines the route entries read from the route file and the process
//! settings resolved from flags and environment variables.

use crate::error::{ConfigError, SettingsError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment override for the route file path.
pub const ENV_ROUTES_FILE: &str = "MOCK_ROUTES_FILE";
/// Environment override for the bind host.
pub const ENV_HOST: &str = "MOCK_SERVER_HOST";
/// Environment override for the bind port.
pub const ENV_PORT: &str = "MOCK_SERVER_PORT";
/// Environment override for verbose logging.
pub const ENV_VERBOSE: &str = "MOCK_SERVER_VERBOSE";

pub const DEFAULT_ROUTES_FILE: &str = "./example.routes.json";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 1080;

/// The full contents of a route file: an ordered list of entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteFile {
    pub routes: Vec<RouteEntry>,
}

impl RouteFile {
    /// Load route definitions from a file.
    ///
    /// Files ending in `.yaml` or `.yml` are read as YAML, everything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        } else {
            Self::from_json(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    /// Parse route definitions from a JSON array.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// A single declared mock route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Path pattern, e.g. `/users/{id}` or `/users/:id`
    pub path: String,

    /// HTTP method, matched case-sensitively against the supported set
    pub method: String,

    /// Response status (0 = 200)
    #[serde(default)]
    pub status_code: u16,

    /// Response headers
    #[serde(default)]
    pub header: HashMap<String, String>,

    /// Response body, written as JSON
    #[serde(default)]
    pub body: Option<serde_json::Value>,

    /// Name of the latency policy ("" = constant)
    #[serde(default)]
    pub response_offset_mode: String,

    /// Policy-specific latency payload
    #[serde(default)]
    pub response_offset: Option<serde_json::Value>,
}

impl RouteEntry {
    /// Create a GET/POST/... entry with no headers, body or latency.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            status_code: 0,
            header: HashMap::new(),
            body: None,
            response_offset_mode: String::new(),
            response_offset: None,
        }
    }
}

/// Resolved process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub routes_file: PathBuf,
    pub host: String,
    pub port: u16,
    pub verbose: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            routes_file: PathBuf::from(DEFAULT_ROUTES_FILE),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            verbose: false,
        }
    }
}

impl ServerSettings {
    /// Apply environment overrides on top of flag values.
    ///
    /// A variable wins over its flag when it is set and non-empty. `lookup`
    /// is normally `std::env::var(..).ok()`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(routes_file) = get(ENV_ROUTES_FILE) {
            self.routes_file = PathBuf::from(routes_file);
        }
        if let Some(host) = get(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = get(ENV_PORT) {
            self.port = port.trim().parse().map_err(|_| SettingsError::InvalidEnv {
                name: ENV_PORT,
                value: port.clone(),
                expected: "port number",
            })?;
        }
        if let Some(verbose) = get(ENV_VERBOSE) {
            self.verbose = parse_bool(&verbose).ok_or(SettingsError::InvalidEnv {
                name: ENV_VERBOSE,
                value: verbose.clone(),
                expected: "boolean",
            })?;
        }

        Ok(self)
    }

    /// Address the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
