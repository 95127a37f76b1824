//! Client configuration
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional file, then `TUTORA_*` environment variables (`__` separates
//! nested keys, e.g. `TUTORA_ENDPOINTS__REFRESH=/auth/refresh`).

use crate::error::{CoreError, CoreResult};
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "TUTORA";

/// Deployment flag selecting which backend URL is used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
}

/// Settings shared by the HTTP client and the front-end session state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Which of the two backend URLs to talk to
    pub environment: Environment,

    /// Backend used when `environment = "production"`
    pub production_url: String,

    /// Backend used otherwise
    pub development_url: String,

    /// Request timeout in seconds (ignored on wasm)
    pub timeout_secs: u64,

    pub user_agent: String,

    /// Backend endpoint paths
    pub endpoints: EndpointConfig,

    /// Sign-in page per marketplace area
    pub sign_in_routes: SignInRoutes,

    /// Directory for the persisted session file; platform data dir when unset
    pub storage_dir: Option<PathBuf>,
}

/// Paths of the authentication endpoints, relative to the base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub refresh: String,
    pub logout: String,
    pub login: String,
    pub me: String,
    /// Path of the real-time notification socket
    pub socket_path: String,
}

/// Where each area sends sessions that fail its guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignInRoutes {
    pub student: String,
    pub tutor: String,
    pub admin: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            production_url: "https://api.tutora.dev".to_string(),
            development_url: "http://localhost:5000".to_string(),
            timeout_secs: 30,
            user_agent: format!("tutora-client/{}", env!("CARGO_PKG_VERSION")),
            endpoints: EndpointConfig::default(),
            sign_in_routes: SignInRoutes::default(),
            storage_dir: None,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            refresh: "/refresh".to_string(),
            logout: "/logout".to_string(),
            login: "/login".to_string(),
            me: "/me".to_string(),
            socket_path: "/".to_string(),
        }
    }
}

impl Default for SignInRoutes {
    fn default() -> Self {
        Self {
            student: "/student/login".to_string(),
            tutor: "/tutor/login".to_string(),
            admin: "/admin/login".to_string(),
        }
    }
}

impl SignInRoutes {
    /// Sign-in route for an area
    pub fn for_area(&self, area: Role) -> &str {
        match area {
            Role::Student => &self.student,
            Role::Tutor => &self.tutor,
            Role::Admin => &self.admin,
        }
    }
}

impl ClientSettings {
    /// Base URL picked by the environment flag, without a trailing slash
    pub fn base_url(&self) -> &str {
        let url = match self.environment {
            Environment::Production => &self.production_url,
            Environment::Development => &self.development_url,
        };
        url.trim_end_matches('/')
    }

    /// Load settings from defaults and the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if an environment override cannot be parsed
    pub fn from_env() -> CoreResult<Self> {
        Self::load(None, None)
    }

    /// Load settings from a file, with environment overrides on top
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        Self::load(Some(path.as_ref()), None)
    }

    /// Layer defaults, an optional file and environment overrides
    ///
    /// `env` replaces the process environment when given, which keeps
    /// callers (and tests) from mutating global state.
    ///
    /// # Errors
    ///
    /// Returns an error if any source cannot be read or deserialized
    pub fn load(path: Option<&Path>, env: Option<HashMap<String, String>>) -> CoreResult<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let settings: Self = settings.try_deserialize()?;
        settings.validate()?;
        tracing::debug!(
            environment = ?settings.environment,
            base_url = settings.base_url(),
            "Loaded client settings"
        );
        Ok(settings)
    }

    /// Check the selected base URL and endpoint paths
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a base URL that is not
    /// absolute http(s), or an endpoint path without a leading `/`
    pub fn validate(&self) -> CoreResult<()> {
        let url = url::Url::parse(self.base_url())
            .map_err(|e| CoreError::invalid_config(format!("base URL {}: {e}", self.base_url())))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::invalid_config(format!(
                "base URL must be http or https, got {}",
                url.scheme()
            )));
        }

        let endpoints = &self.endpoints;
        for (name, path) in [
            ("refresh", &endpoints.refresh),
            ("logout", &endpoints.logout),
            ("login", &endpoints.login),
            ("me", &endpoints.me),
            ("socket_path", &endpoints.socket_path),
        ] {
            if !path.starts_with('/') {
                return Err(CoreError::invalid_config(format!(
                    "endpoint {name} must start with '/', got {path:?}"
                )));
            }
        }
        Ok(())
    }

    /// Directory holding the persisted session
    #[cfg(not(target_arch = "wasm32"))]
    pub fn resolved_storage_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage_dir {
            return dir.clone();
        }

        directories::ProjectDirs::from("dev", "Tutora", "Tutora").map_or_else(
            || {
                tracing::warn!("Failed to determine platform data directory, using ./data");
                PathBuf::from("./data")
            },
            |dirs| dirs.data_dir().to_path_buf(),
        )
    }
}
