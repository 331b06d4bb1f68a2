use std::{net::IpAddr, time::Duration};

use http::{HeaderValue, Method};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::ConfigError;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body size limit in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            timeout_secs: default_timeout(),
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    1024 * 1024 // 1 MB
}

fn default_timeout() -> u64 {
    30
}

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Enable CORS.
    #[serde(default)]
    pub enabled: bool,

    /// Allowed origins. Use ["*"] for any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Max age for preflight cache in seconds.
    #[serde(default = "default_cors_max_age")]
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: vec![],
            max_age_secs: default_cors_max_age(),
        }
    }
}

fn default_cors_max_age() -> u64 {
    3600
}

impl CorsConfig {
    /// Build a CorsLayer for the read-only API.
    ///
    /// Returns None if CORS is disabled. Origins that are not valid header
    /// values are skipped with a warning.
    pub fn into_layer(self) -> Option<CorsLayer> {
        if !self.enabled {
            tracing::debug!("CORS is disabled");
            return None;
        }

        let allow_origin = if self.allowed_origins.iter().any(|o| o == "*") {
            tracing::warn!("CORS: allowing any origin");
            AllowOrigin::from(Any)
        } else {
            let origins: Vec<HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "CORS: skipping invalid origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(origins)
        };

        Some(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_methods([Method::GET])
                .max_age(Duration::from_secs(self.max_age_secs)),
        )
    }
}
