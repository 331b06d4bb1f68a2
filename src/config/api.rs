use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Query API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Page size used when a request omits `limit`.
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    /// Largest `limit` a request may ask for.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl ApiConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size <= 0 {
            return Err(ConfigError::Validation(
                "api.default_page_size must be greater than 0".into(),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Validation(
                "api.default_page_size cannot exceed api.max_page_size".into(),
            ));
        }
        Ok(())
    }
}

fn default_page_size() -> i64 {
    100
}

fn default_max_page_size() -> i64 {
    1000
}
