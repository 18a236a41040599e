//! Build service client configuration.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.dockyard.dev";

/// Connection settings for the hosted build service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the image build service, e.g. `https://api.dockyard.dev/images/v3`.
    pub build_service_url: String,
    pub api_key: Option<String>,
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
}

impl ClientConfig {
    /// Read settings from `DOCKYARD_*` environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let api_url = get("DOCKYARD_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let build_service_url =
            get("DOCKYARD_BUILD_SERVICE").unwrap_or_else(|| default_build_service_url(&api_url));

        Url::parse(&build_service_url).map_err(|e| ConfigError::InvalidValue {
            field: "build service url".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            build_service_url: build_service_url.trim_end_matches('/').to_string(),
            api_key: get("DOCKYARD_API_KEY").or_else(|| get("DOCKYARD_PAT")),
            organization_id: get("DOCKYARD_ORGANIZATION_ID"),
            project_id: get("DOCKYARD_PROJECT_ID"),
        })
    }
}

/// Build service URL derived from an API URL.
pub fn default_build_service_url(api_url: &str) -> String {
    format!("{}/images/v3", api_url.trim_end_matches('/'))
}
