//! Credential and region configuration.
//!
//! Credentials come from the environment (or any key lookup, for tests) and
//! are resolved on demand. A token or subdomain that is missing or blank
//! yields [`ConfigError::NotConfigured`]; there is no partial state.

use std::fmt;
use std::str::FromStr;

use log::warn;

/// Environment variable holding the API bearer token.
pub const API_TOKEN_VAR: &str = "SUPEROPS_API_TOKEN";

/// Environment variable holding the tenant subdomain.
pub const SUBDOMAIN_VAR: &str = "SUPEROPS_SUBDOMAIN";

/// Environment variable selecting the data-center region.
pub const REGION_VAR: &str = "SUPEROPS_REGION";

/// Environment variable overriding the GraphQL endpoint.
pub const API_URL_VAR: &str = "SUPEROPS_API_URL";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("SuperOps credentials not configured. Set SUPEROPS_API_TOKEN and SUPEROPS_SUBDOMAIN environment variables.")]
    NotConfigured,

    #[error("Invalid region '{0}'. Valid regions: us, eu")]
    InvalidRegion(String),
}

/// SuperOps data-center region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Region {
    #[default]
    Us,
    Eu,
}

impl Region {
    pub const ALL: [Region; 2] = [Region::Us, Region::Eu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
        }
    }

    /// Base GraphQL endpoint for this region.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Region::Us => "https://api.superops.ai/msp",
            Region::Eu => "https://euapi.superops.ai/msp",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Region::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ConfigError::InvalidRegion(trimmed.to_string()))
    }
}

/// Resolved SuperOps credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_token: String,
    pub subdomain: String,
    pub region: Region,
    /// Explicit endpoint; the region endpoint is used when `None`.
    pub endpoint: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_token", &"<redacted>")
            .field("subdomain", &self.subdomain)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Credentials {
    pub fn new(api_token: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            subdomain: subdomain.into(),
            region: Region::default(),
            endpoint: None,
        }
    }

    /// Resolve credentials from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve credentials through an arbitrary key lookup.
    ///
    /// An unrecognised region is not fatal: it falls back to the default
    /// region with a warning.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let (Some(api_token), Some(subdomain)) = (non_blank(API_TOKEN_VAR), non_blank(SUBDOMAIN_VAR))
        else {
            return Err(ConfigError::NotConfigured);
        };

        let region = match non_blank(REGION_VAR) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}, using '{}'", e, Region::default());
                Region::default()
            }),
            None => Region::default(),
        };

        Ok(Self {
            api_token,
            subdomain,
            region,
            endpoint: non_blank(API_URL_VAR),
        })
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(self.region.endpoint())
    }
}
