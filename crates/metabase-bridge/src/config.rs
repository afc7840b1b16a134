//! Configuration for the Metabase bridge

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

use crate::error::ConfigError;

/// Overall request timeout when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Header the credential is sent in when none is configured
pub const DEFAULT_AUTH_HEADER: &str = "Cookie";

/// Opaque authentication credential (session cookie or header value)
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for attaching to a request
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Immutable bridge configuration, captured once at startup
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Metabase database every query targets
    pub database_id: i64,

    /// Root of the Metabase API, without trailing slash
    pub base_url: String,

    /// Credential attached verbatim to every request
    pub credential: Credential,

    /// Header the credential is sent in
    pub auth_header: HeaderName,

    /// Overall timeout, from connect to the last body byte
    pub timeout: Duration,
}

/// Builder for BridgeConfig with validation
#[derive(Debug, Clone, Default)]
pub struct BridgeConfigBuilder {
    database_id: Option<i64>,
    base_url: Option<String>,
    credential: Option<Credential>,
    auth_header: Option<String>,
    timeout: Option<Duration>,
}

impl BridgeConfig {
    /// Create a new builder instance
    #[inline]
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::new()
    }

    /// Full URL of the dataset endpoint
    pub fn dataset_url(&self) -> String {
        format!("{}/api/dataset", self.base_url)
    }

    /// Header value carrying the credential, marked sensitive
    pub fn auth_header_value(&self) -> Result<HeaderValue, ConfigError> {
        if self.credential.expose().is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        let mut value = HeaderValue::from_str(self.credential.expose())
            .map_err(|_| ConfigError::InvalidCredential)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl BridgeConfigBuilder {
    /// Create a new builder
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database ID (required)
    #[inline]
    pub fn database_id(mut self, id: i64) -> Self {
        self.database_id = Some(id);
        self
    }

    /// Set the Metabase base URL (required)
    #[inline]
    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the authentication credential (required)
    #[inline]
    pub fn credential<S: Into<String>>(mut self, credential: S) -> Self {
        self.credential = Some(Credential::new(credential));
        self
    }

    /// Override the header the credential is sent in
    #[inline]
    pub fn auth_header<S: Into<String>>(mut self, name: S) -> Self {
        self.auth_header = Some(name.into());
        self
    }

    /// Set the overall request timeout (1-300 seconds)
    #[inline]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the overall request timeout in seconds (1-300 seconds)
    #[inline]
    pub fn timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout = Some(Duration::from_secs(seconds));
        self
    }

    /// Build the configuration with validation
    pub fn build(self) -> Result<BridgeConfig, ConfigError> {
        let database_id = self.database_id.ok_or(ConfigError::MissingDatabaseId)?;

        let base_url = self
            .base_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;
        let base_url = validate_base_url(base_url.trim())?;

        let credential = self
            .credential
            .filter(|c| !c.expose().is_empty())
            .ok_or(ConfigError::MissingCredential)?;
        HeaderValue::from_str(credential.expose()).map_err(|_| ConfigError::InvalidCredential)?;

        let header = self
            .auth_header
            .unwrap_or_else(|| DEFAULT_AUTH_HEADER.to_string());
        let auth_header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|_| ConfigError::InvalidHeaderName(header.clone()))?;

        let timeout = self
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let timeout_secs = timeout.as_secs();
        if !(1..=300).contains(&timeout_secs) {
            return Err(ConfigError::InvalidTimeout(timeout_secs));
        }

        Ok(BridgeConfig {
            database_id,
            base_url,
            credential,
            auth_header,
            timeout,
        })
    }
}

fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let parsed = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https".to_string()));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("must not carry a query or fragment".to_string()));
    }

    Ok(raw.trim_end_matches('/').to_string())
}
