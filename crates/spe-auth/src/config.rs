//! Configuration for assertion building and token exchange

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AuthError, DEFAULT_ASSERTION_LIFETIME_SECONDS, DEFAULT_AUTHORITY, Result};

/// Largest `exp` a JWT verifier can represent (signed 64-bit NumericDate)
pub const MAX_NUMERIC_DATE: u64 = i64::MAX as u64;

/// Client assertion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionConfig {
    /// Identity provider authority, e.g. `https://login.microsoftonline.com`
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Assertion lifetime in seconds (`exp - nbf`), default 3600
    ///
    /// Some identity providers cap the window; shorten it here instead of
    /// relying on the provider to clamp.
    #[serde(default = "default_lifetime_seconds")]
    pub lifetime_seconds: u64,
}

impl AssertionConfig {
    /// Configuration for a non-default authority (sovereign cloud, test server)
    pub fn with_authority(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            ..Self::default()
        }
    }

    /// Override the assertion lifetime
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime_seconds = lifetime.as_secs();
        self
    }

    /// Check that a built assertion will satisfy `exp > nbf`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for an empty authority or a lifetime
    /// shorter than one second or beyond [`MAX_NUMERIC_DATE`].
    pub fn validate(&self) -> Result<()> {
        if self.lifetime_seconds == 0 {
            return Err(AuthError::Configuration {
                reason: "assertion lifetime must be at least one second".to_string(),
            });
        }
        if self.lifetime_seconds > MAX_NUMERIC_DATE {
            return Err(AuthError::Configuration {
                reason: format!(
                    "assertion lifetime of {} seconds does not fit a JWT NumericDate",
                    self.lifetime_seconds
                ),
            });
        }
        validate_authority(&self.authority)
    }
}

impl Default for AssertionConfig {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            lifetime_seconds: default_lifetime_seconds(),
        }
    }
}

/// Token endpoint transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Identity provider authority; must match the assertion's authority
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// `User-Agent` header sent to the token endpoint
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ExchangeConfig {
    /// Configuration for a non-default authority
    pub fn with_authority(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            ..Self::default()
        }
    }

    /// Override the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs();
        self
    }

    /// Request timeout as a [`Duration`]
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Check the authority and timeout
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for an unusable authority or a
    /// zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(AuthError::Configuration {
                reason: "token request timeout must be at least one second".to_string(),
            });
        }
        validate_authority(&self.authority)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

/// Token endpoint of a tenant: `{authority}/{tenant}/oauth2/v2.0/token`
///
/// This is both the assertion `aud` and the exchange URL.
pub fn token_endpoint(authority: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority.trim_end_matches('/'),
        tenant_id.trim()
    )
}

/// Check a tenant id before it becomes a URL path segment
///
/// Tenants are a GUID or a verified domain name, so only ASCII letters,
/// digits, `.` and `-` are accepted. Surrounding whitespace is trimmed.
///
/// # Errors
///
/// Returns [`AuthError::InvalidInput`] for an empty tenant or any other
/// character.
pub fn validate_tenant_id(tenant_id: &str) -> Result<&str> {
    let tenant_id = tenant_id.trim();
    if tenant_id.is_empty() {
        return Err(AuthError::InvalidInput {
            reason: "tenant id must not be empty".to_string(),
        });
    }
    if let Some(c) = tenant_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
    {
        return Err(AuthError::InvalidInput {
            reason: format!(
                "tenant id '{tenant_id}' contains '{c}'; expected a GUID or domain name"
            ),
        });
    }
    Ok(tenant_id)
}

fn validate_authority(authority: &str) -> Result<()> {
    let parsed = url::Url::parse(authority).map_err(|e| AuthError::Configuration {
        reason: format!("invalid authority '{authority}': {e}"),
    })?;

    match parsed.scheme() {
        "https" | "http" => Ok(()),
        other => Err(AuthError::Configuration {
            reason: format!("authority scheme must be http or https, got '{other}'"),
        }),
    }
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

fn default_lifetime_seconds() -> u64 {
    DEFAULT_ASSERTION_LIFETIME_SECONDS
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("spe-auth/", env!("CARGO_PKG_VERSION")).to_string()
}
