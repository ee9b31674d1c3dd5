//! Client-credentials token exchange
//!
//! Redeems a client assertion at `{authority}/{tenant}/oauth2/v2.0/token`:
//!
//! ```text
//! POST /{tenant}/oauth2/v2.0/token
//! Content-Type: application/x-www-form-urlencoded
//!
//! client_id=..&client_assertion=..
//!   &client_assertion_type=urn:ietf:params:oauth:client-assertion-type:jwt-bearer
//!   &scope=..&grant_type=client_credentials
//! ```
//!
//! Each call is independent: `Unissued -> Issued` on success, `Unissued ->
//! Rejected` on failure. There is no retry and no caching; the caller owns
//! both policies.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::{
    AuthError, CLIENT_ASSERTION_TYPE, CLIENT_CREDENTIALS_GRANT, Result,
    config::{ExchangeConfig, token_endpoint, validate_tenant_id},
};

/// Access token response (RFC 6749 §5.1)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque bearer credential
    pub access_token: String,

    /// Token type, `Bearer` for Entra ID
    pub token_type: String,

    /// Lifetime in seconds
    #[serde(deserialize_with = "seconds_from_number_or_string")]
    pub expires_in: u64,

    /// Granted scope, when the provider echoes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Extended lifetime in seconds (Entra ID resilience extension)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_seconds_from_number_or_string"
    )]
    pub ext_expires_in: Option<u64>,
}

impl AccessToken {
    /// Whether this is a bearer token
    pub fn is_bearer(&self) -> bool {
        self.token_type.eq_ignore_ascii_case("bearer")
    }

    /// `Authorization` header value for downstream calls
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

// Manual Debug impl to prevent token exposure in logs
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("ext_expires_in", &self.ext_expires_in)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn into_seconds<E: serde::de::Error>(self) -> std::result::Result<u64, E> {
        match self {
            Self::Number(n) => Ok(n),
            Self::String(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

// Some providers send `"expires_in": "3599"`
fn seconds_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?.into_seconds()
}

fn optional_seconds_from_number_or_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrString>::deserialize(deserializer)?
        .map(NumberOrString::into_seconds)
        .transpose()
}

/// Token endpoint client
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct TokenExchanger {
    config: ExchangeConfig,
    http_client: reqwest::Client,
}

impl TokenExchanger {
    /// Create an exchanger with hardened HTTP defaults
    ///
    /// Redirects are not followed and the whole request is bounded by the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for invalid settings and
    /// [`AuthError::Transport`] when the HTTP client cannot be built.
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.timeout_duration())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Create from an existing reqwest client
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for invalid settings.
    pub fn with_client(config: ExchangeConfig, http_client: reqwest::Client) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Redeem a client assertion for an access token
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidInput`] for empty identifiers, assertion, or scope,
    ///   or a tenant id that is not a GUID or domain name
    /// - [`AuthError::TokenRequest`] with the status and verbatim body when the
    ///   provider rejects the exchange (bad assertion, missing consent, clock
    ///   skew, unknown tenant or client)
    /// - [`AuthError::Transport`] when no response arrives
    /// - [`AuthError::InvalidResponse`] when a 2xx body is not a token response
    pub async fn exchange(
        &self,
        tenant_id: &str,
        client_id: &str,
        assertion: impl AsRef<str>,
        scope: &str,
    ) -> Result<AccessToken> {
        let tenant_id = validate_tenant_id(tenant_id)?;
        // Trimmed the same way the assertion builder trims `iss`/`sub`
        let client_id = client_id.trim();
        let assertion = assertion.as_ref().trim();
        let scope = scope.trim();
        for (what, value) in [
            ("client id", client_id),
            ("client assertion", assertion),
            ("scope", scope),
        ] {
            if value.is_empty() {
                return Err(AuthError::InvalidInput {
                    reason: format!("{what} must not be empty"),
                });
            }
        }

        let endpoint = token_endpoint(&self.config.authority, tenant_id);
        let form = [
            ("client_id", client_id),
            ("client_assertion", assertion),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("scope", scope),
            ("grant_type", CLIENT_CREDENTIALS_GRANT),
        ];

        debug!(endpoint = %endpoint, scope = %scope, "Requesting access token");

        let response = self.http_client.post(&endpoint).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                tenant = %tenant_id,
                "Token endpoint rejected client assertion"
            );
            return Err(AuthError::TokenRequest {
                status: status.as_u16(),
                body,
            });
        }

        let token: AccessToken =
            serde_json::from_str(&body).map_err(|e| AuthError::InvalidResponse {
                reason: e.to_string(),
            })?;

        debug!(
            token_type = %token.token_type,
            expires_in = token.expires_in,
            "Access token issued"
        );

        Ok(token)
    }
}

impl fmt::Debug for TokenExchanger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchanger")
            .field("config", &self.config)
            .field("http_client", &"<reqwest::Client>")
            .finish()
    }
}

/// Redeem a client assertion at the default authority
///
/// # Errors
///
/// See [`TokenExchanger::exchange`].
pub async fn exchange_for_token(
    tenant_id: &str,
    client_id: &str,
    assertion: impl AsRef<str>,
    scope: &str,
) -> Result<AccessToken> {
    TokenExchanger::new(ExchangeConfig::default())?
        .exchange(tenant_id, client_id, assertion, scope)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_parsing() {
        let json = r#"{"token_type":"Bearer","expires_in":3599,"ext_expires_in":3599,"access_token":"eyJ0eXAi"}"#;
        let token: AccessToken = serde_json::from_str(json).unwrap();

        assert!(token.is_bearer());
        assert_eq!(token.expires_in, 3599);
        assert_eq!(token.ext_expires_in, Some(3599));
        assert_eq!(token.scope, None);
        assert_eq!(token.authorization_header(), "Bearer eyJ0eXAi");
    }

    #[test]
    fn test_string_expiry_accepted() {
        let json = r#"{"token_type":"bearer","expires_in":"3600","access_token":"x","scope":"https://graph.microsoft.com/.default"}"#;
        let token: AccessToken = serde_json::from_str(json).unwrap();

        assert!(token.is_bearer());
        assert_eq!(token.expires_in, 3600);
        assert_eq!(token.scope.as_deref(), Some("https://graph.microsoft.com/.default"));
    }

    #[test]
    fn test_missing_access_token_rejected() {
        let json = r#"{"token_type":"Bearer","expires_in":3600}"#;
        assert!(serde_json::from_str::<AccessToken>(json).is_err());
    }

    #[test]
    fn test_debug_redacts_access_token() {
        let token = AccessToken {
            access_token: "secret-token-value".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            scope: None,
            ext_expires_in: None,
        };
        assert!(!format!("{token:?}").contains("secret-token-value"));
    }

    #[test]
    fn test_exchanger_rejects_bad_config() {
        let config = ExchangeConfig {
            timeout_seconds: 0,
            ..ExchangeConfig::default()
        };
        assert!(matches!(
            TokenExchanger::new(config),
            Err(AuthError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_assertion_rejected_without_request() {
        // Unroutable authority: a request attempt would surface as Transport
        let exchanger =
            TokenExchanger::new(ExchangeConfig::with_authority("http://127.0.0.1:9")).unwrap();
        let err = exchanger
            .exchange("tenant", "client", "", crate::DEFAULT_SCOPE)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput { .. }));
    }
}
