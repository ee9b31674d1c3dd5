//! Client assertion construction (RFC 7523)
//!
//! A client assertion is a short-lived RS256 JWT the application signs with
//! its certificate's private key and presents instead of a client secret:
//!
//! ```text
//! base64url({"alg":"RS256","typ":"JWT","x5t":"<sha1 thumbprint>"})
//!   . base64url({"aud":"<token endpoint>","iss":"<client>","sub":"<client>","jti":"<uuid>","nbf":<now>,"exp":<now+lifetime>})
//!   . base64url(RSASSA-PKCS1-v1_5-SHA256(header "." payload))
//! ```
//!
//! The header and payload are compact JSON (no whitespace) because the
//! verifier checks the signature over exactly these bytes. Every assertion has
//! a fresh `jti` and fresh timestamps; never reuse one across requests.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    ASSERTION_ALGORITHM, ASSERTION_TYPE, AuthError, Result,
    config::{AssertionConfig, MAX_NUMERIC_DATE, token_endpoint, validate_tenant_id},
    credential::CertificateCredential,
};

/// JOSE header of a client assertion
///
/// Field order is the serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionHeader {
    /// Always `RS256`
    pub alg: String,
    /// Always `JWT`
    pub typ: String,
    /// base64url SHA-1 thumbprint of the signing certificate
    pub x5t: String,
}

/// Claims of a client assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Token endpoint of the target tenant
    pub aud: String,
    /// Client id (self-issued)
    pub iss: String,
    /// Client id
    pub sub: String,
    /// Unique per assertion
    pub jti: String,
    /// Not-before, POSIX seconds
    pub nbf: u64,
    /// Expiry, POSIX seconds
    pub exp: u64,
}

/// A signed, compact client assertion
///
/// Single use: build one per token request.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientAssertion {
    token: String,
    claims: AssertionClaims,
}

impl ClientAssertion {
    /// The compact `header.payload.signature` string
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Consume into the compact string
    pub fn into_string(self) -> String {
        self.token
    }

    /// Claims that were signed
    pub fn claims(&self) -> &AssertionClaims {
        &self.claims
    }

    /// Unique identifier of this assertion
    pub fn jti(&self) -> &str {
        &self.claims.jti
    }
}

impl AsRef<str> for ClientAssertion {
    fn as_ref(&self) -> &str {
        &self.token
    }
}

// Manual Debug impl to prevent the bearer assertion from reaching logs
impl fmt::Debug for ClientAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAssertion")
            .field("token", &"[REDACTED]")
            .field("claims", &self.claims)
            .finish()
    }
}

/// Builds client assertions for a fixed authority and lifetime
#[derive(Debug, Clone, Default)]
pub struct AssertionBuilder {
    config: AssertionConfig,
}

impl AssertionBuilder {
    /// Create a builder
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] when the configuration could not
    /// produce valid assertions.
    pub fn new(config: AssertionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use
    pub fn config(&self) -> &AssertionConfig {
        &self.config
    }

    /// Build and sign an assertion valid from now
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidInput`] for an empty client id, a tenant id that
    ///   is not a GUID or domain name, or an expiry past [`MAX_NUMERIC_DATE`]
    /// - [`AuthError::MissingPrivateKey`] when the credential cannot sign; no
    ///   signing is attempted
    /// - [`AuthError::Signing`] when the signer fails
    pub fn build(
        &self,
        client_id: &str,
        tenant_id: &str,
        credential: &CertificateCredential,
    ) -> Result<ClientAssertion> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| AuthError::Configuration {
                reason: "system clock is before the Unix epoch".to_string(),
            })?
            .as_secs();

        self.build_at(client_id, tenant_id, credential, now)
    }

    /// Build and sign an assertion with an explicit `nbf`
    ///
    /// For callers that keep their own clock.
    ///
    /// # Errors
    ///
    /// Same as [`AssertionBuilder::build`].
    pub fn build_at(
        &self,
        client_id: &str,
        tenant_id: &str,
        credential: &CertificateCredential,
        not_before: u64,
    ) -> Result<ClientAssertion> {
        let client_id = non_empty("client id", client_id)?;
        let tenant_id = validate_tenant_id(tenant_id)?;
        let expires_at = not_before
            .checked_add(self.config.lifetime_seconds)
            .filter(|exp| *exp <= MAX_NUMERIC_DATE)
            .ok_or_else(|| AuthError::InvalidInput {
                reason: format!(
                    "not-before {not_before} plus a {} s lifetime does not fit a JWT NumericDate",
                    self.config.lifetime_seconds
                ),
            })?;

        if !credential.has_private_key() {
            return Err(AuthError::MissingPrivateKey {
                thumbprint: credential.thumbprint().to_hex(),
            });
        }

        let header = AssertionHeader {
            alg: ASSERTION_ALGORITHM.to_string(),
            typ: ASSERTION_TYPE.to_string(),
            x5t: credential.thumbprint().to_base64url(),
        };

        let claims = AssertionClaims {
            aud: token_endpoint(&self.config.authority, tenant_id),
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            nbf: not_before,
            exp: expires_at,
        };

        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);
        let signature = credential.sign_rs256(signing_input.as_bytes())?;
        let token = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature));

        debug!(
            jti = %claims.jti,
            tenant = %tenant_id,
            thumbprint = %credential.thumbprint(),
            exp = claims.exp,
            "Built client assertion"
        );

        Ok(ClientAssertion { token, claims })
    }
}

/// Build a client assertion with the default authority and 3600 s lifetime
///
/// # Errors
///
/// See [`AssertionBuilder::build`].
pub fn build_client_assertion(
    client_id: &str,
    tenant_id: &str,
    credential: &CertificateCredential,
) -> Result<ClientAssertion> {
    AssertionBuilder::default().build(client_id, tenant_id, credential)
}

fn non_empty<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidInput {
            reason: format!("{what} must not be empty"),
        });
    }
    Ok(trimmed)
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(|e| AuthError::Signing {
        reason: format!("cannot serialize assertion segment: {e}"),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
