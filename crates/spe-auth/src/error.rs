//! Error types for assertion building and token exchange
//!
//! The taxonomy separates "cannot sign" from "provider rejected" so callers can
//! pick the right remediation (fix the credential vs. fix consent/configuration).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building client assertions or exchanging them
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credential has no accessible private key (checked before signing)
    #[error("certificate {thumbprint} has no accessible private key")]
    MissingPrivateKey {
        /// Uppercase hex thumbprint of the certificate
        thumbprint: String,
    },

    /// The signing operation itself failed
    #[error("signing failed: {reason}")]
    Signing {
        /// Failure reported by the signer
        reason: String,
    },

    /// The token endpoint rejected the exchange
    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenRequest {
        /// HTTP status code
        status: u16,
        /// Raw response body, verbatim
        body: String,
    },

    /// The token request never produced an HTTP response
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The token endpoint answered 2xx with a body that is not a token response
    #[error("invalid token response: {reason}")]
    InvalidResponse {
        /// Decoding failure
        reason: String,
    },

    /// A caller-supplied identifier is unusable
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong
        reason: String,
    },

    /// Certificate or key material could not be parsed or read
    #[error("certificate error: {reason}")]
    Certificate {
        /// Parse or I/O failure
        reason: String,
    },

    /// No certificate with this thumbprint is known to the provider
    #[error("no certificate with thumbprint {thumbprint}")]
    CertificateNotFound {
        /// Requested thumbprint (uppercase hex)
        thumbprint: String,
    },

    /// Configuration values are inconsistent
    #[error("configuration error: {reason}")]
    Configuration {
        /// What was wrong
        reason: String,
    },
}

/// OAuth2 error document returned by the token endpoint (RFC 6749 §5.2)
///
/// Entra ID adds `error_codes`, `trace_id`, and `correlation_id`, which are
/// what support needs when a rejection has to be escalated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    /// Error code (`invalid_client`, `invalid_grant`, ...)
    pub error: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// Provider-specific numeric codes (e.g. 700027)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<u64>,

    /// Provider trace identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// Provider correlation identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl OAuthErrorResponse {
    /// Check whether the provider reported a given numeric error code
    pub fn has_code(&self, code: u64) -> bool {
        self.error_codes.contains(&code)
            || self
                .error_description
                .as_deref()
                .is_some_and(|d| d.contains(&format!("AADSTS{code}")))
    }
}

// Entra ID codes with a known remediation
const CONSENT_REQUIRED: u64 = 65001;
const ASSERTION_TIME_RANGE: u64 = 700_024;
const UNKNOWN_CERTIFICATE: u64 = 700_027;
const UNKNOWN_CLIENT: u64 = 700_016;
const UNKNOWN_TENANT: u64 = 90002;

impl AuthError {
    /// Parse the OAuth2 error document of a [`AuthError::TokenRequest`]
    ///
    /// Returns `None` for other variants or when the body is not an OAuth
    /// error document.
    pub fn oauth_error(&self) -> Option<OAuthErrorResponse> {
        match self {
            Self::TokenRequest { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }

    /// HTTP status of a rejected exchange
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TokenRequest { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether repeating the same call unchanged could succeed
    ///
    /// This only classifies; nothing in this crate retries. `invalid_grant`
    /// and consent failures need the underlying cause fixed first, and so do
    /// transport errors raised while building the request or decoding a body.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::TokenRequest { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the provider said admin consent has not been granted
    pub fn is_consent_required(&self) -> bool {
        self.oauth_error().is_some_and(|e| {
            e.has_code(CONSENT_REQUIRED) || e.error == "consent_required"
        })
    }

    /// User-facing hints for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::MissingPrivateKey { .. } => vec![
                "Supply the private key alongside the certificate (--key)",
                "Check that the key store grants this process access to the key",
            ],
            Self::Signing { .. } => vec!["Check the key provider or hardware token and try again"],
            Self::Certificate { .. } => vec![
                "The certificate must be a PEM 'CERTIFICATE' block",
                "The key must be PKCS#8 ('PRIVATE KEY') or PKCS#1 ('RSA PRIVATE KEY') PEM",
            ],
            Self::CertificateNotFound { .. } => {
                vec!["Verify the thumbprint against the certificate store listing"]
            }
            Self::Transport(_) => vec![
                "Check network connectivity to the identity provider",
                "Verify the authority URL",
            ],
            Self::TokenRequest { .. } => match self.oauth_error() {
                Some(e) if e.has_code(CONSENT_REQUIRED) || e.error == "consent_required" => vec![
                    "A tenant administrator must grant consent (see `spe consent-url`)",
                ],
                Some(e) if e.has_code(ASSERTION_TIME_RANGE) => vec![
                    "The assertion is outside its valid time range; synchronise the system clock",
                ],
                Some(e) if e.has_code(UNKNOWN_CERTIFICATE) => vec![
                    "Upload this certificate to the app registration",
                    "Check that the certificate has not expired or been removed",
                ],
                Some(e) if e.has_code(UNKNOWN_CLIENT) => {
                    vec!["The client id is not registered in this tenant"]
                }
                Some(e) if e.has_code(UNKNOWN_TENANT) => vec!["Check the tenant id or domain"],
                _ => vec!["Inspect the response body for the provider's error code"],
            },
            _ => vec![],
        }
    }
}
