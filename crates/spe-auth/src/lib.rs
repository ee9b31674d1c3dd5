//! # spe-auth - Certificate-Based Client Credentials
//!
//! App-only access tokens for SharePoint Embedded provisioning, obtained with an
//! X.509 certificate instead of a shared client secret.
//!
//! The crate has two strictly layered parts:
//!
//! 1. **Assertion Builder** ([`assertion`]) - builds a signed RS256 JWT that proves
//!    possession of the private key bound to a registered certificate
//!    (RFC 7523 client assertion).
//! 2. **Token Exchanger** ([`exchange`]) - redeems that assertion at the tenant's
//!    token endpoint with the OAuth2 `client_credentials` grant.
//!
//! The only thing flowing between them is the compact assertion string.
//! [`TokenClient`] composes both for callers who just want a token.
//!
//! ## Architecture
//!
//! - [`credential`] - Certificate thumbprints, signing capability, certificate providers
//! - [`assertion`] - Client assertion construction
//! - [`exchange`] - Token endpoint exchange and the [`AccessToken`] record
//! - [`client`] - [`TokenClient`], assertion + exchange in one call
//! - [`config`] - Authority, lifetime, and transport configuration
//! - [`error`] - [`AuthError`] taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spe_auth::{CertificateCredential, build_client_assertion, exchange_for_token, DEFAULT_SCOPE};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credential = CertificateCredential::from_pem_files("app.crt", Some("app.key"))?;
//!
//! let client_id = "11111111-1111-1111-1111-111111111111";
//! let tenant_id = "contoso.onmicrosoft.com";
//!
//! let assertion = build_client_assertion(client_id, tenant_id, &credential)?;
//! let token = exchange_for_token(tenant_id, client_id, &assertion, DEFAULT_SCOPE).await?;
//!
//! println!("{} token valid for {}s", token.token_type, token.expires_in);
//! # Ok(())
//! # }
//! ```
//!
//! ## Standards Compliance
//!
//! - **RFC 7515** - JSON Web Signature (compact serialization)
//! - **RFC 7519** - JSON Web Token
//! - **RFC 7523** - JWT Profile for OAuth 2.0 Client Authentication
//! - **RFC 6749** - OAuth 2.0 client credentials grant
//! - **RFC 4648 §5** - base64url without padding

pub mod assertion;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod exchange;

pub use assertion::{AssertionBuilder, AssertionClaims, AssertionHeader, ClientAssertion, build_client_assertion};
pub use client::TokenClient;
pub use config::{AssertionConfig, ExchangeConfig, token_endpoint};
pub use credential::{
    CertificateCredential, CertificateProvider, CredentialSigner, InMemoryCertificateProvider,
    RsaCredentialSigner, Thumbprint,
};
pub use error::{AuthError, OAuthErrorResponse};
pub use exchange::{AccessToken, TokenExchanger, exchange_for_token};

/// Result type for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Default identity provider authority (Microsoft Entra ID, public cloud)
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Default scope requested from the token endpoint (Graph, app-only)
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Default client assertion lifetime in seconds (`exp - nbf`)
pub const DEFAULT_ASSERTION_LIFETIME_SECONDS: u64 = 3600;

/// JWT header `alg` value for client assertions
pub const ASSERTION_ALGORITHM: &str = "RS256";

/// JWT header `typ` value for client assertions
pub const ASSERTION_TYPE: &str = "JWT";

/// `client_assertion_type` form value (RFC 7523 §2.2)
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// `grant_type` form value for app-only tokens
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";
