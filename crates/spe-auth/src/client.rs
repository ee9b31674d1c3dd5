//! Assertion + exchange in one call

use std::sync::Arc;

use tracing::instrument;

use crate::{
    AccessToken, AssertionBuilder, AssertionConfig, CertificateCredential, CertificateProvider,
    ExchangeConfig, Result, Thumbprint, TokenExchanger,
};

/// App-only token source for one client registration in one tenant
///
/// Every [`TokenClient::acquire`] builds a fresh assertion and performs a fresh
/// exchange. Tokens are not cached; keep the returned [`AccessToken`] for as
/// long as `expires_in` allows.
#[derive(Debug, Clone)]
pub struct TokenClient {
    client_id: String,
    tenant_id: String,
    credential: Arc<CertificateCredential>,
    builder: AssertionBuilder,
    exchanger: TokenExchanger,
}

impl TokenClient {
    /// Create a client against the default authority
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
        credential: Arc<CertificateCredential>,
    ) -> Result<Self> {
        Ok(Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            credential,
            builder: AssertionBuilder::default(),
            exchanger: TokenExchanger::new(ExchangeConfig::default())?,
        })
    }

    /// Create a client whose credential comes from a certificate provider
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::CertificateNotFound`] for unknown thumbprints.
    pub fn from_provider(
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
        provider: &dyn CertificateProvider,
        thumbprint: &Thumbprint,
    ) -> Result<Self> {
        Self::new(client_id, tenant_id, provider.lookup(thumbprint)?)
    }

    /// Point both the assertion audience and the exchange at another authority
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::Configuration`] for an invalid authority.
    pub fn with_authority(self, authority: &str) -> Result<Self> {
        let assertion = AssertionConfig {
            authority: authority.to_string(),
            ..self.builder.config().clone()
        };
        let exchange = ExchangeConfig {
            authority: authority.to_string(),
            ..self.exchanger.config().clone()
        };
        self.with_assertion_config(assertion)?
            .with_exchange_config(exchange)
    }

    /// Replace the assertion settings
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::Configuration`] for invalid settings.
    pub fn with_assertion_config(mut self, config: AssertionConfig) -> Result<Self> {
        self.builder = AssertionBuilder::new(config)?;
        Ok(self)
    }

    /// Replace the exchange settings
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::Configuration`] for invalid settings.
    pub fn with_exchange_config(mut self, config: ExchangeConfig) -> Result<Self> {
        self.exchanger = TokenExchanger::new(config)?;
        Ok(self)
    }

    /// Client id this client authenticates as
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Tenant tokens are issued by
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Credential used for signing
    pub fn credential(&self) -> &CertificateCredential {
        &self.credential
    }

    /// Authority tokens are requested from
    pub fn authority(&self) -> &str {
        &self.exchanger.config().authority
    }

    /// Build a fresh assertion and exchange it for a token
    ///
    /// # Errors
    ///
    /// Fails fast with the first error from assertion building or the exchange.
    #[instrument(skip(self), fields(client_id = %self.client_id, tenant = %self.tenant_id))]
    pub async fn acquire(&self, scope: &str) -> Result<AccessToken> {
        let assertion = self
            .builder
            .build(&self.client_id, &self.tenant_id, &self.credential)?;

        self.exchanger
            .exchange(&self.tenant_id, &self.client_id, &assertion, scope)
            .await
    }
}
