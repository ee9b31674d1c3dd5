//! Layered configuration
//!
//! Later layers override earlier ones:
//!
//! 1. Built-in defaults
//! 2. TOML file passed with `--config`
//! 3. `SPE_*` environment variables (`SPE_CLIENT_ID`, `SPE_TENANT_ID`, ...)
//! 4. Command-line flags
//!
//! ```toml
//! client_id = "11111111-1111-1111-1111-111111111111"
//! tenant_id = "contoso.onmicrosoft.com"
//! certificate_path = "/etc/spe/app.crt"
//! key_path = "/etc/spe/app.key"
//! root_site_url = "https://contoso.sharepoint.com"
//! container_type_id = "4f0af585-8dcc-0000-223d-661eb2c604e4"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use spe_auth::{
    AssertionConfig, CertificateCredential, DEFAULT_ASSERTION_LIFETIME_SECONDS, DEFAULT_AUTHORITY,
    DEFAULT_SCOPE, ExchangeConfig, TokenClient,
};
use tracing::debug;

use crate::error::{CliError, CliResult};
use crate::provision::{DEFAULT_GRAPH_ENDPOINT, ProvisioningClient};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SPE";

/// Effective settings after layering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeConfig {
    /// Application (client) id
    #[serde(default)]
    pub client_id: Option<String>,

    /// Tenant id or verified domain
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// PEM certificate, optionally with the private key appended
    #[serde(default)]
    pub certificate_path: Option<PathBuf>,

    /// PEM private key (PKCS#8 or PKCS#1)
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Identity provider authority
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Default scope for `spe token`
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Microsoft Graph endpoint
    #[serde(default = "default_graph_endpoint")]
    pub graph_endpoint: String,

    /// Consuming tenant's root site, e.g. `https://contoso.sharepoint.com`
    #[serde(default)]
    pub root_site_url: Option<String>,

    /// Container type to register and create containers of
    #[serde(default)]
    pub container_type_id: Option<String>,

    /// Client assertion lifetime in seconds
    #[serde(default = "default_assertion_lifetime")]
    pub assertion_lifetime_seconds: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// `--client-id`
    pub client_id: Option<String>,
    /// `--tenant-id`
    pub tenant_id: Option<String>,
    /// `--cert`
    pub certificate_path: Option<String>,
    /// `--key`
    pub key_path: Option<String>,
    /// `--authority`
    pub authority: Option<String>,
}

impl SpeConfig {
    /// Layer defaults, the optional file, the process environment and overrides
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] when the file is missing or malformed.
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> CliResult<Self> {
        Self::load_with_env(file, overrides, None)
    }

    /// Like [`SpeConfig::load`], reading `SPE_*` variables from `env` instead
    /// of the process environment when given
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] when the file is missing or malformed.
    pub fn load_with_env(
        file: Option<&Path>,
        overrides: &ConfigOverrides,
        env: Option<config::Map<String, String>>,
    ) -> CliResult<Self> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).source(env))
            .set_override_option("client_id", overrides.client_id.clone())?
            .set_override_option("tenant_id", overrides.tenant_id.clone())?
            .set_override_option("certificate_path", overrides.certificate_path.clone())?
            .set_override_option("key_path", overrides.key_path.clone())?
            .set_override_option("authority", overrides.authority.clone())?;

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Client id, or an error naming every way to set it
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingSetting`] when unset.
    pub fn require_client_id(&self) -> CliResult<&str> {
        required(self.client_id.as_deref(), "client_id", "--client-id", "CLIENT_ID")
    }

    /// Tenant id
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingSetting`] when unset.
    pub fn require_tenant_id(&self) -> CliResult<&str> {
        required(self.tenant_id.as_deref(), "tenant_id", "--tenant-id", "TENANT_ID")
    }

    /// Root site URL
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingSetting`] when unset.
    pub fn require_root_site_url(&self) -> CliResult<&str> {
        required(
            self.root_site_url.as_deref(),
            "root_site_url",
            "--root-site",
            "ROOT_SITE_URL",
        )
    }

    /// Container type id
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingSetting`] when unset.
    pub fn require_container_type_id(&self) -> CliResult<&str> {
        required(
            self.container_type_id.as_deref(),
            "container_type_id",
            "--container-type-id",
            "CONTAINER_TYPE_ID",
        )
    }

    /// Load the certificate credential from the configured files
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingSetting`] without a certificate path and
    /// [`CliError::Auth`] when the files cannot be read or parsed.
    pub fn credential(&self) -> CliResult<CertificateCredential> {
        let certificate = self
            .certificate_path
            .as_deref()
            .ok_or(CliError::MissingSetting {
                key: "certificate_path",
                flag: "--cert",
                env: "CERTIFICATE_PATH",
            })?;

        Ok(CertificateCredential::from_pem_files(
            certificate,
            self.key_path.as_deref(),
        )?)
    }

    /// Assertion settings derived from this configuration
    pub fn assertion_config(&self) -> AssertionConfig {
        AssertionConfig {
            authority: self.authority.clone(),
            lifetime_seconds: self.assertion_lifetime_seconds,
        }
    }

    /// Exchange settings derived from this configuration
    pub fn exchange_config(&self) -> ExchangeConfig {
        ExchangeConfig {
            authority: self.authority.clone(),
            timeout_seconds: self.timeout_seconds,
            ..ExchangeConfig::default()
        }
    }

    /// Build a token client from the layered settings
    ///
    /// # Errors
    ///
    /// Returns the first missing setting or credential error.
    pub fn token_client(&self) -> CliResult<TokenClient> {
        let client = TokenClient::new(
            self.require_client_id()?,
            self.require_tenant_id()?,
            Arc::new(self.credential()?),
        )?
        .with_assertion_config(self.assertion_config())?
        .with_exchange_config(self.exchange_config())?;

        Ok(client)
    }

    /// Build a provisioning client from the layered settings
    ///
    /// # Errors
    ///
    /// See [`SpeConfig::token_client`].
    pub fn provisioning_client(&self) -> CliResult<ProvisioningClient> {
        Ok(ProvisioningClient::new(
            self.token_client()?,
            self.graph_endpoint.clone(),
            Duration::from_secs(self.timeout_seconds),
        )?)
    }
}

impl Default for SpeConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            tenant_id: None,
            certificate_path: None,
            key_path: None,
            authority: default_authority(),
            scope: default_scope(),
            graph_endpoint: default_graph_endpoint(),
            root_site_url: None,
            container_type_id: None,
            assertion_lifetime_seconds: default_assertion_lifetime(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn required<'a>(
    value: Option<&'a str>,
    key: &'static str,
    flag: &'static str,
    env: &'static str,
) -> CliResult<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(CliError::MissingSetting { key, flag, env })
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_graph_endpoint() -> String {
    DEFAULT_GRAPH_ENDPOINT.to_string()
}

fn default_assertion_lifetime() -> u64 {
    DEFAULT_ASSERTION_LIFETIME_SECONDS
}

fn default_timeout() -> u64 {
    30
}
