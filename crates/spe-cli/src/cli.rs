//! CLI argument parsing

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::config::ConfigOverrides;
use crate::output::OutputFormat;
use crate::provision::ContainerRole;

/// spe - SharePoint Embedded provisioning with certificate credentials
#[derive(Parser, Debug)]
#[command(
    name = "spe",
    version,
    about = "Provision SharePoint Embedded with certificate-based app-only tokens",
    long_about = "Mints app-only access tokens from an X.509 certificate (RFC 7523 client\n\
                  assertions) and uses them to check admin consent, register a container type\n\
                  and create containers.\n\n\
                  Settings come from --config <file.toml>, SPE_* environment variables and\n\
                  flags, in increasing order of precedence."
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Credential and tenant selection
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Flags that override configured credentials
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Application (client) id
    #[arg(long, global = true)]
    pub client_id: Option<String>,

    /// Tenant id or verified domain
    #[arg(long, global = true)]
    pub tenant_id: Option<String>,

    /// PEM certificate (may also contain the private key)
    #[arg(long, global = true, value_name = "PEM")]
    pub cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, global = true, value_name = "PEM")]
    pub key: Option<PathBuf>,

    /// Identity provider authority
    #[arg(long, global = true, value_name = "URL")]
    pub authority: Option<String>,
}

impl CredentialArgs {
    /// Flags as configuration overrides
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            client_id: self.client_id.clone(),
            tenant_id: self.tenant_id.clone(),
            certificate_path: self.cert.as_ref().map(|p| p.display().to_string()),
            key_path: self.key.as_ref().map(|p| p.display().to_string()),
            authority: self.authority.clone(),
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print a signed client assertion
    Assertion,

    /// Acquire an app-only access token
    Token {
        /// Scope to request (defaults to the configured scope)
        #[arg(long)]
        scope: Option<String>,
    },

    /// Print the tenant admin consent URL
    ConsentUrl {
        /// Where the administrator is sent after consenting
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Check whether admin consent has been granted
    CheckConsent {
        /// Redirect URI to embed in the consent URL if consent is missing
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Register this application's permissions on a container type
    RegisterContainerType {
        /// Container type id
        #[arg(long)]
        container_type_id: Option<String>,

        /// Consuming tenant's root site URL
        #[arg(long = "root-site", value_name = "URL")]
        root_site_url: Option<String>,

        /// Delegated permissions
        #[arg(long, value_delimiter = ',', default_value = "full")]
        delegated: Vec<String>,

        /// App-only permissions
        #[arg(long, value_delimiter = ',', default_value = "full")]
        app_only: Vec<String>,
    },

    /// Create a container
    CreateContainer {
        /// Display name
        #[arg(long)]
        name: String,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Container type id
        #[arg(long)]
        container_type_id: Option<String>,

        /// User principal name to grant a role on the new container
        #[arg(long, value_name = "UPN")]
        grant_owner: Option<String>,

        /// Role for --grant-owner
        #[arg(long, value_enum, default_value = "owner", requires = "grant_owner")]
        role: ContainerRole,
    },
}

impl Cli {
    /// Tracing level for the verbosity flags
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            }
        }
    }

    /// Initialize the tracing subscriber
    ///
    /// `RUST_LOG` takes precedence over the verbosity flags. Logs go to stderr.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.log_level()).into())
            .from_env_lossy();

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .init();
    }
}
