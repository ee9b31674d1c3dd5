//! # spe-cli - SharePoint Embedded Provisioning
//!
//! Adapter around [`spe_auth`]: layered configuration, the provisioning REST
//! calls and the `spe` command.
//!
//! ## Provisioning Flow
//!
//! ```bash
//! # (a) Mint a certificate-signed app-only token
//! spe token --client-id $APP --tenant-id contoso.onmicrosoft.com --cert app.pem
//!
//! # (b) Verify admin consent, printing the consent URL when missing
//! spe check-consent --config spe.toml
//!
//! # (c) Register the owning application on the container type
//! spe register-container-type --config spe.toml --root-site https://contoso.sharepoint.com
//!
//! # (d) Create a container and grant its first owner
//! spe create-container --config spe.toml --name "Project Docs" --grant-owner admin@contoso.com
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod provision;

pub use cli::{Cli, Command, CredentialArgs};
pub use config::{ConfigOverrides, SpeConfig};
pub use error::{CliError, CliResult, ErrorCategory};
pub use output::OutputFormat;
pub use provision::{
    AppPermissionGrant, ConsentStatus, Container, ContainerPermission, ContainerRole,
    ProvisionError, ProvisioningClient, admin_consent_url,
};

/// Run a parsed command line, writing the report to stdout
///
/// # Errors
///
/// Returns the command's error; the caller reports it and sets the exit code.
pub async fn run(cli: Cli) -> CliResult<()> {
    let config = SpeConfig::load(cli.config.as_deref(), &cli.credentials.overrides())?;
    let mut stdout = std::io::stdout();
    commands::execute(cli.command, &config, cli.format, &mut stdout).await
}
