//! Command implementations

use std::io::Write;

use spe_auth::AssertionBuilder;
use tracing::info;

use crate::cli::Command;
use crate::config::SpeConfig;
use crate::error::CliResult;
use crate::output::{
    AssertionReport, ConsentUrlReport, ContainerReport, OutputFormat, OwnerGrant,
    RegistrationReport, TokenReport, write_report,
};
use crate::provision::{AppPermissionGrant, admin_consent_url};

/// Execute a command and write its report
///
/// # Errors
///
/// Returns the first configuration, credential, token or API error.
pub async fn execute(
    command: Command,
    config: &SpeConfig,
    format: OutputFormat,
    writer: &mut dyn Write,
) -> CliResult<()> {
    match command {
        Command::Assertion => assertion(config, format, writer),
        Command::Token { scope } => token(config, scope, format, writer).await,
        Command::ConsentUrl { redirect_uri } => {
            consent_url(config, redirect_uri.as_deref(), format, writer)
        }
        Command::CheckConsent { redirect_uri } => {
            let status = config
                .provisioning_client()?
                .verify_consent(redirect_uri.as_deref())
                .await?;
            write_report(format, &status, writer)
        }
        Command::RegisterContainerType {
            container_type_id,
            root_site_url,
            delegated,
            app_only,
        } => {
            let container_type_id = match container_type_id {
                Some(id) => id,
                None => config.require_container_type_id()?.to_string(),
            };
            let root_site_url = match root_site_url {
                Some(url) => url,
                None => config.require_root_site_url()?.to_string(),
            };

            let client = config.provisioning_client()?;
            let grant = AppPermissionGrant {
                app_id: client.tokens().client_id().to_string(),
                delegated,
                app_only,
            };
            client
                .register_container_type(
                    &root_site_url,
                    &container_type_id,
                    std::slice::from_ref(&grant),
                )
                .await?;

            let report = RegistrationReport {
                container_type_id,
                root_site_url,
                app_id: grant.app_id,
            };
            write_report(format, &report, writer)
        }
        Command::CreateContainer {
            name,
            description,
            container_type_id,
            grant_owner,
            role,
        } => {
            let container_type_id = match container_type_id {
                Some(id) => id,
                None => config.require_container_type_id()?.to_string(),
            };

            let client = config.provisioning_client()?;
            let container = client
                .create_container(&container_type_id, &name, description.as_deref())
                .await?;

            let owner = match grant_owner {
                Some(upn) => {
                    let permission = client
                        .grant_container_permission(&container.id, role, &upn)
                        .await?;
                    Some(OwnerGrant {
                        user_principal_name: upn,
                        permission,
                    })
                }
                None => None,
            };

            write_report(format, &ContainerReport { container, owner }, writer)
        }
    }
}

fn assertion(config: &SpeConfig, format: OutputFormat, writer: &mut dyn Write) -> CliResult<()> {
    let builder = AssertionBuilder::new(config.assertion_config())?;
    let assertion = builder.build(
        config.require_client_id()?,
        config.require_tenant_id()?,
        &config.credential()?,
    )?;

    let report = AssertionReport {
        jti: assertion.jti().to_string(),
        expires_at: assertion.claims().exp,
        assertion: assertion.into_string(),
    };
    write_report(format, &report, writer)
}

async fn token(
    config: &SpeConfig,
    scope: Option<String>,
    format: OutputFormat,
    writer: &mut dyn Write,
) -> CliResult<()> {
    let scope = scope.unwrap_or_else(|| config.scope.clone());
    let token = config.token_client()?.acquire(&scope).await?;

    info!(expires_in = token.expires_in, "Access token acquired");

    let report = TokenReport {
        token_type: token.token_type,
        expires_in: token.expires_in,
        scope,
        access_token: token.access_token,
    };
    write_report(format, &report, writer)
}

fn consent_url(
    config: &SpeConfig,
    redirect_uri: Option<&str>,
    format: OutputFormat,
    writer: &mut dyn Write,
) -> CliResult<()> {
    let url = admin_consent_url(
        &config.authority,
        config.require_tenant_id()?,
        config.require_client_id()?,
        redirect_uri,
    )?;

    write_report(
        format,
        &ConsentUrlReport {
            consent_url: url.into(),
        },
        writer,
    )
}
