//! Output formatting
//!
//! Every command produces one report. `human` prints it for a terminal,
//! `json` prints one JSON document for scripting. Logs go to stderr, so stdout
//! carries nothing but the report.

use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::CliResult;
use crate::provision::{ConsentStatus, Container, ContainerPermission};

/// Output format for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON format (for scripting)
    Json,
}

/// A command result that can be shown to a person
pub trait HumanReadable {
    /// Write the human-readable rendering
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails.
    fn write_human(&self, writer: &mut dyn Write) -> std::io::Result<()>;
}

/// Write a report in the requested format
///
/// # Errors
///
/// Returns [`crate::CliError`] if serialization or writing fails.
pub fn write_report<T>(format: OutputFormat, report: &T, writer: &mut dyn Write) -> CliResult<()>
where
    T: Serialize + HumanReadable,
{
    match format {
        OutputFormat::Human => report.write_human(writer)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, report)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// `spe assertion`
#[derive(Debug, Serialize)]
pub struct AssertionReport {
    /// Compact client assertion
    pub assertion: String,
    /// Unique assertion id
    pub jti: String,
    /// Expiry, POSIX seconds
    pub expires_at: u64,
}

impl HumanReadable for AssertionReport {
    fn write_human(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        // Bare value so the output can be piped
        writeln!(writer, "{}", self.assertion)
    }
}

/// `spe token`
#[derive(Debug, Serialize)]
pub struct TokenReport {
    /// Token type, normally `Bearer`
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    /// Scope the token was requested for
    pub scope: String,
    /// Bearer credential
    pub access_token: String,
}

impl HumanReadable for TokenReport {
    fn write_human(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        writeln!(writer, "{}", self.access_token)
    }
}

/// `spe consent-url`
#[derive(Debug, Serialize)]
pub struct ConsentUrlReport {
    /// Admin consent URL
    pub consent_url: String,
}

impl HumanReadable for ConsentUrlReport {
    fn write_human(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        writeln!(writer, "{}", self.consent_url)
    }
}

impl HumanReadable for ConsentStatus {
    fn write_human(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        match self {
            Self::Granted => writeln!(writer, "✓ Admin consent granted"),
            Self::Missing { consent_url } => {
                writeln!(writer, "✗ Admin consent missing")?;
                writeln!(writer, "  A tenant administrator must open:")?;
                writeln!(writer, "  {consent_url}")
            }
        }
    }
}

/// `spe register-container-type`
#[derive(Debug, Serialize)]
pub struct RegistrationReport {
    /// Registered container type
    pub container_type_id: String,
    /// Site the registration ran against
    pub root_site_url: String,
    /// Application granted permissions
    pub app_id: String,
}

impl HumanReadable for RegistrationReport {
    fn write_human(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            writer,
            "✓ Container type {} registered on {}",
            self.container_type_id, self.root_site_url
        )?;
        writeln!(writer, "  Application: {}", self.app_id)
    }
}

/// `spe create-container`
#[derive(Debug, Serialize)]
pub struct ContainerReport {
    /// Created container
    pub container: Container,
    /// Owner permission, when `--grant-owner` was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerGrant>,
}

/// Owner granted on a new container
#[derive(Debug, Serialize)]
pub struct OwnerGrant {
    /// User principal name
    pub user_principal_name: String,
    /// Resulting permission
    pub permission: ContainerPermission,
}

impl HumanReadable for ContainerReport {
    fn write_human(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        writeln!(writer, "✓ Container created")?;
        writeln!(writer, "  Id:             {}", self.container.id)?;
        writeln!(writer, "  Name:           {}", self.container.display_name)?;
        writeln!(writer, "  Container type: {}", self.container.container_type_id)?;
        if let Some(status) = &self.container.status {
            writeln!(writer, "  Status:         {status}")?;
        }
        if let Some(owner) = &self.owner {
            writeln!(writer, "  Owner:          {}", owner.user_principal_name)?;
        }
        Ok(())
    }
}
