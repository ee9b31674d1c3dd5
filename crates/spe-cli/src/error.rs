//! Error types for CLI operations

use std::fmt;

use spe_auth::AuthError;
use thiserror::Error;

use crate::provision::ProvisionError;

/// CLI-specific errors with rich context
#[derive(Error, Debug)]
pub enum CliError {
    /// Assertion building or token exchange failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A provisioning API call failed
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// A required setting was not supplied by any layer
    #[error("Missing setting '{key}' (use {flag}, SPE_{env} or the config file)")]
    MissingSetting {
        /// Config file key
        key: &'static str,
        /// Command-line flag
        flag: &'static str,
        /// Environment variable suffix
        env: &'static str,
    },

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Configuration file or environment could not be read
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Get user-friendly suggestions for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Auth(e) => e.suggestions(),
            Self::Provision(e) => e.suggestions(),
            Self::MissingSetting { .. } => vec![
                "Run with --help to see every flag",
                "Keep tenant-independent settings in a TOML file passed with --config",
            ],
            Self::InvalidArguments(_) => vec!["Use --help to see expected format"],
            Self::Config(_) => vec![
                "Check the config file is valid TOML",
                "Numeric settings such as timeout_seconds must be integers",
            ],
            _ => vec![],
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth(e) | Self::Provision(ProvisionError::Auth(e)) => auth_category(e),
            Self::Provision(ProvisionError::Transport(_)) => ErrorCategory::Connection,
            Self::Provision(ProvisionError::Api { .. }) => ErrorCategory::Server,
            Self::Provision(ProvisionError::InvalidResponse { .. }) | Self::Json(_) => {
                ErrorCategory::Parsing
            }
            Self::Provision(ProvisionError::InvalidInput { .. }) | Self::InvalidArguments(_) => {
                ErrorCategory::User
            }
            Self::Config(_) | Self::MissingSetting { .. } => ErrorCategory::Config,
            Self::Io(_) => ErrorCategory::System,
        }
    }
}

fn auth_category(error: &AuthError) -> ErrorCategory {
    match error {
        AuthError::Transport(_) => ErrorCategory::Connection,
        AuthError::TokenRequest { .. } => ErrorCategory::Authentication,
        AuthError::InvalidResponse { .. } => ErrorCategory::Parsing,
        AuthError::Configuration { .. } => ErrorCategory::Config,
        AuthError::InvalidInput { .. } => ErrorCategory::User,
        AuthError::MissingPrivateKey { .. }
        | AuthError::Signing { .. }
        | AuthError::Certificate { .. }
        | AuthError::CertificateNotFound { .. } => ErrorCategory::Credential,
    }
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network failure
    Connection,
    /// The identity provider refused to issue a token
    Authentication,
    /// Certificate or key problem on this machine
    Credential,
    /// A provisioning API rejected the call
    Server,
    /// Bad command-line input
    User,
    /// Unparseable response or output
    Parsing,
    /// Configuration layering problem
    Config,
    /// Local I/O
    System,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "Connection"),
            Self::Authentication => write!(f, "Authentication"),
            Self::Credential => write!(f, "Credential"),
            Self::Server => write!(f, "Server"),
            Self::User => write!(f, "User Input"),
            Self::Parsing => write!(f, "Parsing"),
            Self::Config => write!(f, "Configuration"),
            Self::System => write!(f, "System"),
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
