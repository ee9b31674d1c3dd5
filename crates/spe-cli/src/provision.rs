//! SharePoint Embedded provisioning calls
//!
//! Each call obtains a fresh app-only token from the [`TokenClient`] for the
//! resource it talks to, then issues one REST request:
//!
//! | Step                    | Resource            | Request                                                              |
//! |-------------------------|---------------------|----------------------------------------------------------------------|
//! | consent check           | Microsoft Graph     | token exchange only                                                  |
//! | container type register | tenant root site    | `PUT /_api/v2.1/storageContainerTypes/{id}/applicationPermissions`   |
//! | container create        | Microsoft Graph     | `POST /v1.0/storage/fileStorage/containers`                          |
//! | container permission    | Microsoft Graph     | `POST /v1.0/storage/fileStorage/containers/{id}/permissions`         |
//!
//! Nothing here retries; a rejected call surfaces as [`ProvisionError::Api`]
//! with the verbatim response body.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use spe_auth::config::validate_tenant_id;
use spe_auth::{AuthError, TokenClient};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Microsoft Graph endpoint
pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com";

/// Errors from provisioning API calls
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No token could be obtained for the target resource
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The API rejected the request
    #[error("provisioning API returned HTTP {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Raw response body, verbatim
        body: String,
    },

    /// The request never produced an HTTP response
    #[error("provisioning request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 2xx response body could not be decoded
    #[error("invalid provisioning response: {reason}")]
    InvalidResponse {
        /// Decoding failure
        reason: String,
    },

    /// A caller-supplied value is unusable
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong
        reason: String,
    },
}

impl ProvisionError {
    /// User-facing hints for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Auth(e) => e.suggestions(),
            Self::Api { status: 401, .. } => {
                vec!["The token was not accepted; check the app registration's API permissions"]
            }
            Self::Api { status: 403, .. } => vec![
                "Check that admin consent covers FileStorageContainer.Selected",
                "Only the owning application can register a container type",
            ],
            Self::Api { status: 404, .. } => {
                vec!["Check the container type id, container id and root site URL"]
            }
            Self::Api { status: 409, .. } => {
                vec!["The resource already exists; skip this step"]
            }
            Self::Transport(_) => vec!["Check network connectivity to the API endpoint"],
            _ => vec![],
        }
    }
}

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Build the tenant admin consent URL
///
/// `{authority}/{tenant}/adminconsent?client_id=..[&redirect_uri=..]`
///
/// # Errors
///
/// Returns [`ProvisionError::Auth`] for a tenant that is not a GUID or domain
/// name and [`ProvisionError::InvalidInput`] when the pieces do not form a URL.
pub fn admin_consent_url(
    authority: &str,
    tenant_id: &str,
    client_id: &str,
    redirect_uri: Option<&str>,
) -> Result<Url> {
    let base = format!(
        "{}/{}/adminconsent",
        authority.trim_end_matches('/'),
        validate_tenant_id(tenant_id)?
    );

    let mut params = vec![("client_id", client_id)];
    if let Some(redirect) = redirect_uri {
        params.push(("redirect_uri", redirect));
    }

    Url::parse_with_params(&base, &params).map_err(|e| ProvisionError::InvalidInput {
        reason: format!("cannot build consent URL from '{base}': {e}"),
    })
}

/// Outcome of an admin consent check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsentStatus {
    /// A token was issued, so consent exists
    Granted,
    /// The provider reported missing consent
    Missing {
        /// Where a tenant administrator can grant it
        consent_url: String,
    },
}

/// Per-application permissions on a container type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPermissionGrant {
    /// Application (client) id
    pub app_id: String,
    /// Permissions when acting on behalf of a user
    pub delegated: Vec<String>,
    /// Permissions when acting as the application
    pub app_only: Vec<String>,
}

impl AppPermissionGrant {
    /// Grant `full` delegated and app-only permissions
    pub fn full(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            delegated: vec!["full".to_string()],
            app_only: vec!["full".to_string()],
        }
    }
}

/// A file storage container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container id
    pub id: String,
    /// Display name
    pub display_name: String,
    /// Container type the container belongs to
    pub container_type_id: String,
    /// Lifecycle status, e.g. `inactive` until first write
    #[serde(default)]
    pub status: Option<String>,
}

/// Role on a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRole {
    /// Read content
    Reader,
    /// Read and write content
    Writer,
    /// Manage content and permissions
    Manager,
    /// Full control
    Owner,
}

impl fmt::Display for ContainerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Manager => "manager",
            Self::Owner => "owner",
        };
        f.write_str(role)
    }
}

/// A permission granted on a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPermission {
    /// Permission id
    pub id: String,
    /// Granted roles
    pub roles: Vec<ContainerRole>,
}

/// Authenticated client for the provisioning APIs
#[derive(Debug, Clone)]
pub struct ProvisioningClient {
    tokens: TokenClient,
    graph_endpoint: String,
    http_client: reqwest::Client,
}

impl ProvisioningClient {
    /// Create a client talking to the given Graph endpoint
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        tokens: TokenClient,
        graph_endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let graph_endpoint: String = graph_endpoint.into();
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("spe-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            tokens,
            graph_endpoint: graph_endpoint.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Token source in use
    pub fn tokens(&self) -> &TokenClient {
        &self.tokens
    }

    /// Check whether admin consent has been granted
    ///
    /// A Graph token exchange is attempted; a consent rejection becomes
    /// [`ConsentStatus::Missing`] and every other failure is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Auth`] for failures unrelated to consent.
    #[instrument(skip(self), fields(tenant = %self.tokens.tenant_id()))]
    pub async fn verify_consent(&self, redirect_uri: Option<&str>) -> Result<ConsentStatus> {
        match self.tokens.acquire(&self.graph_scope()).await {
            Ok(_) => {
                info!("Admin consent granted");
                Ok(ConsentStatus::Granted)
            }
            Err(e) if e.is_consent_required() => {
                warn!("Admin consent missing");
                let consent_url = admin_consent_url(
                    self.tokens.authority(),
                    self.tokens.tenant_id(),
                    self.tokens.client_id(),
                    redirect_uri,
                )?;
                Ok(ConsentStatus::Missing {
                    consent_url: consent_url.into(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Register application permissions on a container type
    ///
    /// Runs against the consuming tenant's root site with a token for that
    /// site.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Api`] when SharePoint rejects the registration.
    #[instrument(skip(self, grants), fields(grants = grants.len()))]
    pub async fn register_container_type(
        &self,
        root_site_url: &str,
        container_type_id: &str,
        grants: &[AppPermissionGrant],
    ) -> Result<()> {
        let root_site = root_site_url.trim_end_matches('/');
        non_empty("root site URL", root_site)?;
        non_empty("container type id", container_type_id)?;
        if grants.is_empty() {
            return Err(ProvisionError::InvalidInput {
                reason: "at least one application permission grant is required".to_string(),
            });
        }

        let url = format!(
            "{root_site}/_api/v2.1/storageContainerTypes/{}/applicationPermissions",
            container_type_id.trim()
        );
        let token = self.tokens.acquire(&format!("{root_site}/.default")).await?;

        let request = self
            .http_client
            .put(&url)
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .json(&json!({ "value": grants }));
        self.send(request).await?;

        info!(container_type = %container_type_id, "Container type registered");
        Ok(())
    }

    /// Create a container of a registered container type
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Api`] when Graph rejects the request.
    #[instrument(skip(self, description))]
    pub async fn create_container(
        &self,
        container_type_id: &str,
        display_name: &str,
        description: Option<&str>,
    ) -> Result<Container> {
        non_empty("container type id", container_type_id)?;
        non_empty("display name", display_name)?;

        let mut body = json!({
            "displayName": display_name,
            "containerTypeId": container_type_id.trim(),
        });
        if let Some(description) = description {
            body["description"] = json!(description);
        }

        let url = format!("{}/v1.0/storage/fileStorage/containers", self.graph_endpoint);
        let container: Container = self.send_graph(self.http_client.post(&url).json(&body)).await?;

        info!(container = %container.id, "Container created");
        Ok(container)
    }

    /// Grant a user a role on a container
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Api`] when Graph rejects the request.
    #[instrument(skip(self))]
    pub async fn grant_container_permission(
        &self,
        container_id: &str,
        role: ContainerRole,
        user_principal_name: &str,
    ) -> Result<ContainerPermission> {
        non_empty("container id", container_id)?;
        non_empty("user principal name", user_principal_name)?;

        let url = format!(
            "{}/v1.0/storage/fileStorage/containers/{}/permissions",
            self.graph_endpoint,
            container_id.trim()
        );
        let body = json!({
            "roles": [role],
            "grantedToV2": { "user": { "userPrincipalName": user_principal_name } },
        });

        let permission: ContainerPermission =
            self.send_graph(self.http_client.post(&url).json(&body)).await?;

        info!(permission = %permission.id, %role, "Container permission granted");
        Ok(permission)
    }

    fn graph_scope(&self) -> String {
        format!("{}/.default", self.graph_endpoint)
    }

    async fn send_graph<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let token = self.tokens.acquire(&self.graph_scope()).await?;
        let body = self
            .send(request.header(reqwest::header::AUTHORIZATION, token.authorization_header()))
            .await?;

        serde_json::from_str(&body).map_err(|e| ProvisionError::InvalidResponse {
            reason: e.to_string(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), url = %url, "Provisioning API rejected request");
            return Err(ProvisionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), url = %url, "Provisioning API call succeeded");
        Ok(body)
    }
}

fn non_empty(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProvisionError::InvalidInput {
            reason: format!("{what} must not be empty"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_url_with_redirect() {
        let url = admin_consent_url(
            "https://login.microsoftonline.com/",
            "contoso.onmicrosoft.com",
            "11111111-1111-1111-1111-111111111111",
            Some("https://localhost/callback"),
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/adminconsent?client_id=11111111-1111-1111-1111-111111111111&redirect_uri=https%3A%2F%2Flocalhost%2Fcallback"
        );
    }

    #[test]
    fn test_consent_url_without_redirect() {
        let url = admin_consent_url("https://login.microsoftonline.com", "common", "app", None).unwrap();
        assert_eq!(url.query(), Some("client_id=app"));
    }

    #[test]
    fn test_consent_url_rejects_tenant_path_characters() {
        for tenant in ["contoso/../common", "contoso?client_id=other", "contoso#x"] {
            assert!(matches!(
                admin_consent_url("https://login.microsoftonline.com", tenant, "app", None),
                Err(ProvisionError::Auth(AuthError::InvalidInput { .. }))
            ));
        }
    }

    #[test]
    fn test_consent_status_serialization() {
        assert_eq!(
            serde_json::to_value(ConsentStatus::Granted).unwrap(),
            json!({"status": "granted"})
        );
        assert_eq!(
            serde_json::to_value(ConsentStatus::Missing {
                consent_url: "https://x".to_string()
            })
            .unwrap(),
            json!({"status": "missing", "consent_url": "https://x"})
        );
    }

    #[test]
    fn test_grant_wire_format() {
        assert_eq!(
            serde_json::to_value(AppPermissionGrant::full("app")).unwrap(),
            json!({"appId": "app", "delegated": ["full"], "appOnly": ["full"]})
        );
    }

    #[test]
    fn test_container_parsing() {
        let container: Container = serde_json::from_str(
            r#"{"id":"b!abc","displayName":"Docs","containerTypeId":"ct","status":"inactive","createdDateTime":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(container.display_name, "Docs");
        assert_eq!(container.status.as_deref(), Some("inactive"));
    }

    #[test]
    fn test_api_suggestions() {
        let err = ProvisionError::Api {
            status: 403,
            body: String::new(),
        };
        assert!(err.suggestions()[0].contains("consent"));
        assert!(
            ProvisionError::InvalidInput {
                reason: String::new()
            }
            .suggestions()
            .is_empty()
        );
    }
}
