//! Common test utilities for integration tests
//!
//! One wiremock server plays every remote party: the identity provider's token
//! endpoint, Microsoft Graph and the tenant root site.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::json;
use spe_cli::{Command, CliResult, OutputFormat, SpeConfig, commands};
use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{method, path},
};

pub const CLIENT_ID: &str = "11111111-1111-1111-1111-111111111111";
pub const TENANT_ID: &str = "contoso.onmicrosoft.com";
pub const CONTAINER_TYPE_ID: &str = "4f0af585-8dcc-0000-223d-661eb2c604e4";
pub const ACCESS_TOKEN: &str = "mock-access-token";

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../spe-auth/tests/fixtures")
        .join(name)
}

/// Configuration pointing every endpoint at the mock server
pub fn test_config(server: &MockServer) -> SpeConfig {
    SpeConfig {
        client_id: Some(CLIENT_ID.to_string()),
        tenant_id: Some(TENANT_ID.to_string()),
        certificate_path: Some(fixture("test_cert.pem")),
        key_path: Some(fixture("test_key.pem")),
        authority: server.uri(),
        graph_endpoint: server.uri(),
        root_site_url: Some(server.uri()),
        container_type_id: Some(CONTAINER_TYPE_ID.to_string()),
        timeout_seconds: 5,
        ..SpeConfig::default()
    }
}

/// Token endpoint that issues [`ACCESS_TOKEN`] for every request
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": ACCESS_TOKEN,
        })))
        .mount(server)
        .await;
}

/// Token endpoint that reports missing admin consent
pub async fn mount_consent_required(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS65001: The user or administrator has not consented to use the application.",
            "error_codes": [65001],
        })))
        .mount(server)
        .await;
}

/// Scopes requested at the token endpoint, in order
pub async fn requested_scopes(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().ends_with("/oauth2/v2.0/token"))
        .filter_map(|r| form_fields(r).remove("scope"))
        .collect()
}

fn form_fields(request: &Request) -> HashMap<String, String> {
    url::form_urlencoded::parse(&request.body)
        .into_owned()
        .collect()
}

/// Run a command and capture its report
pub async fn run(command: Command, config: &SpeConfig, format: OutputFormat) -> CliResult<String> {
    let mut output = Vec::new();
    commands::execute(command, config, format, &mut output).await?;
    Ok(String::from_utf8(output).expect("report is UTF-8"))
}
