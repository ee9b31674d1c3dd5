//! Common test utilities for integration tests
//!
//! Shared fixtures (a self-signed RSA test certificate and keys) and a mock
//! identity provider whose token endpoint verifies client assertions the way
//! a real one does: signature against the registered certificate, `x5t`,
//! audience, issuer, subject and validity window.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::json;
use spe_auth::{CertificateCredential, RsaCredentialSigner, token_endpoint};
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{method, path},
};

pub const TEST_CERT_PEM: &str = include_str!("../fixtures/test_cert.pem");
pub const TEST_KEY_PEM: &str = include_str!("../fixtures/test_key.pem");
pub const TEST_PUBLIC_PEM: &str = include_str!("../fixtures/test_public.pem");
pub const OTHER_KEY_PEM: &str = include_str!("../fixtures/other_key.pem");

pub const CLIENT_ID: &str = "11111111-1111-1111-1111-111111111111";
pub const TENANT_ID: &str = "contoso.onmicrosoft.com";

/// The test certificate with its matching private key
pub fn test_credential() -> CertificateCredential {
    CertificateCredential::from_pem(TEST_CERT_PEM, Some(TEST_KEY_PEM))
        .expect("test certificate fixture must load")
}

/// The test certificate paired with an unrelated private key
pub fn mismatched_credential() -> CertificateCredential {
    let cert = CertificateCredential::from_pem(TEST_CERT_PEM, None).expect("certificate fixture");
    let signer = RsaCredentialSigner::from_pem(OTHER_KEY_PEM).expect("other key fixture");
    CertificateCredential::new(cert.certificate_der().to_vec(), Some(Arc::new(signer)))
}

/// Decode a base64url JSON segment
pub fn decode_segment(segment: &str) -> serde_json::Value {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .expect("segment must be base64url");
    serde_json::from_slice(&bytes).expect("segment must be JSON")
}

/// Parse an `application/x-www-form-urlencoded` request body
pub fn form_fields(request: &Request) -> HashMap<String, String> {
    url::form_urlencoded::parse(&request.body)
        .into_owned()
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
struct VerifiedClaims {
    jti: String,
}

/// Token endpoint that only issues tokens for valid client assertions
pub struct AssertionVerifyingResponder {
    decoding_key: DecodingKey,
    expected_x5t: String,
    audience: String,
    client_id: String,
}

impl AssertionVerifyingResponder {
    pub fn new(authority: &str, tenant_id: &str, client_id: &str) -> Self {
        let credential = test_credential();
        Self {
            decoding_key: DecodingKey::from_rsa_pem(TEST_PUBLIC_PEM.as_bytes())
                .expect("public key fixture"),
            expected_x5t: credential.thumbprint().to_base64url(),
            audience: token_endpoint(authority, tenant_id),
            client_id: client_id.to_string(),
        }
    }

    fn reject(code: u64, description: &str) -> ResponseTemplate {
        ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_client",
            "error_description": format!("AADSTS{code}: {description}"),
            "error_codes": [code],
            "trace_id": "00000000-0000-0000-0000-000000000001",
            "correlation_id": "00000000-0000-0000-0000-000000000002",
        }))
    }

    fn verify(&self, form: &HashMap<String, String>) -> Result<String, ResponseTemplate> {
        let field = |name: &str| form.get(name).map(String::as_str).unwrap_or_default();

        if field("grant_type") != "client_credentials"
            || field("client_assertion_type")
                != "urn:ietf:params:oauth:client-assertion-type:jwt-bearer"
            || field("scope").is_empty()
        {
            return Err(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_request",
                "error_description": "AADSTS900144: malformed request",
            })));
        }
        if field("client_id") != self.client_id {
            return Err(Self::reject(700016, "Application not found in the directory"));
        }

        let assertion = field("client_assertion");
        let header = assertion
            .split('.')
            .next()
            .map(decode_segment)
            .unwrap_or_default();
        if header["x5t"] != self.expected_x5t.as_str() {
            return Err(Self::reject(700027, "Certificate with identifier was not found"));
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.client_id]);
        validation.sub = Some(self.client_id.clone());
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "aud", "iss", "sub"]);

        decode::<VerifiedClaims>(assertion, &self.decoding_key, &validation)
            .map(|data| data.claims.jti)
            .map_err(|e| Self::reject(700027, &format!("Client assertion failed signature validation: {e}")))
    }
}

impl Respond for AssertionVerifyingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        match self.verify(&form_fields(request)) {
            Ok(jti) => ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "ext_expires_in": 3599,
                "access_token": format!("issued-for-{jti}"),
            })),
            Err(rejection) => rejection,
        }
    }
}

/// Mock identity provider
pub struct MockIdentityProvider {
    pub server: MockServer,
}

impl MockIdentityProvider {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Authority URL to configure builders and exchangers with
    pub fn authority(&self) -> String {
        self.server.uri()
    }

    /// Path of a tenant's token endpoint
    pub fn token_path(tenant_id: &str) -> String {
        format!("/{tenant_id}/oauth2/v2.0/token")
    }

    /// Token endpoint that verifies assertions against the test certificate
    pub async fn mount_verifying_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path(Self::token_path(TENANT_ID)))
            .respond_with(AssertionVerifyingResponder::new(
                &self.authority(),
                TENANT_ID,
                CLIENT_ID,
            ))
            .mount(&self.server)
            .await;
    }

    /// Token endpoint returning a fixed response
    pub async fn mount_response(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(Self::token_path(TENANT_ID)))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_raw(body.as_bytes().to_vec(), "application/json"),
            )
            .mount(&self.server)
            .await;
    }

    /// Form fields of every request received so far
    pub async fn received_forms(&self) -> Vec<HashMap<String, String>> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(form_fields)
            .collect()
    }
}
