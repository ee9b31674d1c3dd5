//! End-to-end tests: build an assertion and redeem it at a token endpoint
//! that verifies the signature against the registered certificate.

mod common;

use std::sync::Arc;

use common::{
    CLIENT_ID, MockIdentityProvider, TENANT_ID, mismatched_credential, test_credential,
};
use pretty_assertions::assert_eq;
use spe_auth::{
    AssertionBuilder, AssertionConfig, AuthError, DEFAULT_SCOPE, ExchangeConfig,
    InMemoryCertificateProvider, Thumbprint, TokenClient, TokenExchanger,
};

#[tokio::test]
async fn test_build_then_exchange() {
    let provider = MockIdentityProvider::start().await;
    provider.mount_verifying_endpoint().await;

    let builder = AssertionBuilder::new(AssertionConfig::with_authority(provider.authority())).unwrap();
    let exchanger =
        TokenExchanger::new(ExchangeConfig::with_authority(provider.authority())).unwrap();

    let assertion = builder
        .build(CLIENT_ID, TENANT_ID, &test_credential())
        .unwrap();
    let token = exchanger
        .exchange(TENANT_ID, CLIENT_ID, &assertion, DEFAULT_SCOPE)
        .await
        .unwrap();

    assert!(token.is_bearer());
    assert!(token.expires_in > 0);
    assert_eq!(token.access_token, format!("issued-for-{}", assertion.jti()));
}

#[tokio::test]
async fn test_token_client_acquire() {
    let provider = MockIdentityProvider::start().await;
    provider.mount_verifying_endpoint().await;

    let client = TokenClient::new(CLIENT_ID, TENANT_ID, Arc::new(test_credential()))
        .unwrap()
        .with_authority(&provider.authority())
        .unwrap();

    let first = client.acquire(DEFAULT_SCOPE).await.unwrap();
    let second = client.acquire(DEFAULT_SCOPE).await.unwrap();

    // No caching: every call is a fresh assertion and a fresh exchange
    assert_ne!(first.access_token, second.access_token);
    assert_eq!(provider.received_forms().await.len(), 2);
}

#[tokio::test]
async fn test_padded_client_id_matches_assertion_issuer() {
    let provider = MockIdentityProvider::start().await;
    provider.mount_verifying_endpoint().await;

    let client = TokenClient::new(
        format!("  {CLIENT_ID} "),
        format!(" {TENANT_ID}"),
        Arc::new(test_credential()),
    )
    .unwrap()
    .with_authority(&provider.authority())
    .unwrap();

    // The endpoint requires form client_id == iss == sub
    client.acquire(DEFAULT_SCOPE).await.unwrap();

    let forms = provider.received_forms().await;
    assert_eq!(forms[0]["client_id"], CLIENT_ID);
}

#[tokio::test]
async fn test_token_client_from_provider() {
    let provider = MockIdentityProvider::start().await;
    provider.mount_verifying_endpoint().await;

    let store = InMemoryCertificateProvider::new().with(test_credential());
    let thumbprint: Thumbprint = "67:49:ec:37:29:75:6b:a1:24:90:cf:7a:82:61:37:46:23:0a:5f:4f"
        .parse()
        .unwrap();

    let client = TokenClient::from_provider(CLIENT_ID, TENANT_ID, &store, &thumbprint)
        .unwrap()
        .with_authority(&provider.authority())
        .unwrap();

    let token = client.acquire(DEFAULT_SCOPE).await.unwrap();
    assert!(token.is_bearer());

    let unknown = Thumbprint::from_bytes([0u8; 20]);
    let err = TokenClient::from_provider(CLIENT_ID, TENANT_ID, &store, &unknown).unwrap_err();
    assert!(matches!(err, AuthError::CertificateNotFound { .. }));
}

#[tokio::test]
async fn test_wrong_private_key_rejected_by_provider() {
    let provider = MockIdentityProvider::start().await;
    provider.mount_verifying_endpoint().await;

    let client = TokenClient::new(CLIENT_ID, TENANT_ID, Arc::new(mismatched_credential()))
        .unwrap()
        .with_authority(&provider.authority())
        .unwrap();

    let err = client.acquire(DEFAULT_SCOPE).await.unwrap_err();

    assert_eq!(err.status(), Some(400));
    let oauth = err.oauth_error().unwrap();
    assert!(oauth.has_code(700027));
    assert!(oauth.trace_id.is_some());
    assert!(
        err.suggestions()
            .iter()
            .any(|s| s.contains("Upload this certificate"))
    );
}

#[tokio::test]
async fn test_unregistered_client_rejected() {
    let provider = MockIdentityProvider::start().await;
    provider.mount_verifying_endpoint().await;

    let client = TokenClient::new(
        "22222222-2222-2222-2222-222222222222",
        TENANT_ID,
        Arc::new(test_credential()),
    )
    .unwrap()
    .with_authority(&provider.authority())
    .unwrap();

    let err = client.acquire(DEFAULT_SCOPE).await.unwrap_err();
    assert!(err.oauth_error().unwrap().has_code(700016));
}

#[tokio::test]
async fn test_missing_key_never_reaches_endpoint() {
    let provider = MockIdentityProvider::start().await;
    provider.mount_verifying_endpoint().await;

    let public_only = spe_auth::CertificateCredential::from_pem(common::TEST_CERT_PEM, None).unwrap();
    let client = TokenClient::new(CLIENT_ID, TENANT_ID, Arc::new(public_only))
        .unwrap()
        .with_authority(&provider.authority())
        .unwrap();

    let err = client.acquire(DEFAULT_SCOPE).await.unwrap_err();
    assert!(matches!(err, AuthError::MissingPrivateKey { .. }));
    assert!(provider.received_forms().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_acquires_are_independent() {
    let provider = MockIdentityProvider::start().await;
    provider.mount_verifying_endpoint().await;

    let client = TokenClient::new(CLIENT_ID, TENANT_ID, Arc::new(test_credential()))
        .unwrap()
        .with_authority(&provider.authority())
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move { client.acquire(DEFAULT_SCOPE).await }));
    }

    let mut tokens = std::collections::HashSet::new();
    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        tokens.insert(token.access_token);
    }

    // Distinct jti per assertion, so distinct tokens from the mock
    assert_eq!(tokens.len(), 8);

    let assertions: std::collections::HashSet<String> = provider
        .received_forms()
        .await
        .into_iter()
        .map(|form| form["client_assertion"].clone())
        .collect();
    assert_eq!(assertions.len(), 8);
}
