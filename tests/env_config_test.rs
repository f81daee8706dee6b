//! Runs in its own process: it sets provider environment variables.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use dashboard_gate::{
    auth::{session::Session, HostedIdentityProvider},
    build_app,
    config::{GateConfig, PROVIDER_ANON_KEY_ENV, PROVIDER_URL_ENV},
    guard::RouteGuard,
    proxy::ProxyState,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::{
    matchers::{header as header_matcher, method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn test_provider_configured_from_environment_only() {
    let provider = MockServer::start().await;
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header_matcher("apikey", "env-anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "user-1"})))
        .expect(1)
        .mount(&provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_string("dashboard"))
        .expect(1)
        .mount(&upstream)
        .await;

    // No identity_provider section at all
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "upstream:\n  url: \"{}\"\n", upstream.uri()).unwrap();

    std::env::set_var(PROVIDER_URL_ENV, provider.uri());
    std::env::set_var(PROVIDER_ANON_KEY_ENV, "env-anon-key");
    let config = tokio_test::assert_ok!(GateConfig::from_file(file.path()));
    std::env::remove_var(PROVIDER_URL_ENV);
    std::env::remove_var(PROVIDER_ANON_KEY_ENV);

    assert_eq!(config.identity_provider.timeout_secs, 10);
    config.validate().unwrap();

    let identity_provider = HostedIdentityProvider::new(&config.identity_provider).unwrap();
    let cookie_name = identity_provider.cookie_name().to_string();
    assert_eq!(cookie_name, "sb-127-auth-token");

    let guard = Arc::new(RouteGuard::new(
        &config.routes,
        &config.guard,
        Arc::new(identity_provider),
    ));
    let app = build_app(guard, ProxyState::new(&config.upstream).unwrap(), None);

    let session = Session {
        access_token: "access-1".to_string(),
        refresh_token: "refresh-1".to_string(),
        token_type: "bearer".to_string(),
        expires_in: Some(3600),
        expires_at: Some(chrono::Utc::now().timestamp() + 3600),
        user: None,
    };
    let response = app
        .oneshot(
            Request::builder()
                .uri("/dashboard")
                .header(header::COOKIE, format!("{}={}", cookie_name, session.encode()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"dashboard");
}
