//! Reverse-proxy validation end to end.

mod common;

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{body_json, from_peer, test_config, TestApp, PASSWORD};
use heracles::models::{AuditAction, ExternalProvider, NewUser};
use heracles::services::{AutoProvision, Store};

/// alice holds an API token `tok-123`, a `ci` grant aliased `ci-bot`, and
/// nothing for `payroll`.
async fn alice_app() -> TestApp {
    let app = TestApp::new();
    let alice = app.create_user("alice", false).await;
    app.create_token(&alice, "tok-123", true).await;
    let ci = app.create_realm("ci").await;
    app.create_realm("payroll").await;
    app.grant(&alice, &ci, Some("ci-bot")).await;
    app
}

fn validate_request(realm: Option<&str>, auth: Option<(&str, String)>) -> Request<Body> {
    validate_uri_request("/api/validate", realm, auth)
}

fn validate_uri_request(
    uri: &str,
    realm: Option<&str>,
    auth: Option<(&str, String)>,
) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(realm) = realm {
        builder = builder.header("x-heracles-realm", realm);
    }
    if let Some((name, value)) = auth {
        builder = builder.header(name, value);
    }
    builder.body(Body::empty()).unwrap()
}

fn cookie(secret: &str) -> Option<(&'static str, String)> {
    Some(("cookie", format!("heracles-auth={}", secret)))
}

fn bearer(token: &str) -> Option<(&'static str, String)> {
    Some(("authorization", format!("Bearer {}", token)))
}

fn basic(username: &str, password: &str) -> Option<(&'static str, String)> {
    Some((
        "authorization",
        format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password))),
    ))
}

fn user_header(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get("x-heracles-user")
        .and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_cookie_allows_granted_realm_with_alias() {
    // Arrange
    let app = alice_app().await;
    let secret = app.login("alice").await;

    // Act
    let response = app.request(validate_request(Some("ci"), cookie(&secret))).await;

    // Assert
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(user_header(&response), Some("ci-bot"));
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
}

#[tokio::test]
async fn test_every_credential_form_resolves_alice() {
    let app = alice_app().await;
    let secret = app.login("alice").await;

    for auth in [
        bearer("tok-123"),
        bearer(&secret),
        basic("alice", "tok-123"),
        basic("alice", PASSWORD),
    ] {
        let response = app.request(validate_request(Some("ci"), auth)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(user_header(&response), Some("ci-bot"));
    }
}

#[tokio::test]
async fn test_basic_token_must_belong_to_named_user() {
    let app = alice_app().await;
    app.create_user("bob", false).await;

    let response = app
        .request(validate_request(Some("ci"), basic("bob", "tok-123")))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_realm_without_grant_is_denied() {
    let app = alice_app().await;

    let response = app
        .request(validate_request(Some("payroll"), bearer("tok-123")))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(user_header(&response).is_none());
    assert_eq!(body_json(response).await["error"], "Unauthorized");

    let entries = app.store.list_recent_audit_entries(10).await.unwrap();
    assert_eq!(entries[0].action, AuditAction::RealmAccessDenied.as_str());
    assert_eq!(entries[0].data.0["realm"], "payroll");
}

#[tokio::test]
async fn test_unknown_realm_and_unknown_credentials_look_alike() {
    let app = alice_app().await;

    let unknown_realm = app
        .request(validate_request(Some("nope"), bearer("tok-123")))
        .await;
    let bad_token = app
        .request(validate_request(Some("ci"), bearer("tok-999")))
        .await;
    let anonymous = app.request(validate_request(Some("ci"), None)).await;

    assert_eq!(unknown_realm.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(bad_token.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    let expected = body_json(anonymous).await;
    assert_eq!(body_json(unknown_realm).await, expected);
    assert_eq!(body_json(bad_token).await, expected);
}

#[tokio::test]
async fn test_missing_realm_is_bad_request() {
    let app = alice_app().await;

    let missing = app.request(validate_request(None, bearer("tok-123"))).await;
    let blank = app
        .request(validate_request(Some("  "), bearer("tok-123")))
        .await;

    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_quiet_mode_hides_denials() {
    let app = alice_app().await;

    for request in [
        validate_uri_request("/api/validate?quiet=true", Some("payroll"), bearer("tok-123")),
        validate_uri_request("/api/validate?quiet=true", None, bearer("tok-123")),
        validate_uri_request("/api/validate?quiet=true", Some("ci"), None),
    ] {
        let response = app.request(request).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(user_header(&response).is_none());
    }

    // Allowed requests still carry the identity
    let allowed = app
        .request(validate_uri_request(
            "/api/validate?quiet=true",
            Some("ci"),
            bearer("tok-123"),
        ))
        .await;
    assert_eq!(user_header(&allowed), Some("ci-bot"));
}

#[tokio::test]
async fn test_non_api_token_validates_but_cannot_manage() {
    let app = alice_app().await;
    let alice = app
        .store
        .get_user_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    app.create_token(&alice, "tok-proxy-only", false).await;

    let validate = app
        .request(validate_request(Some("ci"), bearer("tok-proxy-only")))
        .await;
    assert_eq!(validate.status(), StatusCode::NO_CONTENT);

    let identity = app
        .request(common::bearer_request("GET", "/api/identity", "tok-proxy-only"))
        .await;
    assert_eq!(identity.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_needs_a_grant_too() {
    let app = alice_app().await;
    let admin = app.create_user("root", true).await;
    let ci = app.store.get_realm_by_name("ci").await.unwrap().unwrap();

    let denied = app
        .request(validate_request(Some("ci"), basic("root", PASSWORD)))
        .await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    app.grant(&admin, &ci, Some("svc-admin")).await;
    let allowed = app
        .request(validate_request(Some("ci"), basic("root", PASSWORD)))
        .await;
    assert_eq!(allowed.status(), StatusCode::NO_CONTENT);
    assert_eq!(user_header(&allowed), Some("svc-admin"));
}

#[tokio::test]
async fn test_linked_providers_are_forwarded() {
    let app = TestApp::new();
    let carol = app
        .store
        .create_user(
            NewUser::new("carol")
                .with_external_id(ExternalProvider::Discord, "80351110224678912".to_string()),
            None,
        )
        .await
        .unwrap();
    app.create_token(&carol, "tok-carol", true).await;
    let ci = app.create_realm("ci").await;
    app.grant(&carol, &ci, None).await;

    let response = app
        .request(validate_request(Some("ci"), bearer("tok-carol")))
        .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(user_header(&response), Some("carol"));
    assert_eq!(
        response.headers().get("x-heracles-discord-id").unwrap(),
        "80351110224678912"
    );
    assert!(response.headers().get("x-heracles-github-id").is_none());
}

#[tokio::test]
async fn test_validate_is_not_capped_by_the_global_ip_limit() {
    let mut config = test_config();
    config.rate_limit.global_ip_limit = 3;
    let app = TestApp::with_config(config);
    let alice = app.create_user("alice", false).await;
    app.create_token(&alice, "tok-123", true).await;
    let ci = app.create_realm("ci").await;
    app.grant(&alice, &ci, None).await;

    // Every auth subrequest comes from the reverse proxy's address
    for _ in 0..20 {
        let response = app
            .request(from_peer(
                validate_request(Some("ci"), bearer("tok-123")),
                "10.0.0.1",
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    // The rest of the surface still is
    let mut statuses = Vec::new();
    for _ in 0..4 {
        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        statuses.push(app.request(from_peer(health, "10.0.0.1")).await.status());
    }
    assert_eq!(statuses[2], StatusCode::OK);
    assert_eq!(statuses[3], StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_federated_login_secret_validates() {
    let mut config = test_config();
    config.federation = AutoProvision {
        discord: true,
        github: false,
    };
    let app = TestApp::with_config(config);
    let ci = app.create_realm("ci").await;

    let issued = app
        .state
        .federation
        .login(ExternalProvider::Discord, "80351110224678912", "andrei")
        .await
        .unwrap();
    app.grant(&issued.user, &ci, None).await;

    let response = app
        .request(validate_request(Some("ci"), cookie(&issued.secret)))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(user_header(&response), Some("andrei"));
}
