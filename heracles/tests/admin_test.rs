//! Administrator routes: users, realms, grants and the audit log.

mod common;

use axum::http::StatusCode;
use common::{bearer_request, body_json, json_request, TestApp};
use heracles::models::AuditAction;
use heracles::services::Store;
use serde_json::json;

async fn admin_app() -> TestApp {
    let app = TestApp::new();
    let root = app.create_user("root", true).await;
    app.create_token(&root, "tok-root", true).await;
    let alice = app.create_user("alice", false).await;
    app.create_token(&alice, "tok-alice", true).await;
    app
}

#[tokio::test]
async fn test_admin_routes_reject_non_admins() {
    let app = admin_app().await;
    let anonymous = body_json(
        app.request(bearer_request("GET", "/api/users", "tok-unknown"))
            .await,
    )
    .await;

    for (method, uri) in [
        ("GET", "/api/users"),
        ("GET", "/api/realms"),
        ("GET", "/api/log/recent"),
    ] {
        let response = app.request(bearer_request(method, uri, "tok-alice")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        // Indistinguishable from having no credentials at all
        assert_eq!(body_json(response).await, anonymous);
    }

    let response = app
        .request(json_request(
            "POST",
            "/api/realms",
            "tok-alice",
            json!({"name": "ci"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app
        .store
        .get_realm_by_name("ci")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_admin_routes_require_credentials() {
    let app = admin_app().await;

    let response = app
        .request(bearer_request("GET", "/api/users", "tok-unknown"))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_and_list_users() {
    let app = admin_app().await;

    let created = app
        .request(json_request(
            "POST",
            "/api/users",
            "tok-root",
            json!({"username": "dave", "password": "hunter22", "admin": false}),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let dave = body_json(created).await;
    assert_eq!(dave["username"], "dave");
    assert_eq!(dave["admin"], false);

    let duplicate = app
        .request(json_request(
            "POST",
            "/api/users",
            "tok-root",
            json!({"username": "dave"}),
        ))
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let listed = body_json(
        app.request(bearer_request("GET", "/api/users", "tok-root"))
            .await,
    )
    .await;
    let names: Vec<&str> = listed["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"dave"));
    assert!(listed["users"][0].get("password_hash").is_none());

    // The new account can log in
    let login = app
        .request(common::form_post(
            "/login",
            &[("username", "dave"), ("password", "hunter22")],
        ))
        .await;
    assert_eq!(login.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_realm_and_grant_lifecycle() {
    let app = admin_app().await;

    // Realm
    let realm = app
        .request(json_request(
            "POST",
            "/api/realms",
            "tok-root",
            json!({"name": "ci"}),
        ))
        .await;
    assert_eq!(realm.status(), StatusCode::CREATED);
    let realm_id = body_json(realm).await["id"].as_i64().unwrap();

    let duplicate = app
        .request(json_request(
            "POST",
            "/api/realms",
            "tok-root",
            json!({"name": "ci"}),
        ))
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    // Grant
    let alice_id = body_json(
        app.request(bearer_request("GET", "/api/identity", "tok-alice"))
            .await,
    )
    .await["id"]
        .as_i64()
        .unwrap();
    let grants_uri = format!("/api/realms/{}/grants", realm_id);

    let grant = app
        .request(json_request(
            "POST",
            &grants_uri,
            "tok-root",
            json!({"user_id": alice_id, "alias": "ci-bot"}),
        ))
        .await;
    assert_eq!(grant.status(), StatusCode::CREATED);
    assert_eq!(body_json(grant).await["alias"], "ci-bot");

    let duplicate = app
        .request(json_request(
            "POST",
            &grants_uri,
            "tok-root",
            json!({"user_id": alice_id}),
        ))
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    // Alias replacement; blank falls back to the username
    let updated = app
        .request(json_request(
            "PATCH",
            &format!("{}/{}", grants_uri, alice_id),
            "tok-root",
            json!({"alias": "  "}),
        ))
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    assert!(body_json(updated).await["alias"].is_null());

    let listed = body_json(app.request(bearer_request("GET", &grants_uri, "tok-root")).await).await;
    assert_eq!(listed["grants"].as_array().unwrap().len(), 1);
    assert_eq!(listed["grants"][0]["user_id"], alice_id);

    let validate = app
        .request(
            axum::http::Request::builder()
                .uri("/api/validate")
                .header("x-heracles-realm", "ci")
                .header("authorization", "Bearer tok-alice")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(validate.status(), StatusCode::NO_CONTENT);
    assert_eq!(validate.headers().get("x-heracles-user").unwrap(), "alice");
}

#[tokio::test]
async fn test_grant_on_unknown_realm_or_user() {
    let app = admin_app().await;

    let unknown_realm = app
        .request(json_request(
            "POST",
            "/api/realms/424242/grants",
            "tok-root",
            json!({"user_id": 1}),
        ))
        .await;
    assert_eq!(unknown_realm.status(), StatusCode::NOT_FOUND);

    let realm = body_json(
        app.request(json_request(
            "POST",
            "/api/realms",
            "tok-root",
            json!({"name": "ci"}),
        ))
        .await,
    )
    .await;
    let unknown_user = app
        .request(json_request(
            "POST",
            &format!("/api/realms/{}/grants", realm["id"]),
            "tok-root",
            json!({"user_id": 424242}),
        ))
        .await;
    assert_eq!(unknown_user.status(), StatusCode::NOT_FOUND);

    let missing_grant = app
        .request(json_request(
            "PATCH",
            &format!("/api/realms/{}/grants/424242", realm["id"]),
            "tok-root",
            json!({"alias": "x"}),
        ))
        .await;
    assert_eq!(missing_grant.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recent_log_is_newest_first() {
    let app = admin_app().await;

    for name in ["ci", "payroll"] {
        app.request(json_request(
            "POST",
            "/api/realms",
            "tok-root",
            json!({"name": name}),
        ))
        .await;
    }

    let response = app
        .request(bearer_request("GET", "/api/log/recent", "tok-root"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let entries = body_json(response).await["entries"].clone();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], AuditAction::RealmCreate.as_str());
    assert_eq!(entries[0]["data"]["name"], "payroll");
    assert_eq!(entries[1]["data"]["name"], "ci");
}

#[tokio::test]
async fn test_grant_is_not_kept_without_its_audit_entry() {
    let app = admin_app().await;
    let ci = app.create_realm("ci").await;
    let alice = app
        .store
        .get_user_by_username("alice")
        .await
        .unwrap()
        .unwrap();

    app.store.set_audit_unavailable(true);
    let response = app
        .request(json_request(
            "POST",
            &format!("/api/realms/{}/grants", ci.id),
            "tok-root",
            json!({"user_id": alice.id, "alias": "ci-bot"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    app.store.set_audit_unavailable(false);

    // alice never gained access to the realm
    let denied = app
        .request(
            axum::http::Request::builder()
                .uri("/api/validate")
                .header("x-heracles-realm", "ci")
                .header("authorization", "Bearer tok-alice")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    assert!(app
        .store
        .list_grants_by_realm(ci.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_created_user_is_audited_with_its_id() {
    let app = admin_app().await;

    let created = app
        .request(json_request(
            "POST",
            "/api/users",
            "tok-root",
            json!({"username": "dave", "admin": true}),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let dave = body_json(created).await;

    let log = app.store.list_recent_audit_entries(1).await.unwrap();
    assert_eq!(log[0].action, AuditAction::UserCreate.as_str());
    assert_eq!(log[0].data.0["user_id"], dave["id"]);
    assert_eq!(log[0].data.0["admin"], true);
}
