//! Shared setup for heracles integration tests.
//!
//! Every test drives the full router over an in-memory store, so no
//! database is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, Response, StatusCode},
    Router,
};
use heracles::{
    build_router,
    config::{
        BootstrapConfig, CookieConfig, DatabaseConfig, Environment, HeraclesConfig,
        RateLimitConfig, SecurityConfig,
    },
    models::{NewUser, NewUserToken, Realm, TokenFlags, User, UserFlags},
    services::{AutoProvision, MemoryStore, PasswordHasher, Store},
    utils::{HashCost, Password},
    AppState,
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use service_core::config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_SECRET_KEY: &str = "integration-test-signing-key-0123456789abcdef";
pub const COOKIE_NAME: &str = "heracles-auth";
pub const PASSWORD: &str = "correcthorse";

pub fn test_config() -> HeraclesConfig {
    HeraclesConfig {
        common: Config {
            port: 8080,
            host: "127.0.0.1".to_string(),
        },
        environment: Environment::Dev,
        service_name: "heracles-test".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        security: SecurityConfig {
            secret_key: SecretString::new(TEST_SECRET_KEY.to_string()),
            audit_realm_denials: true,
        },
        password_hash: HashCost::MINIMAL,
        cookie: CookieConfig {
            name: COOKIE_NAME.to_string(),
            domain: None,
            secure: false,
            max_age_days: 14,
        },
        request_timeout_seconds: 15,
        federation: AutoProvision::default(),
        bootstrap: BootstrapConfig {
            admin_username: "admin".to_string(),
            admin_password: SecretString::new("admin".to_string()),
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
            trusted_proxies: Vec::new(),
        },
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: HeraclesConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config, store.clone()).expect("Failed to build app state");
        let router = build_router(state.clone());
        Self {
            state,
            store,
            router,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible")
    }

    /// A user with `PASSWORD` as password.
    pub async fn create_user(&self, username: &str, admin: bool) -> User {
        let hasher = PasswordHasher::new(HashCost::MINIMAL).unwrap();
        let hash = hasher.hash(Password::new(PASSWORD.to_string())).await.unwrap();
        let mut user = NewUser::new(username).with_password_hash(hash);
        if admin {
            user = user.with_flags(UserFlags::ADMIN);
        }
        self.store.create_user(user, None).await.unwrap()
    }

    pub async fn create_token(&self, user: &User, token: &str, api: bool) {
        self.store
            .create_token(
                NewUserToken {
                    user_id: user.id,
                    name: format!("{}-token", user.username),
                    token: token.to_string(),
                    flags: TokenFlags::for_new_token(api),
                },
                None,
            )
            .await
            .unwrap();
    }

    pub async fn create_realm(&self, name: &str) -> Realm {
        self.store.create_realm(name, None).await.unwrap()
    }

    pub async fn grant(&self, user: &User, realm: &Realm, alias: Option<&str>) {
        self.store.create_grant(user.id, realm.id, alias, None).await.unwrap();
    }

    /// Log in through `POST /login` and return the auth cookie value.
    pub async fn login(&self, username: &str) -> String {
        let response = self
            .request(form_post(
                "/login",
                &[("username", username), ("password", PASSWORD)],
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        auth_cookie(&response).expect("Login did not set the auth cookie")
    }
}

pub fn form_post(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(serde_urlencoded::to_string(fields).unwrap()))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, bearer: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bearer_request(method: &str, uri: &str, bearer: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
        .body(Body::empty())
        .unwrap()
}

/// Mark `request` as arriving on a socket from `ip`, as the server's
/// connect-info layer would.
pub fn from_peer(mut request: Request<Body>, ip: &str) -> Request<Body> {
    let addr = SocketAddr::new(ip.parse().unwrap(), 51000);
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// Value of the auth cookie set by a response, if any.
pub fn auth_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            let pair = v.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            (name.trim() == COOKIE_NAME).then(|| value.trim().to_string())
        })
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
