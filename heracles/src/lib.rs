pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Json, Router,
};
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::HeraclesConfig;
use crate::middleware::{admin_middleware, auth_middleware, metrics_middleware};
use crate::services::{
    AdminService, AuditRecorder, CredentialResolver, FederatedLogin, GatewayFacade,
    PasswordHasher, RealmAuthorizer, SecretCodec, SessionService, Store, TokenService,
};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::metrics::metrics,
        handlers::session::login,
        handlers::session::logout_redirect,
        handlers::session::logout,
        handlers::validate::validate,
        handlers::identity::get_identity,
        handlers::identity::update_identity,
        handlers::identity::reissue_secret,
        handlers::tokens::list_tokens,
        handlers::tokens::create_token,
        handlers::tokens::update_token,
        handlers::tokens::delete_token,
        handlers::admin::list_users,
        handlers::admin::create_user,
        handlers::admin::list_realms,
        handlers::admin::create_realm,
        handlers::admin::list_grants,
        handlers::admin::create_grant,
        handlers::admin::update_grant,
        handlers::admin::recent_log,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::LoginRequest,
            dtos::SecretResponse,
            dtos::UpdateIdentityRequest,
            dtos::CreateTokenRequest,
            dtos::UpdateTokenRequest,
            dtos::CreateUserRequest,
            dtos::CreateRealmRequest,
            dtos::CreateGrantRequest,
            dtos::UpdateGrantRequest,
            dtos::TokenList,
            dtos::UserList,
            dtos::RealmList,
            dtos::GrantList,
            dtos::AuditLogList,
            models::UserResponse,
            models::TokenResponse,
            models::Realm,
            models::UserRealmGrant,
            models::AuditLogEntry,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Session", description = "Interactive login and logout"),
        (name = "Gateway", description = "Reverse-proxy access decisions"),
        (name = "Identity", description = "The authenticated user"),
        (name = "Tokens", description = "API token management"),
        (name = "Admin", description = "Users, realms, grants and the audit log"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "heracles_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("heracles-auth"))),
            );
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: HeraclesConfig,
    pub store: Arc<dyn Store>,
    pub resolver: CredentialResolver,
    pub gateway: GatewayFacade,
    pub sessions: SessionService,
    /// Account lookup and provisioning for the OAuth callback. No route
    /// drives it until a provider exchange is configured.
    pub federation: FederatedLogin,
    pub tokens: TokenService,
    pub admin: AdminService,
    pub audit: AuditRecorder,
    pub login_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire every service around one store. Fails only on an unusable
    /// signer key or hash cost.
    pub fn new(config: HeraclesConfig, store: Arc<dyn Store>) -> Result<Self, AppError> {
        let codec = SecretCodec::new(&config.security.secret_key).map_err(AppError::ConfigError)?;
        let hasher = PasswordHasher::new(config.password_hash).map_err(AppError::ConfigError)?;
        let audit = AuditRecorder::new(store.clone());

        let resolver = CredentialResolver::new(store.clone(), codec.clone(), hasher.clone());
        let gateway = GatewayFacade::new(
            store.clone(),
            resolver.clone(),
            RealmAuthorizer::new(store.clone()),
            hasher.clone(),
            audit.clone(),
            config.security.audit_realm_denials,
        );
        let sessions = SessionService::new(store.clone(), codec, hasher.clone(), audit.clone());
        let federation =
            FederatedLogin::new(store.clone(), sessions.clone(), config.federation);
        let tokens = TokenService::new(store.clone());
        let admin = AdminService::new(store.clone(), hasher);

        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
            config.rate_limit.trusted_proxies.clone(),
        );
        let ip_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
            config.rate_limit.trusted_proxies.clone(),
        );

        Ok(Self {
            config,
            store,
            resolver,
            gateway,
            sessions,
            federation,
            tokens,
            admin,
            audit,
            login_rate_limiter,
            ip_rate_limiter,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/api/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/api/realms",
            get(handlers::list_realms).post(handlers::create_realm),
        )
        .route(
            "/api/realms/:id/grants",
            get(handlers::list_grants).post(handlers::create_grant),
        )
        .route(
            "/api/realms/:id/grants/:user_id",
            patch(handlers::update_grant),
        )
        .route("/api/log/recent", get(handlers::recent_log))
        .route_layer(from_fn(admin_middleware));

    // Management API: credentials required, tokens need the API capability
    let api_routes = Router::new()
        .route(
            "/api/identity",
            get(handlers::get_identity).patch(handlers::update_identity),
        )
        .route("/api/identity/secret", post(handlers::reissue_secret))
        .route(
            "/api/tokens",
            get(handlers::list_tokens).post(handlers::create_token),
        )
        .route(
            "/api/tokens/:id",
            patch(handlers::update_token).delete(handlers::delete_token),
        )
        .merge(admin_routes)
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let login_route = Router::new()
        .route("/login", post(handlers::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();
    let request_timeout = Duration::from_secs(state.config.request_timeout_seconds);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route(
            "/logout",
            get(handlers::logout_redirect).post(handlers::logout),
        )
        .merge(login_route)
        .merge(api_routes)
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        // Added after the IP limit: auth subrequests all arrive from the proxy
        .route("/api/validate", get(handlers::validate))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    user_id = tracing::field::Empty,
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Store unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up"
        }
    })))
}
