//! Reverse-proxy `auth_request` endpoint.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

use crate::dtos::{ErrorResponse, ValidateQuery};
use crate::models::ExternalProvider;
use crate::services::{CredentialBag, ServiceError, ValidateOutcome, ValidatedIdentity};
use crate::AppState;

/// Realm the proxied resource belongs to.
pub const REALM_HEADER: &str = "x-heracles-realm";
/// Identity label the upstream should trust.
pub const USER_HEADER: &str = "x-heracles-user";

/// Decide whether the proxied request may reach its realm
#[utoipa::path(
    get,
    path = "/api/validate",
    params(
        ValidateQuery,
        ("X-Heracles-Realm" = Option<String>, Header, description = "Realm of the proxied resource")
    ),
    responses(
        (status = 204, description = "Allowed; identity headers set. In quiet mode also returned on denial, without headers"),
        (status = 400, description = "Missing realm", body = ErrorResponse),
        (status = 401, description = "Denied", body = ErrorResponse)
    ),
    tag = "Gateway"
)]
pub async fn validate(
    State(state): State<AppState>,
    Query(query): Query<ValidateQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let bag = CredentialBag::from_headers(&headers, &state.config.cookie.name);
    let realm = headers.get(REALM_HEADER).and_then(|v| v.to_str().ok());

    match state.gateway.validate(&bag, realm).await? {
        ValidateOutcome::Allow(identity) => identity_response(&identity),
        ValidateOutcome::Deny(_) if query.quiet => Ok(StatusCode::NO_CONTENT.into_response()),
        ValidateOutcome::Deny(reason) => Err(AppError::from(ServiceError::from(reason))),
    }
}

fn identity_response(identity: &ValidatedIdentity) -> Result<Response, AppError> {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(USER_HEADER, header_value(&identity.label)?);
    for provider in ExternalProvider::all() {
        if let Some(external_id) = identity.user.external_id(provider) {
            headers.insert(provider.identity_header(), header_value(external_id)?);
        }
    }
    Ok(response)
}

fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_bytes(value.as_bytes()).map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("Identity not representable as a header: {}", e))
    })
}
