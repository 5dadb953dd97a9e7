//! Browser-facing login and logout.

use axum::{
    extract::State,
    http::{header::LOCATION, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use service_core::error::AppError;

use crate::config::CookieConfig;
use crate::dtos::{ErrorResponse, LoginRequest};
use crate::services::ServiceError;
use crate::utils::{Password, ValidatedPayload};
use crate::AppState;

/// Build the auth cookie carrying a signed secret.
pub(crate) fn auth_cookie(config: &CookieConfig, secret: String) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.name.clone(), secret))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .max_age(time::Duration::days(config.max_age_days));
    if let Some(domain) = &config.domain {
        cookie = cookie.domain(domain.clone());
    }
    cookie.build()
}

/// Expired, empty auth cookie. Sent even when the request carried none.
fn removal_cookie(config: &CookieConfig) -> Cookie<'static> {
    let mut builder = Cookie::build((config.name.clone(), "")).path("/");
    if let Some(domain) = &config.domain {
        builder = builder.domain(domain.clone());
    }
    let mut cookie = builder.build();
    cookie.make_removal();
    cookie
}

/// 302 Found. `Redirect` in axum only offers 303/307/308.
fn found(location: HeaderValue) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

fn parse_return_url(r: Option<&str>) -> Result<Option<HeaderValue>, AppError> {
    let Some(r) = r.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    let uri: Uri = r
        .parse()
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid return URL")))?;
    HeaderValue::from_str(&uri.to_string())
        .map(Some)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid return URL")))
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 204, description = "Logged in, auth cookie set"),
        (status = 302, description = "Logged in, redirecting to the requested URL"),
        (status = 400, description = "Invalid return URL", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many login attempts", body = ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedPayload(req): ValidatedPayload<LoginRequest>,
) -> Result<(CookieJar, Response), AppError> {
    let redirect = parse_return_url(req.r.as_deref())?;

    let issued = state
        .sessions
        .password_login(&req.username, &Password::new(req.password))
        .await
        .map_err(|e| match e {
            ServiceError::Unauthenticated => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            other => AppError::from(other),
        })?;

    tracing::info!(user_id = issued.user.id, "User logged in");
    let jar = jar.add(auth_cookie(&state.config.cookie, issued.secret));

    let response = match redirect {
        Some(location) => found(location),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok((jar, response))
}

/// Clear the auth cookie and return to the site root
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 302, description = "Cookie cleared, redirecting to /")),
    tag = "Session"
)]
pub async fn logout_redirect(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Response) {
    (
        jar.add(removal_cookie(&state.config.cookie)),
        found(HeaderValue::from_static("/")),
    )
}

/// Clear the auth cookie
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 204, description = "Cookie cleared")),
    tag = "Session"
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    (
        jar.add(removal_cookie(&state.config.cookie)),
        StatusCode::NO_CONTENT,
    )
}
