//! Resolve the caller's identity and attach it to the request.
//!
//! Order:
//! 1. bearer token in the configured header (`flyte-authorization` by default)
//!    or `Authorization: Bearer`. A token that fails validation is a 401.
//! 2. the `flyte_at` cookie family, opened by the cookie store. Any failure
//!    (missing, tampered, expired, rejected token) leaves the call anonymous.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, Request, header},
    middleware::{self, Next},
    response::Response,
};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::services::auth::IdentityContext;
use crate::services::cookie::DecodeError;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, identity_middleware))
}

async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = match bearer_token(req.headers(), &state.auth_header) {
        Some(token) => match state.validator.validate(token) {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = ?err, "bearer token verification failed");
                return Err(AppError::unauthenticated("invalid bearer token"));
            }
        },
        None => identity_from_cookies(&state, req.headers()),
    };

    debug!(
        subject = identity.subject().unwrap_or("anonymous"),
        "resolved request identity"
    );
    identity.attach(req.extensions_mut());

    Ok(next.run(req).await)
}

fn identity_from_cookies(state: &AppState, headers: &HeaderMap) -> IdentityContext {
    let values = match state.cookies.retrieve_token_values(headers) {
        Ok(values) => values,
        Err(DecodeError::Missing(_)) => return IdentityContext::Anonymous,
        Err(err) => {
            warn!(error = %err, "discarding unreadable token cookies");
            return IdentityContext::Anonymous;
        }
    };

    match state.validator.validate(&values.access_token) {
        Ok(identity) => identity,
        Err(err) => {
            debug!(error = ?err, "cookie access token rejected");
            IdentityContext::Anonymous
        }
    }
}

/// The custom header may carry the token with or without the `Bearer` scheme.
fn bearer_token<'a>(headers: &'a HeaderMap, custom: &HeaderName) -> Option<&'a str> {
    if let Some(value) = header_str(headers, custom) {
        return Some(strip_bearer(value).unwrap_or(value)).filter(|t| !t.is_empty());
    }

    header_str(headers, &header::AUTHORIZATION)
        .and_then(strip_bearer)
        .filter(|t| !t.is_empty())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn strip_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
}
