/*
 * Responsibility
 * - POST /logout: expire the access + refresh cookies
 * - optional `redirect_url` (same-site path only) turns 204 into 303
 */
use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LogoutQuery {
    pub redirect_url: Option<String>,
}

pub async fn logout(
    State(state): State<AppState>,
    Query(query): Query<LogoutQuery>,
) -> Result<Response, AppError> {
    let mut headers = HeaderMap::new();
    state.cookies.delete_cookies(&mut headers);

    let Some(redirect) = query.redirect_url.filter(|r| !r.is_empty()) else {
        return Ok((StatusCode::NO_CONTENT, headers).into_response());
    };

    if !is_local_path(&redirect) {
        return Err(AppError::InvalidRequest(
            "redirect_url must be a path on this site".to_string(),
        ));
    }
    let location = HeaderValue::from_str(&redirect)
        .map_err(|_| AppError::InvalidRequest("redirect_url is not a valid header".to_string()))?;
    headers.insert(header::LOCATION, location);

    Ok((StatusCode::SEE_OTHER, headers).into_response())
}

// Rejects absolute and protocol-relative URLs (open redirect).
fn is_local_path(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//") && !url.contains('\\')
}
