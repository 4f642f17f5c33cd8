/*
 * Responsibility
 * - GET /.well-known/oauth-authorization-server
 */
use axum::{Json, extract::State, http::HeaderMap};

use crate::error::AppError;
use crate::services::metadata::OAuth2MetadataResponse;
use crate::state::AppState;

pub async fn oauth2_metadata(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<OAuth2MetadataResponse>, AppError> {
    let doc = state.metadata.oauth2_metadata(&headers).await.map_err(|err| {
        tracing::warn!(error = %err, "authorization server metadata unavailable");
        AppError::from(err)
    })?;

    Ok(Json(doc))
}
