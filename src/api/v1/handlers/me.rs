/*
 * Responsibility
 * - GET /me: summary of the caller's identity
 * - anonymous callers pass the blanket interceptor, so they are rejected here
 */
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::v1::extractors::IdentityExtractor;
use crate::error::AppError;
use crate::services::auth::ScopeSet;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_identity: Option<String>,
    pub scopes: ScopeSet,
    pub authenticated_at: DateTime<Utc>,
    pub token_expires_at: DateTime<Utc>,
}

pub async fn me(
    IdentityExtractor(identity): IdentityExtractor,
) -> Result<Json<MeResponse>, AppError> {
    let identity = identity
        .identity()
        .ok_or_else(|| AppError::unauthenticated("authentication required"))?;

    Ok(Json(MeResponse {
        subject: identity.subject.clone(),
        execution_identity: identity.execution_identity.clone(),
        scopes: identity.scopes.clone(),
        authenticated_at: identity.authenticated_at,
        token_expires_at: identity.token_expires_at,
    }))
}
