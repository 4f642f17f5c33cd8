/*
 * Responsibility
 * - GET /oauth2/jwks: the current key set as a JWK Set document
 */
use std::sync::Arc;

use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get},
};

use crate::error::AppError;
use crate::services::auth::{PublicKeyProvider, build_key_set};

/// Route serving the provider's keys. The set is rebuilt per request.
pub fn serve_key_set<S>(provider: Arc<dyn PublicKeyProvider>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    get(move || {
        let provider = provider.clone();
        async move { key_set_response(provider.as_ref()) }
    })
}

fn key_set_response(provider: &dyn PublicKeyProvider) -> Response {
    let body = build_key_set(&provider.public_keys())
        .map_err(|err| AppError::internal(err.to_string()))
        .and_then(|set| {
            serde_json::to_vec(&set).map_err(|err| AppError::internal(err.to_string()))
        });

    match body {
        Ok(body) => (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to serve key set");
            err.into_response()
        }
    }
}
