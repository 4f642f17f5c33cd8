/*
 * Responsibility
 * - URL layout
 * - discovery + health are public; /me and /logout go through
 *   identity -> authorization interceptor -> handler
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{
    client::flyte_client, health::health, jwks::serve_key_set, logout::logout, me::me,
    metadata::oauth2_metadata,
};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health))
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth2_metadata),
        )
        .route("/oauth2/jwks", serve_key_set(state.keys.clone()))
        .route("/config/v1/flyte_client", get(flyte_client));

    let protected = Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout));
    let protected = middleware::auth::authorize::apply(protected, state.clone());
    let protected = middleware::auth::identity::apply(protected, state);

    public.merge(protected)
}
