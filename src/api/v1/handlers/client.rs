/*
 * Responsibility
 * - GET /config/v1/flyte_client: static bootstrap settings for CLI/SDK clients
 */
use axum::{Json, extract::State};

use crate::services::metadata::ClientBootstrapResponse;
use crate::state::AppState;

pub async fn flyte_client(State(state): State<AppState>) -> Json<ClientBootstrapResponse> {
    Json(state.metadata.flyte_client())
}
