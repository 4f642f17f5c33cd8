use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::IdentityContext;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, authorize_middleware))
}

async fn authorize_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = IdentityContext::from_extensions(req.extensions());
    let interceptor = state.interceptors.get();

    tracing::trace!(interceptor = interceptor.name(), "authorizing request");
    interceptor.intercept(identity, req, next).await
}
