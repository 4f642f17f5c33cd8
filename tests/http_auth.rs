//! Identity resolution and the authorization interceptor on protected routes.
mod common;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::middleware::Next;
use common::{cookie_header, cookie_manager, read_json, sign, state};
use flyte_auth::app::build_router;
use flyte_auth::error::AppError;
use flyte_auth::services::auth::IdentityContext;
use flyte_auth::services::auth::interceptor::{BoxFuture, InterceptResult};
use flyte_auth::services::cookie::TokenBundle;
use tower::ServiceExt;

fn me_with(name: &str, value: &str) -> Request<Body> {
    Request::builder()
        .uri("/me")
        .header(name, value)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn anonymous_passes_interceptor_but_handler_requires_identity() {
    let request = Request::builder().uri("/me").body(Body::empty()).expect("request");
    let response = build_router(state()).oneshot(request).await.expect("me");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"]["message"], "authentication required");
}

#[tokio::test]
async fn bearer_with_all_scope_is_allowed() {
    let token = sign("user-1", "all offline");
    let response = build_router(state())
        .oneshot(me_with("flyte-authorization", &format!("Bearer {token}")))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["subject"], "user-1");
    assert_eq!(body["scopes"], serde_json::json!(["all", "offline"]));
}

#[tokio::test]
async fn authorization_header_is_accepted() {
    let token = sign("user-2", "all");
    let response = build_router(state())
        .oneshot(me_with("authorization", &format!("Bearer {token}")))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_all_scope_is_rejected_by_blanket_policy() {
    let token = sign("user-1", "read");
    let response = build_router(state())
        .oneshot(me_with("authorization", &format!("Bearer {token}")))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
    assert_eq!(
        body["error"]["message"],
        "authenticated user doesn't have required scope 'all'"
    );
}

#[tokio::test]
async fn invalid_bearer_token_is_rejected() {
    let response = build_router(state())
        .oneshot(me_with("authorization", "Bearer not-a-jwt"))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cookie_session_resolves_identity() {
    let mut set_cookies = HeaderMap::new();
    cookie_manager()
        .set_token_cookies(
            &mut set_cookies,
            &TokenBundle {
                access_token: sign("browser-user", "all"),
                refresh_token: "refresh".to_string(),
                id_token: "id".to_string(),
                expiry: None,
            },
        )
        .expect("cookies");

    let request = Request::builder()
        .uri("/me")
        .header(header::COOKIE, cookie_header(&set_cookies))
        .body(Body::empty())
        .expect("request");
    let response = build_router(state()).oneshot(request).await.expect("me");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["subject"], "browser-user");
}

#[tokio::test]
async fn unreadable_cookie_falls_back_to_anonymous() {
    let request = Request::builder()
        .uri("/me")
        .header(header::COOKIE, "flyte_at=garbage; flyte_rt=also-garbage")
        .body(Body::empty())
        .expect("request");
    let response = build_router(state()).oneshot(request).await.expect("me");
    // anonymous: the interceptor lets it through and the handler asks for credentials
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        read_json(response).await["error"]["message"],
        "authentication required"
    );
}

fn admins_only(
    identity: IdentityContext,
    req: Request<Body>,
    next: Next,
) -> BoxFuture<'static, InterceptResult> {
    Box::pin(async move {
        if identity.subject() != Some("admin") {
            return Err(AppError::unauthenticated("admins only"));
        }
        Ok(next.run(req).await)
    })
}

fn closed(
    _identity: IdentityContext,
    _req: Request<Body>,
    _next: Next,
) -> BoxFuture<'static, InterceptResult> {
    Box::pin(async move { Err(AppError::unauthenticated("closed")) })
}

#[tokio::test]
async fn registered_interceptor_replaces_blanket_policy() {
    let state = state();
    state.interceptors.register(admins_only);
    let app = build_router(state);

    // holds "all", still rejected by the custom policy
    let token = sign("user-1", "all");
    let response = app
        .clone()
        .oneshot(me_with("authorization", &format!("Bearer {token}")))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"]["message"], "admins only");

    // lacks "all", allowed by the custom policy
    let token = sign("admin", "read");
    let response = app
        .oneshot(me_with("authorization", &format!("Bearer {token}")))
        .await
        .expect("me");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn public_routes_skip_the_interceptor() {
    let state = state();
    state.interceptors.register(closed);

    let request = Request::builder().uri("/oauth2/jwks").body(Body::empty()).expect("request");
    let response = build_router(state).oneshot(request).await.expect("jwks");
    assert_eq!(response.status(), StatusCode::OK);
}
