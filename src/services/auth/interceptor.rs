//! Pluggable authorization hook run for every protected request.
//!
//! The registry holds exactly one interceptor. It starts with
//! [`BlanketAuthorization`] and `register` replaces it (last write wins).
//! It is owned by `AppState` and wired at startup; there is no global slot.
//!
//! `get` sits on the hot path of every request and is a lock-free load;
//! `register` swaps the whole slot atomically, so readers never see a
//! half-built interceptor.

use std::{future::Future, pin::Pin, sync::Arc};

use arc_swap::ArcSwap;
use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{info, warn};

use crate::error::AppError;
use crate::services::auth::identity::{ALL_SCOPE, IdentityContext};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type InterceptResult = Result<Response, AppError>;

/// Decide whether a request reaches its handler.
///
/// Implementations either run `next` (possibly wrapping it) or return an error
/// without calling it.
pub trait AuthorizationInterceptor: Send + Sync {
    fn intercept(
        &self,
        identity: IdentityContext,
        req: Request<Body>,
        next: Next,
    ) -> BoxFuture<'static, InterceptResult>;

    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> AuthorizationInterceptor for F
where
    F: Fn(IdentityContext, Request<Body>, Next) -> BoxFuture<'static, InterceptResult>
        + Send
        + Sync,
{
    fn intercept(
        &self,
        identity: IdentityContext,
        req: Request<Body>,
        next: Next,
    ) -> BoxFuture<'static, InterceptResult> {
        self(identity, req, next)
    }
}

/// Coarse all-or-nothing gate on the `all` scope.
///
/// Anonymous callers pass through: missing identity is left to downstream
/// handlers to reject.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlanketAuthorization;

impl BlanketAuthorization {
    pub fn check(identity: &IdentityContext) -> Result<(), AppError> {
        if identity.is_empty() || identity.scopes().has(ALL_SCOPE) {
            return Ok(());
        }

        warn!(
            subject = identity.subject().unwrap_or_default(),
            "caller lacks the '{ALL_SCOPE}' scope"
        );
        Err(AppError::unauthenticated(format!(
            "authenticated user doesn't have required scope '{ALL_SCOPE}'"
        )))
    }
}

impl AuthorizationInterceptor for BlanketAuthorization {
    fn intercept(
        &self,
        identity: IdentityContext,
        req: Request<Body>,
        next: Next,
    ) -> BoxFuture<'static, InterceptResult> {
        Box::pin(async move {
            Self::check(&identity)?;
            Ok(next.run(req).await)
        })
    }

    fn name(&self) -> &str {
        "blanket"
    }
}

struct Slot(Arc<dyn AuthorizationInterceptor>);

pub struct InterceptorRegistry {
    current: ArcSwap<Slot>,
}

impl std::fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("current", &self.get().name())
            .finish()
    }
}

impl Default for InterceptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Slot(Arc::new(BlanketAuthorization))),
        }
    }

    /// Replace the active interceptor.
    pub fn register<I>(&self, interceptor: I)
    where
        I: AuthorizationInterceptor + 'static,
    {
        info!(
            interceptor = interceptor.name(),
            "registering authorization interceptor"
        );
        self.current.store(Arc::new(Slot(Arc::new(interceptor))));
    }

    pub fn get(&self) -> Arc<dyn AuthorizationInterceptor> {
        self.current.load().0.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::services::auth::identity::AuthenticatedIdentity;

    fn identity(scopes: &[&str]) -> IdentityContext {
        IdentityContext::authenticated(AuthenticatedIdentity {
            subject: "svc".to_string(),
            execution_identity: Some("exec-1".to_string()),
            authenticated_at: Utc::now(),
            token_expires_at: Utc::now(),
            scopes: scopes.iter().copied().collect(),
            claims: serde_json::Map::new(),
        })
    }

    struct Named(&'static str);

    impl AuthorizationInterceptor for Named {
        fn intercept(
            &self,
            _identity: IdentityContext,
            req: Request<Body>,
            next: Next,
        ) -> BoxFuture<'static, InterceptResult> {
            Box::pin(async move { Ok(next.run(req).await) })
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn blanket_allows_anonymous() {
        assert!(BlanketAuthorization::check(&IdentityContext::Anonymous).is_ok());
    }

    #[test]
    fn blanket_rejects_missing_all_scope() {
        let err = BlanketAuthorization::check(&identity(&["read", "ALL"])).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated { .. }));
    }

    #[test]
    fn blanket_allows_all_scope() {
        assert!(BlanketAuthorization::check(&identity(&["read", "all"])).is_ok());
    }

    #[test]
    fn defaults_to_blanket_and_last_registration_wins() {
        let registry = InterceptorRegistry::new();
        assert_eq!(registry.get().name(), "blanket");

        registry.register(Named("first"));
        assert_eq!(registry.get().name(), "first");

        registry.register(Named("second"));
        assert_eq!(registry.get().name(), "second");
    }

    #[test]
    fn closures_can_be_registered() {
        let registry = InterceptorRegistry::new();
        registry.register(|_identity: IdentityContext, req: Request<Body>, next: Next| {
            Box::pin(async move { Ok(next.run(req).await) }) as BoxFuture<'static, InterceptResult>
        });
        assert_eq!(registry.get().name(), "custom");
    }

    #[test]
    fn concurrent_readers_see_a_complete_interceptor() {
        let registry = Arc::new(InterceptorRegistry::new());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let name = registry.get().name().to_string();
                        assert!(name == "blanket" || name == "swapped");
                    }
                })
            })
            .collect();

        registry.register(Named("swapped"));
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.get().name(), "swapped");
    }
}
