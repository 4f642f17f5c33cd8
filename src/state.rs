/*
 * Responsibility
 * - shared context attached to the Router (AppState)
 * - Clone is cheap: every field sits behind an Arc
 */
use std::sync::Arc;

use axum::http::HeaderName;

use crate::services::auth::{InterceptorRegistry, PublicKeyProvider, TokenValidator};
use crate::services::cookie::CookieManager;
use crate::services::metadata::MetadataProvider;

#[derive(Clone)]
pub struct AppState {
    pub cookies: Arc<CookieManager>,
    pub validator: Arc<dyn TokenValidator>,
    pub interceptors: Arc<InterceptorRegistry>,
    pub keys: Arc<dyn PublicKeyProvider>,
    pub metadata: Arc<MetadataProvider>,
    /// Header carrying bearer tokens besides `Authorization`.
    pub auth_header: HeaderName,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("cookies", &self.cookies)
            .field("interceptors", &self.interceptors)
            .field("metadata", &self.metadata)
            .field("auth_header", &self.auth_header)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        cookies: Arc<CookieManager>,
        validator: Arc<dyn TokenValidator>,
        keys: Arc<dyn PublicKeyProvider>,
        metadata: Arc<MetadataProvider>,
        auth_header: HeaderName,
    ) -> Self {
        Self {
            cookies,
            validator,
            interceptors: Arc::new(InterceptorRegistry::new()),
            keys,
            metadata,
            auth_header,
        }
    }
}
