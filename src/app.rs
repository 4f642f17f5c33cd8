/*
 * Responsibility
 * - load Config, build the shared services, assemble the Router
 * - tracing + panic hook setup
 * - axum::serve()
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{Router, http::HeaderName};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::services::auth::{build_key_provider, build_token_validator};
use crate::services::cookie::CookieManager;
use crate::services::metadata::{HttpMetadataFetcher, MetadataProvider};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins when set, e.g. RUST_LOG=info,flyte_auth=debug,tower_http=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        mode = ?config.server_mode,
        secure = config.secure,
        "starting auth service in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Everything here is fatal: the service must not serve with bad keys.
pub fn build_state(config: &Config) -> Result<AppState> {
    let cookies = CookieManager::new(
        &config.cookie_hash_key,
        &config.cookie_block_key,
        config.cookie_settings(),
    )
    .context("invalid cookie key material")?;

    let validator = build_token_validator(config).context("invalid access token verifier")?;
    let keys = build_key_provider(config).context("invalid published key set")?;

    let fetcher = HttpMetadataFetcher::new(Duration::from_secs(config.metadata_timeout_seconds))
        .context("failed to build metadata http client")?;
    let metadata = MetadataProvider::new(
        config.metadata_settings(),
        config.client_settings(),
        Arc::new(fetcher),
    );

    let auth_header = HeaderName::try_from(config.auth_header_name.as_str())
        .context("invalid AUTH_HEADER_NAME")?;

    Ok(AppState::new(
        Arc::new(cookies),
        validator,
        keys,
        Arc::new(metadata),
        auth_header,
    ))
}

/// Interceptors must be registered on `state.interceptors` before traffic
/// starts; the registry is read on every protected request.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .merge(api::v1::routes(state.clone()))
        .with_state(state);

    middleware::http::apply(router)
}
