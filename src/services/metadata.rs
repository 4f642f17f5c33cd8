//! OAuth2 authorization-server discovery (RFC 8414) and client bootstrap.
//!
//! In self-hosted mode the document is built from configuration and the
//! public base URL of the inbound request. In external mode it is fetched
//! from the identity provider on every call; failures are returned as-is.

use std::{str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const WELL_KNOWN_METADATA_PATH: &str = ".well-known/oauth-authorization-server";
pub const AUTHORIZE_PATH: &str = "oauth2/authorize";
pub const TOKEN_PATH: &str = "oauth2/token";
pub const JWKS_PATH: &str = "oauth2/jwks";

const FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("cannot derive public url: request carries no host")]
    MissingHost,
    #[error("request host '{0}' is not a valid authority")]
    InvalidHost(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("failed to fetch authorization server metadata: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("failed to parse authorization server metadata: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2MetadataResponse {
    pub issuer: String,
    #[serde(default)]
    pub authorization_endpoint: String,
    #[serde(default)]
    pub token_endpoint: String,
    #[serde(default)]
    pub jwks_uri: String,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub grant_types_supported: Vec<String>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientBootstrapResponse {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Header name clients put their bearer token in.
    pub authorization_metadata_key: String,
    pub service_http_endpoint: String,
    pub audience: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthorizationServerMode {
    #[default]
    SelfHosted,
    External,
}

impl FromStr for AuthorizationServerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "self" | "selfhosted" | "self_hosted" => Ok(Self::SelfHosted),
            "external" => Ok(Self::External),
            other => Err(format!("unknown authorization server type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataSettings {
    pub mode: AuthorizationServerMode,
    pub public_url: Option<Url>,
    pub external_base_url: Option<Url>,
    pub openid_base_url: Option<Url>,
    pub grant_types: Vec<String>,
    /// TLS posture of this service; picks the scheme of derived URLs.
    pub secure: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub header_name: String,
    pub audience: String,
}

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<OAuth2MetadataResponse, MetadataError>;
}

/// Plain GET, no retries. Non-2xx responses are errors.
#[derive(Debug, Clone)]
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
}

impl HttpMetadataFetcher {
    pub fn new(timeout: Duration) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, url: &Url) -> Result<OAuth2MetadataResponse, MetadataError> {
        let body = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(serde_json::from_slice(&body)?)
    }
}

pub struct MetadataProvider {
    settings: MetadataSettings,
    client: ClientSettings,
    fetcher: Arc<dyn MetadataFetcher>,
}

impl std::fmt::Debug for MetadataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataProvider")
            .field("settings", &self.settings)
            .field("client", &self.client)
            .finish()
    }
}

impl MetadataProvider {
    pub fn new(
        settings: MetadataSettings,
        client: ClientSettings,
        fetcher: Arc<dyn MetadataFetcher>,
    ) -> Self {
        Self {
            settings,
            client,
            fetcher,
        }
    }

    pub fn settings(&self) -> &MetadataSettings {
        &self.settings
    }

    pub async fn oauth2_metadata(
        &self,
        headers: &HeaderMap,
    ) -> Result<OAuth2MetadataResponse, MetadataError> {
        match self.settings.mode {
            AuthorizationServerMode::SelfHosted => self.self_hosted_metadata(headers),
            AuthorizationServerMode::External => {
                let url = self.external_metadata_url()?;
                tracing::debug!(%url, "fetching external authorization server metadata");
                self.fetcher.fetch(&url).await
            }
        }
    }

    pub fn flyte_client(&self) -> ClientBootstrapResponse {
        ClientBootstrapResponse {
            client_id: self.client.client_id.clone(),
            redirect_uri: self.client.redirect_uri.clone(),
            scopes: self.client.scopes.clone(),
            authorization_metadata_key: self.client.header_name.clone(),
            service_http_endpoint: self
                .settings
                .public_url
                .as_ref()
                .map(Url::to_string)
                .unwrap_or_default(),
            audience: self.client.audience.clone(),
        }
    }

    /// Configured public URL, else `<scheme>://<forwarded host or Host>/`.
    pub fn public_base_url(&self, headers: &HeaderMap) -> Result<Url, MetadataError> {
        if let Some(url) = &self.settings.public_url {
            return Ok(directory(url.clone()));
        }

        let host = header_value(headers, FORWARDED_HOST)
            .or_else(|| header_value(headers, header::HOST.as_str()))
            .ok_or(MetadataError::MissingHost)?;
        let scheme = if self.settings.secure { "https" } else { "http" };

        let invalid = || MetadataError::InvalidHost(host.to_string());
        let url = Url::parse(&format!("{scheme}://{host}/")).map_err(|_| invalid())?;
        // The header may only name a host and port.
        if url.path() != "/"
            || url.query().is_some()
            || url.fragment().is_some()
            || !url.username().is_empty()
            || url.password().is_some()
        {
            return Err(invalid());
        }
        Ok(url)
    }

    fn self_hosted_metadata(
        &self,
        headers: &HeaderMap,
    ) -> Result<OAuth2MetadataResponse, MetadataError> {
        let base = self.public_base_url(headers)?;

        Ok(OAuth2MetadataResponse {
            issuer: base.as_str().trim_end_matches('/').to_string(),
            authorization_endpoint: join(&base, AUTHORIZE_PATH)?.to_string(),
            token_endpoint: join(&base, TOKEN_PATH)?.to_string(),
            jwks_uri: join(&base, JWKS_PATH)?.to_string(),
            code_challenge_methods_supported: vec!["S256".to_string()],
            response_types_supported: vec![
                "code".to_string(),
                "token".to_string(),
                "code token".to_string(),
            ],
            grant_types_supported: self.settings.grant_types.clone(),
            scopes_supported: vec![crate::services::auth::identity::ALL_SCOPE.to_string()],
            token_endpoint_auth_methods_supported: vec!["client_secret_basic".to_string()],
        })
    }

    fn external_metadata_url(&self) -> Result<Url, MetadataError> {
        let base = self
            .settings
            .external_base_url
            .as_ref()
            .or(self.settings.openid_base_url.as_ref())
            .ok_or(MetadataError::NotConfigured("external authorization server url"))?;

        join(&directory(base.clone()), WELL_KNOWN_METADATA_PATH)
    }
}

/// First value of a header; proxies may append comma-separated hops.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// Relative joins replace the last path segment unless the path ends in '/'.
fn directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn join(base: &Url, path: &str) -> Result<Url, MetadataError> {
    base.join(path).map_err(|source| MetadataError::InvalidUrl {
        url: format!("{base}{path}"),
        source,
    })
}
