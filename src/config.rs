/*
 * Responsibility
 * - load settings from the environment (.env supported)
 * - validate them; anything missing or malformed stops startup
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
};
use url::Url;

use crate::services::codec;
use crate::services::cookie::{CookieSettings, IdTokenPacking, SameSitePolicy};
use crate::services::metadata::{AuthorizationServerMode, ClientSettings, MetadataSettings};

pub const DEFAULT_AUTH_HEADER: &str = "flyte-authorization";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    /// Whether clients reach this service over TLS.
    pub secure: bool,

    pub cookie_hash_key: Vec<u8>,
    pub cookie_block_key: Vec<u8>,
    pub cookie_domain: String,
    pub cookie_same_site: SameSitePolicy,
    pub id_token_packing: IdTokenPacking,

    pub auth_header_name: String,
    pub auth_issuer: Option<String>,
    pub auth_audience: Option<String>,
    pub access_token_leeway_seconds: u64,
    pub access_jwt_public_key_pem: String,
    pub jwks_public_keys_pem: Vec<String>,

    pub server_mode: AuthorizationServerMode,
    pub public_url: Option<Url>,
    pub external_base_url: Option<Url>,
    pub openid_base_url: Option<Url>,
    pub grant_types: Vec<String>,
    pub metadata_timeout_seconds: u64,

    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

// Debug would print secret key material.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("secure", &self.secure)
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("server_mode", &self.server_mode)
            .field("public_url", &self.public_url)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8088);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let secure = match optional("SERVER_SECURE") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid("SERVER_SECURE"))?,
            None => app_env.is_production(),
        };

        let cookie_hash_key = secret("AUTH_COOKIE_HASH_KEY")?;
        let cookie_block_key = secret("AUTH_COOKIE_BLOCK_KEY")?;
        let cookie_domain = optional("AUTH_COOKIE_DOMAIN").unwrap_or_default();
        let cookie_same_site = match optional("AUTH_COOKIE_SAME_SITE") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid("AUTH_COOKIE_SAME_SITE"))?,
            None => SameSitePolicy::Default,
        };
        let id_token_packing = match optional("AUTH_ID_TOKEN_PACKING").as_deref() {
            None | Some("combined") => IdTokenPacking::Combined,
            Some("separate") => IdTokenPacking::Separate,
            Some(_) => return Err(ConfigError::Invalid("AUTH_ID_TOKEN_PACKING")),
        };

        let auth_header_name =
            optional("AUTH_HEADER_NAME").unwrap_or_else(|| DEFAULT_AUTH_HEADER.to_string());
        axum::http::HeaderName::from_str(&auth_header_name)
            .map_err(|_| ConfigError::Invalid("AUTH_HEADER_NAME"))?;

        let auth_issuer = optional("AUTH_ISSUER");
        let auth_audience = optional("AUTH_AUDIENCE");

        let access_token_leeway_seconds = std::env::var("ACCESS_TOKEN_LEEWAY_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        let access_jwt_public_key_pem = std::env::var("ACCESS_JWT_PUBLIC_KEY_PEM")
            .map_err(|_| ConfigError::Missing("ACCESS_JWT_PUBLIC_KEY_PEM"))?
            .replace("\\n", "\n");

        // Several PEM blocks may be concatenated; each block is one key.
        let jwks_public_keys_pem = optional("JWKS_PUBLIC_KEYS_PEM")
            .map(|v| split_pem_blocks(&v.replace("\\n", "\n")))
            .unwrap_or_default();

        let server_mode = match optional("AUTH_SERVER_TYPE") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid("AUTH_SERVER_TYPE"))?,
            None => AuthorizationServerMode::SelfHosted,
        };
        let public_url = optional_url("PUBLIC_URL")?;
        let external_base_url = optional_url("AUTH_EXTERNAL_BASE_URL")?;
        let openid_base_url = optional_url("AUTH_OPENID_BASE_URL")?;
        if server_mode == AuthorizationServerMode::External
            && external_base_url.is_none()
            && openid_base_url.is_none()
        {
            return Err(ConfigError::Missing("AUTH_EXTERNAL_BASE_URL"));
        }

        let grant_types = optional("AUTH_GRANT_TYPES")
            .map(|v| list(&v))
            .unwrap_or_else(|| {
                vec![
                    "authorization_code".to_string(),
                    "client_credentials".to_string(),
                    "refresh_token".to_string(),
                ]
            });

        let metadata_timeout_seconds = std::env::var("AUTH_METADATA_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);

        let client_id = optional("AUTH_CLIENT_ID").unwrap_or_else(|| "flytectl".to_string());
        let redirect_uri = optional("AUTH_REDIRECT_URI")
            .unwrap_or_else(|| "http://localhost:53593/callback".to_string());
        let scopes = optional("AUTH_SCOPES")
            .map(|v| list(&v))
            .unwrap_or_else(|| vec!["all".to_string(), "offline".to_string()]);

        Ok(Self {
            addr,
            app_env,
            secure,
            cookie_hash_key,
            cookie_block_key,
            cookie_domain,
            cookie_same_site,
            id_token_packing,
            auth_header_name,
            auth_issuer,
            auth_audience,
            access_token_leeway_seconds,
            access_jwt_public_key_pem,
            jwks_public_keys_pem,
            server_mode,
            public_url,
            external_base_url,
            openid_base_url,
            grant_types,
            metadata_timeout_seconds,
            client_id,
            redirect_uri,
            scopes,
        })
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            same_site_policy: self.cookie_same_site,
            domain: self.cookie_domain.clone(),
            secure: self.secure,
            id_token_packing: self.id_token_packing,
        }
    }

    pub fn metadata_settings(&self) -> MetadataSettings {
        MetadataSettings {
            mode: self.server_mode,
            public_url: self.public_url.clone(),
            external_base_url: self.external_base_url.clone(),
            openid_base_url: self.openid_base_url.clone(),
            grant_types: self.grant_types.clone(),
            secure: self.secure,
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scopes: self.scopes.clone(),
            header_name: self.auth_header_name.clone(),
            audience: self.auth_audience.clone().unwrap_or_default(),
        }
    }
}

fn optional(key: &'static str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn optional_url(key: &'static str) -> Result<Option<Url>, ConfigError> {
    optional(key)
        .map(|v| Url::parse(&v).map_err(|_| ConfigError::Invalid(key)))
        .transpose()
}

fn secret(key: &'static str) -> Result<Vec<u8>, ConfigError> {
    let raw = optional(key).ok_or(ConfigError::Missing(key))?;
    decode_secret(&raw).ok_or(ConfigError::Invalid(key))
}

/// Standard or URL-safe base64 key material; padding optional.
fn decode_secret(raw: &str) -> Option<Vec<u8>> {
    STANDARD
        .decode(raw)
        .or_else(|_| STANDARD_NO_PAD.decode(raw))
        .ok()
        .or_else(|| codec::decode(raw).ok())
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn list(v: &str) -> Vec<String> {
    v.split([',', ' '])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_pem_blocks(v: &str) -> Vec<String> {
    const END: &str = "-----END ";

    let mut blocks = Vec::new();
    let mut rest = v;
    while let Some(start) = rest.find("-----BEGIN ") {
        let Some(end) = rest[start..].find(END) else {
            break;
        };
        let after_end = start + end + END.len();
        let close = rest[after_end..]
            .find("-----")
            .map(|i| after_end + i + "-----".len())
            .unwrap_or(rest.len());
        blocks.push(rest[start..close].to_string());
        rest = &rest[close..];
    }
    blocks
}
