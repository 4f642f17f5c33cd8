#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::Utc;
use flyte_auth::services::auth::{JwtTokenValidator, StaticKeyProvider};
use flyte_auth::services::cookie::{CookieManager, CookieSettings};
use flyte_auth::services::metadata::{
    ClientSettings, HttpMetadataFetcher, MetadataProvider, MetadataSettings,
};
use flyte_auth::state::AppState;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;
use url::Url;

pub const SIGNING_KEY: &str = include_str!("../../testdata/signing_key.pem");
pub const SIGNING_PUB: &str = include_str!("../../testdata/signing_key.pub.pem");
pub const ROTATED_PUB: &str = include_str!("../../testdata/rotated_key.pub.pem");
pub const SIGNING_KID: &str = "K5e1wToWkryihTxW5Q_-yIo7GZ3knbI29RnPX6ql6Vo";

pub const ISSUER: &str = "https://flyte.example.com";
pub const AUDIENCE: &str = "flyte";
pub const HASH_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";
pub const BLOCK_KEY: &[u8] = b"fedcba9876543210fedcba9876543210";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn self_hosted(public_url: Option<&str>) -> MetadataSettings {
    MetadataSettings {
        public_url: public_url.map(|u| Url::parse(u).expect("url")),
        grant_types: vec!["authorization_code".to_string(), "client_credentials".to_string()],
        ..Default::default()
    }
}

pub fn cookie_manager() -> CookieManager {
    CookieManager::new(HASH_KEY, BLOCK_KEY, CookieSettings::default()).expect("cookie manager")
}

pub fn state_with(metadata: MetadataSettings) -> AppState {
    let validator =
        JwtTokenValidator::new(SIGNING_PUB, Some(ISSUER), Some(AUDIENCE), 0).expect("validator");
    let keys = StaticKeyProvider::from_pems(&[SIGNING_PUB, ROTATED_PUB]).expect("keys");
    let fetcher = HttpMetadataFetcher::new(Duration::from_secs(5)).expect("fetcher");
    let metadata = MetadataProvider::new(
        metadata,
        ClientSettings {
            client_id: "flytectl".to_string(),
            redirect_uri: "http://localhost:53593/callback".to_string(),
            scopes: vec!["all".to_string(), "offline".to_string()],
            header_name: "flyte-authorization".to_string(),
            audience: AUDIENCE.to_string(),
        },
        Arc::new(fetcher),
    );

    AppState::new(
        Arc::new(cookie_manager()),
        Arc::new(validator),
        Arc::new(keys),
        Arc::new(metadata),
        axum::http::HeaderName::from_static("flyte-authorization"),
    )
}

pub fn state() -> AppState {
    state_with(self_hosted(Some(ISSUER)))
}

pub fn sign(subject: &str, scope: &str) -> String {
    let claims = json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": subject,
        "iat": Utc::now().timestamp(),
        "exp": Utc::now().timestamp() + 3600,
        "scope": scope,
    });
    let key = EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).expect("signing key");
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key).expect("token")
}

/// Turn `Set-Cookie` response headers into the `Cookie` header a browser sends back.
pub fn cookie_header(set_cookies: &HeaderMap) -> HeaderValue {
    let pairs = set_cookies
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| {
            let v = v.to_str().expect("ascii cookie");
            v.split(';').next().unwrap_or(v).to_string()
        })
        .collect::<Vec<_>>()
        .join("; ");
    HeaderValue::from_str(&pairs).expect("cookie header")
}
