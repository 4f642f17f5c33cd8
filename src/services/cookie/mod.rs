/*
 * Responsibility
 * - encrypted, client-held token storage for browser clients
 * - secure: authenticated encryption of a single value
 * - chunk: framing for values over the single-cookie size budget
 * - manager: token bundle <-> Set-Cookie / Cookie headers
 */
pub mod chunk;
pub mod manager;
pub mod secure;

use axum::http::header::InvalidHeaderValue;
use thiserror::Error;

use crate::services::codec::CodecError;

pub use manager::{
    ACCESS_TOKEN_COOKIE, CookieManager, CookieSettings, ID_TOKEN_COOKIE, IdTokenPacking,
    REFRESH_TOKEN_COOKIE, SameSitePolicy, TokenBundle, TokenValues,
};
pub use secure::SecureCookieCodec;

/// Bad secret material. The process must not start serving with it.
#[derive(Debug, Error)]
pub enum CookieConfigError {
    #[error("cookie {0} key must not be empty")]
    EmptyKey(&'static str),
    #[error("cookie {key} key has invalid length {len}")]
    InvalidKeyLength { key: &'static str, len: usize },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to generate nonce")]
    Random,
    #[error("failed to encrypt cookie value")]
    Encrypt,
    #[error("cookie {name} needs {chunks} chunks, over the limit")]
    TooLarge { name: String, chunks: usize },
    #[error("cookie {name} value contains the id-token separator")]
    ReservedSeparator { name: String },
    #[error("cookie is not a valid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

/// Any reason a cookie could not be turned back into a token.
///
/// Callers treat every variant as "no valid session".
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cookie {0} is missing")]
    Missing(String),
    #[error("cookie {0} has invalid chunk framing")]
    InvalidFraming(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("cookie {0} is too short")]
    Truncated(String),
    #[error("cookie {0} failed authentication")]
    Tampered(String),
    #[error("cookie {0} has expired")]
    Expired(String),
    #[error("cookie {0} does not hold UTF-8 text")]
    Utf8(String),
}
