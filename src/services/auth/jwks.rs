//! JSON Web Key Set for the service's RSA signing keys.
//!
//! - `kid` is the RFC 7638 thumbprint of the key: SHA-256 over the canonical
//!   `{"e","kty","n"}` JSON, base64url. The same key always gets the same `kid`,
//!   across restarts and builds, so verifier caches keyed by `kid` stay valid.
//! - Only public components (`n`, `e`) are ever serialized.

use std::sync::Arc;

use rsa::{
    RsaPublicKey, pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, traits::PublicKeyParts,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::services::codec;

pub const MIN_RSA_BITS: usize = 2048;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("malformed RSA public key: {0}")]
    Malformed(String),
    #[error("RSA key of {bits} bits is below the {MIN_RSA_BITS}-bit minimum")]
    Weak { bits: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub use_field: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Source of the public halves of the keys that sign this service's tokens.
pub trait PublicKeyProvider: Send + Sync {
    fn public_keys(&self) -> Vec<RsaPublicKey>;
}

/// Keys loaded once at startup.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    keys: Vec<RsaPublicKey>,
}

impl StaticKeyProvider {
    pub fn new(keys: Vec<RsaPublicKey>) -> Result<Self, KeyError> {
        for key in &keys {
            check_strength(key)?;
        }
        Ok(Self { keys })
    }

    /// Parse PEM-encoded public keys, in publication order.
    pub fn from_pems<S: AsRef<str>>(pems: &[S]) -> Result<Self, KeyError> {
        let keys = pems
            .iter()
            .map(|pem| parse_public_key_pem(pem.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(keys)
    }
}

impl PublicKeyProvider for StaticKeyProvider {
    fn public_keys(&self) -> Vec<RsaPublicKey> {
        self.keys.clone()
    }
}

impl<P: PublicKeyProvider + ?Sized> PublicKeyProvider for Arc<P> {
    fn public_keys(&self) -> Vec<RsaPublicKey> {
        (**self).public_keys()
    }
}

/// Accepts SPKI (`PUBLIC KEY`) and PKCS#1 (`RSA PUBLIC KEY`) PEM.
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, KeyError> {
    let pem = pem.trim();
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| KeyError::Malformed(e.to_string()))
}

pub fn build_key_set(keys: &[RsaPublicKey]) -> Result<JwkSet, KeyError> {
    let mut set = JwkSet {
        keys: Vec::with_capacity(keys.len()),
    };
    for key in keys {
        check_strength(key)?;

        let n = codec::encode(key.n().to_bytes_be());
        let e = codec::encode(key.e().to_bytes_be());
        set.keys.push(Jwk {
            kty: "RSA".to_string(),
            kid: thumbprint(&n, &e),
            alg: "RS256".to_string(),
            use_field: "sig".to_string(),
            n,
            e,
        });
    }
    Ok(set)
}

fn check_strength(key: &RsaPublicKey) -> Result<(), KeyError> {
    let bits = key.n().bits();
    if bits < MIN_RSA_BITS {
        return Err(KeyError::Weak { bits });
    }
    Ok(())
}

fn thumbprint(n: &str, e: &str) -> String {
    // RFC 7638 canonical JSON (lexicographic member order): e, kty, n
    let canonical = format!("{{\"e\":\"{e}\",\"kty\":\"RSA\",\"n\":\"{n}\"}}");
    codec::encode(Sha256::digest(canonical.as_bytes()))
}
