//! Authenticated encryption of single cookie values.
//!
//! Two independent secrets are used:
//! - block key: AES-GCM encryption of the value (the cookie name is the associated data)
//! - hash key: HMAC-SHA256 over `name | timestamp | nonce | ciphertext`
//!
//! Sealed layout (before text encoding):
//! `timestamp (u64 BE) | nonce (12) | ciphertext + tag | mac (32)`
//!
//! The timestamp lets the reader reject values older than `max_age` even if the
//! browser ignored the cookie's own expiry.

use std::time::Duration;

use aws_lc_rs::{
    aead::{AES_128_GCM, AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey},
    hmac,
};
use chrono::Utc;

use super::{CookieConfigError, DecodeError, EncodeError};
use crate::services::codec;

const TIMESTAMP_LEN: usize = 8;
const TAG_LEN: usize = 16;
const MAC_LEN: usize = 32;
const MIN_HASH_KEY_LEN: usize = 16;

/// Default lifetime of a sealed value, matching the refresh-token horizon.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

pub struct SecureCookieCodec {
    hash_key: hmac::Key,
    block_key: LessSafeKey,
    max_age: Duration,
}

impl std::fmt::Debug for SecureCookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("SecureCookieCodec")
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl SecureCookieCodec {
    pub fn new(hash_key: &[u8], block_key: &[u8]) -> Result<Self, CookieConfigError> {
        if hash_key.is_empty() {
            return Err(CookieConfigError::EmptyKey("hash"));
        }
        if hash_key.len() < MIN_HASH_KEY_LEN {
            return Err(CookieConfigError::InvalidKeyLength {
                key: "hash",
                len: hash_key.len(),
            });
        }
        if block_key.is_empty() {
            return Err(CookieConfigError::EmptyKey("block"));
        }

        let algorithm = match block_key.len() {
            16 => &AES_128_GCM,
            32 => &AES_256_GCM,
            len => return Err(CookieConfigError::InvalidKeyLength { key: "block", len }),
        };
        let unbound = UnboundKey::new(algorithm, block_key).map_err(|_| {
            CookieConfigError::InvalidKeyLength {
                key: "block",
                len: block_key.len(),
            }
        })?;

        Ok(Self {
            hash_key: hmac::Key::new(hmac::HMAC_SHA256, hash_key),
            block_key: LessSafeKey::new(unbound),
            max_age: DEFAULT_MAX_AGE,
        })
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Encrypt and sign `value` for the cookie called `name`.
    pub fn seal(&self, name: &str, value: &[u8]) -> Result<String, EncodeError> {
        self.seal_at(name, value, Utc::now().timestamp())
    }

    fn seal_at(&self, name: &str, value: &[u8], timestamp: i64) -> Result<String, EncodeError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce_bytes).map_err(|_| EncodeError::Random)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = Vec::with_capacity(value.len() + TAG_LEN);
        in_out.extend_from_slice(value);
        self.block_key
            .seal_in_place_append_tag(nonce, Aad::from(name.as_bytes()), &mut in_out)
            .map_err(|_| EncodeError::Encrypt)?;

        let mut sealed = Vec::with_capacity(TIMESTAMP_LEN + NONCE_LEN + in_out.len() + MAC_LEN);
        sealed.extend_from_slice(&(timestamp as u64).to_be_bytes());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);

        let mac = hmac::sign(&self.hash_key, &mac_input(name, &sealed));
        sealed.extend_from_slice(mac.as_ref());

        Ok(codec::encode(sealed))
    }

    /// Verify and decrypt a value previously produced by [`Self::seal`] for the same `name`.
    pub fn open(&self, name: &str, text: &str) -> Result<Vec<u8>, DecodeError> {
        self.open_at(name, text, Utc::now().timestamp())
    }

    fn open_at(&self, name: &str, text: &str, now: i64) -> Result<Vec<u8>, DecodeError> {
        let data = codec::decode(text)?;
        if data.len() < TIMESTAMP_LEN + NONCE_LEN + TAG_LEN + MAC_LEN {
            return Err(DecodeError::Truncated(name.to_string()));
        }

        // MAC first: nothing below runs on unauthenticated bytes.
        let (signed, mac) = data.split_at(data.len() - MAC_LEN);
        hmac::verify(&self.hash_key, &mac_input(name, signed), mac)
            .map_err(|_| DecodeError::Tampered(name.to_string()))?;

        let (timestamp, rest) = signed.split_at(TIMESTAMP_LEN);
        let mut ts_bytes = [0u8; TIMESTAMP_LEN];
        ts_bytes.copy_from_slice(timestamp);
        let issued_at = u64::from_be_bytes(ts_bytes) as i64;
        let max_age = self.max_age.as_secs() as i64;
        if issued_at < now.saturating_sub(max_age) {
            return Err(DecodeError::Expired(name.to_string()));
        }

        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| DecodeError::Tampered(name.to_string()))?;
        let mut in_out = ciphertext.to_vec();
        let plaintext_len = self
            .block_key
            .open_in_place(nonce, Aad::from(name.as_bytes()), &mut in_out)
            .map_err(|_| DecodeError::Tampered(name.to_string()))?
            .len();
        in_out.truncate(plaintext_len);

        Ok(in_out)
    }
}

fn mac_input(name: &str, signed: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(name.len() + 1 + signed.len());
    input.extend_from_slice(name.as_bytes());
    input.push(b'|');
    input.extend_from_slice(signed);
    input
}
