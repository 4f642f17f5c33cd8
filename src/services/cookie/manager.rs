//! Token bundle <-> cookies.
//!
//! Wire names:
//! - `flyte_at`: a one-byte packing flag, then the access token, or
//!   `access \x1f id` when the id token is packed with it
//! - `flyte_idt`: id token, only with [`IdTokenPacking::Separate`]
//! - `flyte_rt`: refresh token
//!
//! A bundle without an id or refresh token expires the matching cookie so a
//! previous session's value is not read back with the new access token.
//!
//! Each value is sealed by [`SecureCookieCodec`] and split by [`chunk`] when the
//! rendered cookie would exceed [`MAX_COOKIE_SIZE`].

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Utc};
use cookie::{
    Cookie, SameSite,
    time::{Duration as CookieDuration, OffsetDateTime},
};
use tracing::{debug, warn};

use super::{CookieConfigError, DecodeError, EncodeError, chunk, secure::SecureCookieCodec};

pub const ACCESS_TOKEN_COOKIE: &str = "flyte_at";
pub const ID_TOKEN_COOKIE: &str = "flyte_idt";
pub const REFRESH_TOKEN_COOKIE: &str = "flyte_rt";

/// Browser-safe size of one rendered cookie, name and attributes included.
pub const MAX_COOKIE_SIZE: usize = 4096;

const ID_TOKEN_SEPARATOR: char = '\u{1f}';

// First character of the sealed `flyte_at` plaintext.
const PACKED_FLAG: char = 'c';
const PLAIN_FLAG: char = 'p';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SameSitePolicy {
    #[default]
    Default,
    Lax,
    Strict,
    None,
}

impl FromStr for SameSitePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "default" | "defaultmode" => Ok(Self::Default),
            "lax" | "laxmode" => Ok(Self::Lax),
            "strict" | "strictmode" => Ok(Self::Strict),
            "none" | "nonemode" => Ok(Self::None),
            other => Err(format!("unknown SameSite policy: {other}")),
        }
    }
}

/// Where the id token travels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdTokenPacking {
    /// Appended to the access-token value; no `flyte_idt` cookie is written.
    #[default]
    Combined,
    /// Written to its own `flyte_idt` cookie.
    Separate,
}

#[derive(Debug, Clone, Default)]
pub struct CookieSettings {
    pub same_site_policy: SameSitePolicy,
    /// Empty means host-only cookies.
    pub domain: String,
    /// Mirrors the service's TLS posture.
    pub secure: bool,
    pub id_token_packing: IdTokenPacking,
}

/// Tokens issued by the authorization server for one browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenValues {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Stateless cookie-backed token store. Holds only immutable configuration.
#[derive(Debug)]
pub struct CookieManager {
    codec: SecureCookieCodec,
    settings: CookieSettings,
}

impl CookieManager {
    pub fn new(
        hash_key: &[u8],
        block_key: &[u8],
        settings: CookieSettings,
    ) -> Result<Self, CookieConfigError> {
        Ok(Self {
            codec: SecureCookieCodec::new(hash_key, block_key)?,
            settings,
        })
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.codec = self.codec.with_max_age(max_age);
        self
    }

    pub fn settings(&self) -> &CookieSettings {
        &self.settings
    }

    /// Seal the bundle into cookies and append them to `headers` as `Set-Cookie`.
    pub fn set_token_cookies(
        &self,
        headers: &mut HeaderMap,
        token: &TokenBundle,
    ) -> Result<(), EncodeError> {
        let expires = token
            .expiry
            .and_then(|t| OffsetDateTime::from_unix_timestamp(t.timestamp()).ok());

        let pack = !token.id_token.is_empty()
            && self.settings.id_token_packing == IdTokenPacking::Combined;

        let access_value = if pack {
            if token.access_token.contains(ID_TOKEN_SEPARATOR) {
                return Err(EncodeError::ReservedSeparator {
                    name: ACCESS_TOKEN_COOKIE.to_string(),
                });
            }
            format!(
                "{}{}{}{}",
                PACKED_FLAG, token.access_token, ID_TOKEN_SEPARATOR, token.id_token
            )
        } else {
            format!("{}{}", PLAIN_FLAG, token.access_token)
        };

        let mut cookies = self.sealed_cookies(ACCESS_TOKEN_COOKIE, &access_value, expires)?;
        if token.id_token.is_empty() {
            cookies.push(self.expired_cookie(ID_TOKEN_COOKIE));
        } else if !pack {
            cookies.extend(self.sealed_cookies(ID_TOKEN_COOKIE, &token.id_token, expires)?);
        }
        if token.refresh_token.is_empty() {
            cookies.push(self.expired_cookie(REFRESH_TOKEN_COOKIE));
        } else {
            cookies.extend(self.sealed_cookies(
                REFRESH_TOKEN_COOKIE,
                &token.refresh_token,
                None,
            )?);
        }

        debug!(count = cookies.len(), packed = pack, "writing token cookies");
        for cookie in cookies {
            headers.append(
                header::SET_COOKIE,
                HeaderValue::from_str(&cookie.to_string())?,
            );
        }
        Ok(())
    }

    /// Read, reassemble and open the token cookies of a request.
    ///
    /// The access cookie is required. A missing refresh cookie yields an empty
    /// refresh token; a missing id token yields an empty id token.
    pub fn retrieve_token_values(&self, headers: &HeaderMap) -> Result<TokenValues, DecodeError> {
        let jar = parse_cookie_headers(headers);

        let access_value = self.open_value(&jar, ACCESS_TOKEN_COOKIE)?;
        let (access_token, mut id_token) = unpack_access_value(&access_value)
            .ok_or_else(|| DecodeError::InvalidFraming(ACCESS_TOKEN_COOKIE.to_string()))?;

        if id_token.is_empty() && jar.contains_key(ID_TOKEN_COOKIE) {
            id_token = self.open_value(&jar, ID_TOKEN_COOKIE)?;
        }

        let refresh_token = if jar.contains_key(REFRESH_TOKEN_COOKIE) {
            self.open_value(&jar, REFRESH_TOKEN_COOKIE)?
        } else {
            String::new()
        };

        Ok(TokenValues {
            id_token,
            access_token,
            refresh_token,
        })
    }

    pub fn logout_access_cookie(&self) -> Cookie<'static> {
        self.expired_cookie(ACCESS_TOKEN_COOKIE)
    }

    pub fn logout_refresh_cookie(&self) -> Cookie<'static> {
        self.expired_cookie(REFRESH_TOKEN_COOKIE)
    }

    /// Append logout cookies for the access and refresh tokens.
    ///
    /// The id-token cookie is left untouched. Clearing `flyte_at` is enough to
    /// invalidate a split access value because reassembly needs its marker.
    pub fn delete_cookies(&self, headers: &mut HeaderMap) {
        for cookie in [self.logout_access_cookie(), self.logout_refresh_cookie()] {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(err) => warn!(error = %err, cookie = cookie.name(), "invalid logout cookie"),
            }
        }
    }

    /// The configured policy as the `SameSite` attribute to render. `Default`
    /// omits the attribute and leaves the decision to the browser.
    pub fn http_same_site_policy(&self) -> Option<SameSite> {
        match self.settings.same_site_policy {
            SameSitePolicy::Default => None,
            SameSitePolicy::Lax => Some(SameSite::Lax),
            SameSitePolicy::Strict => Some(SameSite::Strict),
            SameSitePolicy::None => Some(SameSite::None),
        }
    }

    fn sealed_cookies(
        &self,
        base: &str,
        value: &str,
        expires: Option<OffsetDateTime>,
    ) -> Result<Vec<Cookie<'static>>, EncodeError> {
        let sealed = self.codec.seal(base, value.as_bytes())?;

        // Size budget left for the value once the longest possible name and
        // every attribute are rendered.
        let mut template = self.build_cookie(chunk::chunk_name(base, chunk::MAX_CHUNKS), "");
        if let Some(expires) = expires {
            template.set_expires(expires);
        }
        let max_value_len = MAX_COOKIE_SIZE.saturating_sub(template.to_string().len());

        let parts = chunk::split(base, &sealed, max_value_len);
        if parts.len() > chunk::MAX_CHUNKS + 1 {
            return Err(EncodeError::TooLarge {
                name: base.to_string(),
                chunks: parts.len() - 1,
            });
        }

        Ok(parts
            .into_iter()
            .map(|(name, value)| {
                let mut cookie = self.build_cookie(name, value);
                if let Some(expires) = expires {
                    cookie.set_expires(expires);
                }
                cookie
            })
            .collect())
    }

    fn open_value(&self, jar: &HashMap<String, String>, base: &str) -> Result<String, DecodeError> {
        let text = chunk::join(base, |name| jar.get(name).map(String::as_str))?;
        let plain = self.codec.open(base, &text)?;
        String::from_utf8(plain).map_err(|_| DecodeError::Utf8(base.to_string()))
    }

    fn expired_cookie(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.build_cookie(name.to_string(), "");
        cookie.set_expires(OffsetDateTime::now_utc() - CookieDuration::hours(1));
        cookie.set_max_age(CookieDuration::ZERO);
        cookie
    }

    fn build_cookie(&self, name: String, value: impl Into<String>) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, value.into()))
            .path("/")
            .http_only(true)
            .secure(self.settings.secure)
            .build();
        if !self.settings.domain.is_empty() {
            cookie.set_domain(self.settings.domain.clone());
        }
        cookie.set_same_site(self.http_same_site_policy());
        cookie
    }
}

/// Split an opened `flyte_at` value into access and id token by its flag.
fn unpack_access_value(value: &str) -> Option<(String, String)> {
    if let Some(plain) = value.strip_prefix(PLAIN_FLAG) {
        return Some((plain.to_string(), String::new()));
    }
    let (access, id) = value
        .strip_prefix(PACKED_FLAG)?
        .split_once(ID_TOKEN_SEPARATOR)?;
    Some((access.to_string(), id.to_string()))
}

fn parse_cookie_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut jar = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else {
            debug!("ignoring non-ascii cookie header");
            continue;
        };
        for cookie in Cookie::split_parse(raw) {
            match cookie {
                // An emptied cookie is a cleared one.
                Ok(c) if c.value().is_empty() => {}
                Ok(c) => {
                    jar.insert(c.name().to_string(), c.value().to_string());
                }
                Err(e) => debug!("ignoring malformed cookie: {e}"),
            }
        }
    }
    jar
}
