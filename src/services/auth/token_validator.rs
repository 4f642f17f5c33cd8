use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::services::auth::identity::{AuthenticatedIdentity, IdentityContext, ScopeSet};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid RSA public key pem: {0}")]
    InvalidKey(jsonwebtoken::errors::Error),
    #[error("jwt verification failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("malformed claims: {0}")]
    Claims(#[from] serde_json::Error),
    #[error("empty '{0}' claim")]
    EmptyClaim(&'static str),
    #[error("'{0}' claim is out of range")]
    InvalidTimestamp(&'static str),
}

/// Turns a presented access token into a verified identity.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<IdentityContext, ValidationError>;
}

#[derive(Debug, Clone, Deserialize)]
struct AccessTokenClaims {
    sub: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    client_id: Option<String>,
    // OAuth2 style: space separated
    #[serde(default)]
    scope: Option<String>,
    // Okta/Azure style: array
    #[serde(default)]
    scp: Option<Vec<String>>,
}

/// RS256 access-token verifier.
#[derive(Clone)]
pub struct JwtTokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("JwtTokenValidator")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtTokenValidator {
    /// `issuer` / `audience` are only checked when set.
    pub fn new(
        public_key_pem: &str,
        issuer: Option<&str>,
        audience: Option<&str>,
        leeway_seconds: u64,
    ) -> Result<Self, ValidationError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(ValidationError::InvalidKey)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = leeway_seconds;
        if let Some(issuer) = issuer.filter(|s| !s.is_empty()) {
            validation.set_issuer(&[issuer]);
        }
        match audience.filter(|s| !s.is_empty()) {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    fn to_identity(
        raw: serde_json::Map<String, serde_json::Value>,
    ) -> Result<AuthenticatedIdentity, ValidationError> {
        let claims: AccessTokenClaims =
            serde_json::from_value(serde_json::Value::Object(raw.clone()))?;

        if claims.sub.trim().is_empty() {
            return Err(ValidationError::EmptyClaim("sub"));
        }

        let token_expires_at = timestamp(claims.exp, "exp")?;
        let authenticated_at = match claims.iat {
            Some(iat) => timestamp(iat, "iat")?,
            None => Utc::now(),
        };

        let scopes = match (claims.scope, claims.scp) {
            (Some(scope), _) => ScopeSet::from_space_delimited(&scope),
            (None, Some(scp)) => scp.into_iter().collect(),
            (None, None) => ScopeSet::default(),
        };

        Ok(AuthenticatedIdentity {
            subject: claims.sub,
            execution_identity: claims.client_id.filter(|c| !c.is_empty()),
            authenticated_at,
            token_expires_at,
            scopes,
            claims: raw,
        })
    }
}

impl TokenValidator for JwtTokenValidator {
    fn validate(&self, token: &str) -> Result<IdentityContext, ValidationError> {
        let data = jsonwebtoken::decode::<serde_json::Map<String, serde_json::Value>>(
            token,
            &self.decoding_key,
            &self.validation,
        )?;

        Ok(IdentityContext::authenticated(Self::to_identity(data.claims)?))
    }
}

fn timestamp(secs: i64, claim: &'static str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::from_timestamp(secs, 0).ok_or(ValidationError::InvalidTimestamp(claim))
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const SIGNING_KEY: &str = include_str!("../../../testdata/signing_key.pem");
    const SIGNING_PUB: &str = include_str!("../../../testdata/signing_key.pub.pem");
    const ROTATED_PUB: &str = include_str!("../../../testdata/rotated_key.pub.pem");

    fn sign(claims: serde_json::Value) -> String {
        let key = EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap();
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
    }

    fn validator() -> JwtTokenValidator {
        JwtTokenValidator::new(SIGNING_PUB, Some("https://issuer"), Some("flyte"), 0).unwrap()
    }

    fn in_an_hour() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn builds_identity_from_valid_token() {
        let now = Utc::now().timestamp();
        let token = sign(json!({
            "iss": "https://issuer",
            "aud": "flyte",
            "sub": "user-1",
            "client_id": "propeller",
            "iat": now,
            "exp": in_an_hour(),
            "scope": "all offline",
        }));

        let identity = validator().validate(&token).unwrap();
        let inner = identity.identity().unwrap();
        assert_eq!(inner.subject, "user-1");
        assert_eq!(inner.execution_identity.as_deref(), Some("propeller"));
        assert_eq!(inner.authenticated_at.timestamp(), now);
        assert!(identity.scopes().has("all"));
        assert!(identity.scopes().has("offline"));
        assert_eq!(inner.claims["aud"], "flyte");
    }

    #[test]
    fn reads_scp_array() {
        let token = sign(json!({
            "iss": "https://issuer",
            "aud": "flyte",
            "sub": "user-1",
            "exp": in_an_hour(),
            "scp": ["all"],
        }));
        let identity = validator().validate(&token).unwrap();
        assert!(identity.scopes().has("all"));
        assert_eq!(identity.execution_identity(), None);
    }

    #[test]
    fn rejects_expired_wrong_audience_and_foreign_key() {
        let expired = sign(json!({
            "iss": "https://issuer", "aud": "flyte", "sub": "u", "exp": Utc::now().timestamp() - 60,
        }));
        assert!(matches!(
            validator().validate(&expired),
            Err(ValidationError::Jwt(_))
        ));

        let other_aud = sign(json!({
            "iss": "https://issuer", "aud": "other", "sub": "u", "exp": in_an_hour(),
        }));
        assert!(validator().validate(&other_aud).is_err());

        let rotated = JwtTokenValidator::new(ROTATED_PUB, None, None, 0).unwrap();
        let token = sign(json!({ "sub": "u", "exp": in_an_hour() }));
        assert!(rotated.validate(&token).is_err());
    }

    #[test]
    fn rejects_empty_subject() {
        let token = sign(json!({
            "iss": "https://issuer", "aud": "flyte", "sub": " ", "exp": in_an_hour(),
        }));
        assert!(matches!(
            validator().validate(&token),
            Err(ValidationError::EmptyClaim("sub"))
        ));
    }

    #[test]
    fn rejects_garbage_and_bad_key() {
        assert!(validator().validate("not.a.jwt").is_err());
        assert!(matches!(
            JwtTokenValidator::new("nope", None, None, 0),
            Err(ValidationError::InvalidKey(_))
        ));
    }
}
