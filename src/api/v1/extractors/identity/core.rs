use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::services::auth::IdentityContext;

pub struct IdentityExtractor(pub IdentityContext);

impl<S> FromRequestParts<S> for IdentityExtractor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(IdentityContext::from_extensions(&parts.extensions)))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use chrono::Utc;

    use super::*;
    use crate::services::auth::AuthenticatedIdentity;

    #[tokio::test]
    async fn missing_identity_extracts_as_anonymous() {
        let (mut parts, _) = Request::new(()).into_parts();
        let IdentityExtractor(identity) = IdentityExtractor::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(identity.is_empty());
    }

    #[tokio::test]
    async fn attached_identity_is_extracted() {
        let (mut parts, _) = Request::new(()).into_parts();
        IdentityContext::authenticated(AuthenticatedIdentity {
            subject: "user-1".to_string(),
            execution_identity: None,
            authenticated_at: Utc::now(),
            token_expires_at: Utc::now(),
            scopes: ["all"].into_iter().collect(),
            claims: serde_json::Map::new(),
        })
        .attach(&mut parts.extensions);

        let IdentityExtractor(identity) = IdentityExtractor::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(identity.subject(), Some("user-1"));
    }
}
