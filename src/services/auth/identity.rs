/*
 * Responsibility
 * - request-scoped identity: who is calling and which scopes they hold
 * - the identity middleware builds it once and stores it in request extensions
 * - handlers and the authorization interceptor only read it
 *
 * Notes
 * - Anonymous is an explicit variant, not a struct with zeroed fields
 * - Authenticated data sits behind an Arc: cheap to clone, impossible to mutate
 */
use std::collections::BTreeSet;
use std::sync::Arc;

use axum::http::Extensions;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The universal scope checked by the blanket authorization policy.
pub const ALL_SCOPE: &str = "all";

static EMPTY_SCOPES: ScopeSet = ScopeSet(BTreeSet::new());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Case-sensitive exact membership.
    pub fn has(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Parse an OAuth2 `scope` claim (space-delimited).
    pub fn from_space_delimited(raw: &str) -> Self {
        raw.split_whitespace().map(str::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedIdentity {
    pub subject: String,
    /// Set when a service calls on behalf of an execution.
    pub execution_identity: Option<String>,
    pub authenticated_at: DateTime<Utc>,
    pub token_expires_at: DateTime<Utc>,
    pub scopes: ScopeSet,
    pub claims: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub enum IdentityContext {
    #[default]
    Anonymous,
    Authenticated(Arc<AuthenticatedIdentity>),
}

impl IdentityContext {
    pub fn authenticated(identity: AuthenticatedIdentity) -> Self {
        Self::Authenticated(Arc::new(identity))
    }

    /// The identity attached to the request, or [`IdentityContext::Anonymous`].
    pub fn from_extensions(extensions: &Extensions) -> Self {
        extensions.get::<Self>().cloned().unwrap_or_default()
    }

    pub fn attach(self, extensions: &mut Extensions) {
        extensions.insert(self);
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    pub fn scopes(&self) -> &ScopeSet {
        match self {
            Self::Anonymous => &EMPTY_SCOPES,
            Self::Authenticated(identity) => &identity.scopes,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.identity().map(|i| i.subject.as_str())
    }

    pub fn execution_identity(&self) -> Option<&str> {
        self.identity().and_then(|i| i.execution_identity.as_deref())
    }

    pub fn identity(&self) -> Option<&AuthenticatedIdentity> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(identity) => Some(identity.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_with_scopes(scopes: &[&str]) -> IdentityContext {
        IdentityContext::authenticated(AuthenticatedIdentity {
            subject: "user-1".to_string(),
            execution_identity: None,
            authenticated_at: Utc::now(),
            token_expires_at: Utc::now() + chrono::Duration::minutes(5),
            scopes: scopes.iter().copied().collect(),
            claims: serde_json::Map::new(),
        })
    }

    #[test]
    fn missing_identity_is_anonymous() {
        let ext = Extensions::new();
        let identity = IdentityContext::from_extensions(&ext);
        assert!(identity.is_empty());
        assert!(identity.scopes().is_empty());
        assert_eq!(identity.subject(), None);
    }

    #[test]
    fn attached_identity_is_returned() {
        let mut ext = Extensions::new();
        identity_with_scopes(&["all"]).attach(&mut ext);

        let identity = IdentityContext::from_extensions(&ext);
        assert!(!identity.is_empty());
        assert_eq!(identity.subject(), Some("user-1"));
        assert!(identity.scopes().has(ALL_SCOPE));
    }

    #[test]
    fn scope_lookup_is_exact_and_case_sensitive() {
        let scopes = ScopeSet::from_space_delimited("all  offline\tread:projects");
        assert_eq!(scopes.len(), 3);
        assert!(scopes.has("all"));
        assert!(scopes.has("read:projects"));
        assert!(!scopes.has("ALL"));
        assert!(!scopes.has("al"));
        assert!(!scopes.has(""));
    }

    #[test]
    fn clones_share_the_same_data() {
        let a = identity_with_scopes(&["all"]);
        let b = a.clone();
        let (IdentityContext::Authenticated(a), IdentityContext::Authenticated(b)) = (a, b) else {
            panic!("expected authenticated identities");
        };
        assert!(Arc::ptr_eq(&a, &b));
    }
}
