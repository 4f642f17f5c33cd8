pub mod factory;
pub mod identity;
pub mod interceptor;
pub mod jwks;
pub mod token_validator;

pub use factory::{build_key_provider, build_token_validator};
pub use identity::{AuthenticatedIdentity, IdentityContext, ScopeSet};
pub use interceptor::{AuthorizationInterceptor, BlanketAuthorization, InterceptorRegistry};
pub use jwks::{JwkSet, KeyError, PublicKeyProvider, StaticKeyProvider, build_key_set};
pub use token_validator::{JwtTokenValidator, TokenValidator, ValidationError};
