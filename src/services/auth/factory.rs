/// Factories: build the auth collaborators from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::{
    JwtTokenValidator, KeyError, PublicKeyProvider, StaticKeyProvider, TokenValidator,
    ValidationError,
};

pub fn build_token_validator(config: &Config) -> Result<Arc<dyn TokenValidator>, ValidationError> {
    let validator = JwtTokenValidator::new(
        &config.access_jwt_public_key_pem,
        config.auth_issuer.as_deref(),
        config.auth_audience.as_deref(),
        config.access_token_leeway_seconds,
    )?;

    Ok(Arc::new(validator))
}

/// Published keys default to the access-token verification key.
pub fn build_key_provider(config: &Config) -> Result<Arc<dyn PublicKeyProvider>, KeyError> {
    let provider = if config.jwks_public_keys_pem.is_empty() {
        StaticKeyProvider::from_pems(std::slice::from_ref(&config.access_jwt_public_key_pem))?
    } else {
        StaticKeyProvider::from_pems(&config.jwks_public_keys_pem)?
    };

    Ok(Arc::new(provider))
}
