/*
 * Responsibility
 * - identity: credentials (bearer header or cookies) -> IdentityContext in request extensions
 * - authorize: run the registered AuthorizationInterceptor before the handler
 *
 * Apply identity outside authorize so the interceptor sees the identity.
 */
pub mod authorize;
pub mod identity;
