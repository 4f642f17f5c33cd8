/*!
 * Identity extractor
 *
 * Hands the IdentityContext attached by the identity middleware to handlers.
 * Never rejects: without middleware (or credentials) the identity is anonymous.
 */

mod core;

pub use core::IdentityExtractor;
