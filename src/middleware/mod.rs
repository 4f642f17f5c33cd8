/*
 * Responsibility
 * - middleware entry points (apply functions)
 */
pub mod auth;
pub mod http;
