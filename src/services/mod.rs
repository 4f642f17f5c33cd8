pub mod auth;
pub mod codec;
pub mod cookie;
pub mod metadata;
