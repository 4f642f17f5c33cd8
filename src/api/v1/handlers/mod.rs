pub mod client;
pub mod health;
pub mod jwks;
pub mod logout;
pub mod me;
pub mod metadata;
