//! Credentials: password and API-key hashing, session tokens, and the
//! authenticated principal passed explicitly into every service call.

pub mod password;
pub mod principal;
pub mod token;

pub use principal::{Principal, Scope};
pub use token::{Claims, JwtKeys};
