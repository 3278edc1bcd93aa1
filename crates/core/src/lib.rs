//! Domain core for the docshelf documentation service.
//!
//! Holds the entity models, the versioning engine, the OpenAPI structural
//! editor, the word diff service, the usage event bus and the repository
//! ports that the HTTP layer plugs a storage adapter into.

pub mod api_key;
pub mod api_spec;
pub mod auth;
pub mod diff;
pub mod document;
pub mod environment;
pub mod error;
pub mod events;
pub mod pagination;
pub mod project;
pub mod shelf;
pub mod source;
pub mod store;
pub mod user;
pub mod validate;
pub mod versioning;

pub use error::{CoreError, CoreResult};
pub use shelf::{Shelf, ShelfBuilder};
