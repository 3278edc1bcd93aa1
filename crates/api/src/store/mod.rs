//! Storage adapters that need the server's dependencies.

pub mod postgres;

pub use postgres::PgStore;
