//! Infrastructure layer: directory adapters behind the authorization stores.

pub mod directory;

pub use directory::{DirectoryError, InMemoryDirectory, PgDirectory};
