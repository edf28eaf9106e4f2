//! # Stockroom
//!
//! PostgreSQL data access for an item inventory: an `items` table whose unit
//! of measure is normalized into a `units` lookup table.
//!
//! [`ItemRepository`] exposes create/read/update and soft-delete operations.
//! Each call borrows one connection from a [`ConnectionProvider`] and gives
//! it back before returning. Failures surface as [`RepositoryError`].

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod item;
pub mod metrics;
pub mod pool;
pub mod repository;
pub mod schema;
pub mod value;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::DatabaseConfig;
pub use connection::{connect, ConnectionError};
pub use error::RepositoryError;
pub use executor::{MayPostgresExecutor, SqlExecutor};
pub use item::{Item, ItemBuilder};
pub use pool::{ConnectionProvider, PgConnectionProvider};
pub use repository::ItemRepository;
pub use value::SqlRow;
