//! Connection acquisition.
//!
//! The repository never holds a connection between calls. Each operation asks
//! a [`ConnectionProvider`] for one connection, runs its statements on it and
//! drops it; dropping the connection value is the release.

mod postgres;

pub use postgres::PgConnectionProvider;

use crate::error::RepositoryError;
use crate::executor::SqlExecutor;

/// Hands out scoped database connections
pub trait ConnectionProvider {
    /// Connection type; released when dropped
    type Connection: SqlExecutor;

    /// Acquire a connection for the duration of one repository operation
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Connection` (or `Postgres`) when no
    /// connection is available.
    fn acquire(&self) -> Result<Self::Connection, RepositoryError>;
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for &P {
    type Connection = P::Connection;

    fn acquire(&self) -> Result<Self::Connection, RepositoryError> {
        (**self).acquire()
    }
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for std::sync::Arc<P> {
    type Connection = P::Connection;

    fn acquire(&self) -> Result<Self::Connection, RepositoryError> {
        (**self).acquire()
    }
}
