//! Repository error type
//!
//! Every storage failure surfaced by the item repository is a
//! [`RepositoryError`]. The variants record where the failure came from, but
//! callers are expected to treat them uniformly: the operation failed and
//! nothing was retried. A missing row is never an error; it is reported as
//! `Ok(None)` or `Ok(false)`.

use crate::connection::ConnectionError;
use may_postgres::Error as PostgresError;
use std::fmt;
use std::num::ParseIntError;

/// Error returned by every repository and executor operation
#[derive(Debug)]
pub enum RepositoryError {
    /// `PostgreSQL` error from `may_postgres` (constraint violation, bad SQL, lost connection)
    Postgres(PostgresError),
    /// No connection could be acquired from the provider
    Connection(ConnectionError),
    /// A caller-supplied id is not a valid integer
    InvalidId {
        id: String,
        source: ParseIntError,
    },
    /// A row cell or parameter could not be converted
    Conversion(String),
    /// A statement did not produce the rows it is required to produce
    Query(String),
}

impl RepositoryError {
    pub(crate) fn invalid_id(id: &str, source: ParseIntError) -> Self {
        RepositoryError::InvalidId {
            id: id.to_string(),
            source,
        }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryError::Postgres(e) => write!(f, "PostgreSQL error: {e}"),
            RepositoryError::Connection(e) => write!(f, "Connection error: {e}"),
            RepositoryError::InvalidId { id, source } => {
                write!(f, "Invalid item id '{id}': {source}")
            }
            RepositoryError::Conversion(s) => write!(f, "Conversion error: {s}"),
            RepositoryError::Query(s) => write!(f, "Query error: {s}"),
        }
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RepositoryError::Postgres(e) => Some(e),
            RepositoryError::Connection(e) => Some(e),
            RepositoryError::InvalidId { source, .. } => Some(source),
            RepositoryError::Conversion(_) | RepositoryError::Query(_) => None,
        }
    }
}

impl From<PostgresError> for RepositoryError {
    fn from(err: PostgresError) -> Self {
        RepositoryError::Postgres(err)
    }
}

impl From<ConnectionError> for RepositoryError {
    fn from(err: ConnectionError) -> Self {
        RepositoryError::Connection(err)
    }
}
