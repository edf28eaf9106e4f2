//! Helpers for tests that need a real PostgreSQL.
//!
//! The database is taken from `TEST_DATABASE_URL`. When the variable is not
//! set, [`TestDatabase::from_env`] returns `None` and callers skip.

use crate::error::RepositoryError;
use crate::executor::SqlExecutor;
use crate::pool::{ConnectionProvider, PgConnectionProvider};
use crate::schema;

pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

pub struct TestDatabase {
    provider: PgConnectionProvider,
}

impl TestDatabase {
    /// `None` when `TEST_DATABASE_URL` is unset or empty.
    ///
    /// # Errors
    ///
    /// Returns an error when the variable is set but not a valid connection string.
    pub fn from_env() -> Result<Option<Self>, RepositoryError> {
        match std::env::var(TEST_DATABASE_URL) {
            Ok(url) if !url.trim().is_empty() => Ok(Some(Self {
                provider: PgConnectionProvider::new(url)?,
            })),
            _ => {
                log::info!("{TEST_DATABASE_URL} not set; skipping database-backed test");
                Ok(None)
            }
        }
    }

    pub fn provider(&self) -> PgConnectionProvider {
        self.provider.clone()
    }

    /// Drop and recreate the inventory schema
    pub fn reset_schema(&self) -> Result<(), RepositoryError> {
        let conn = self.provider.acquire()?;
        for statement in schema::STATEMENTS {
            conn.execute(statement, &[])?;
        }
        Ok(())
    }

    /// Rows in `units` labelled `unit`
    pub fn count_units(&self, unit: &str) -> Result<i64, RepositoryError> {
        let conn = self.provider.acquire()?;
        let row = conn.query_one(
            "SELECT COUNT(*) AS count FROM units WHERE unit = $1",
            &[sea_query::Value::from(unit)],
        )?;
        match row.get("count")? {
            sea_query::Value::BigInt(Some(n)) => Ok(*n),
            other => Err(RepositoryError::Conversion(format!(
                "unexpected COUNT result {other:?}"
            ))),
        }
    }
}
