use crate::config::DatabaseConfig;
use crate::connection::{connect, validate_connection_string, ConnectionError};
use crate::error::RepositoryError;
use crate::executor::MayPostgresExecutor;
use crate::pool::ConnectionProvider;

/// Opens a fresh `may_postgres` connection per acquisition.
///
/// There is no pooling here: the connection is closed when the returned
/// executor is dropped at the end of the repository operation.
#[derive(Debug, Clone)]
pub struct PgConnectionProvider {
    url: String,
    health_check_on_acquire: bool,
}

impl PgConnectionProvider {
    /// # Errors
    ///
    /// Returns `ConnectionError::InvalidConnectionString` for a malformed URL.
    pub fn new(url: impl Into<String>) -> Result<Self, ConnectionError> {
        let url = url.into();
        validate_connection_string(&url)?;
        Ok(Self {
            url,
            health_check_on_acquire: false,
        })
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, ConnectionError> {
        Ok(Self::new(config.url.clone())?.with_health_check(config.health_check_on_acquire))
    }

    pub fn with_health_check(mut self, enabled: bool) -> Self {
        self.health_check_on_acquire = enabled;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ConnectionProvider for PgConnectionProvider {
    type Connection = MayPostgresExecutor;

    fn acquire(&self) -> Result<Self::Connection, RepositoryError> {
        let executor = MayPostgresExecutor::new(connect(&self.url)?);
        if self.health_check_on_acquire && !executor.check_health()? {
            log::warn!("fresh connection failed its health check");
            return Err(ConnectionError::Unhealthy("SELECT 1 did not return 1".to_string()).into());
        }
        Ok(executor)
    }
}
