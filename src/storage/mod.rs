//! SeaORM storage layer.
//!
//! One backend over SQLite, MySQL/MariaDB and PostgreSQL; the concrete
//! engine is inferred from `DATABASE_URL`. Entities and migrations live in
//! the `migration` workspace member.

mod aggregates;
mod connection;
mod events;

use sea_orm::{DatabaseConnection, DbBackend};
use tracing::warn;

use crate::errors::{LinkpulseError, Result};

pub use aggregates::{BreakdownRow, CounterSums, EventScope, TrendRow, VisitorPage};
pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use events::{EventRecord, PersistOutcome};

/// Infer the database engine from the URL scheme.
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(LinkpulseError::database_config(format!(
            "Cannot infer database backend from URL: {}. Supported schemes: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
}

impl SeaOrmStorage {
    /// Connect, run migrations, and return a ready storage handle.
    pub async fn new(database_url: &str) -> Result<Self> {
        if database_url.is_empty() {
            return Err(LinkpulseError::database_config(
                "DATABASE_URL is not set".to_string(),
            ));
        }

        let backend_name = infer_backend_from_url(database_url)?;

        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url).await?
        } else {
            connect_generic(database_url, &backend_name).await?
        };

        let storage = SeaOrmStorage { db, backend_name };
        run_migrations(&storage.db).await?;

        warn!("{} storage initialized.", storage.backend_name.to_uppercase());
        Ok(storage)
    }

    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// DbBackend for backend-specific SQL (date bucketing).
    pub fn db_backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    /// Liveness probe used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| LinkpulseError::database_connection(format!("Database ping failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(
            infer_backend_from_url("sqlite://data.db?mode=rwc").unwrap(),
            "sqlite"
        );
        assert_eq!(
            infer_backend_from_url("mysql://root@localhost/lp").unwrap(),
            "mysql"
        );
        assert_eq!(
            infer_backend_from_url("mariadb://root@localhost/lp").unwrap(),
            "mysql"
        );
        assert_eq!(
            infer_backend_from_url("postgres://localhost/lp").unwrap(),
            "postgres"
        );
        assert!(infer_backend_from_url("redis://localhost").is_err());
    }
}
