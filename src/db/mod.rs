// Database module - provides data access layer

use std::sync::Arc;

use crate::error::{Error, Result};

mod migrations;
mod models;

mod question;
mod seen;
mod session;
mod stats;

// Main database handle
#[derive(Clone)]
pub struct Db {
    db: Arc<libsql::Database>,
}

impl Db {
    pub async fn new(url: String, auth_token: String) -> Result<Self> {
        let db = if url.starts_with("file:") {
            // Local SQLite file
            let path = url.strip_prefix("file:").unwrap_or(&url);
            libsql::Builder::new_local(path).build().await?
        } else {
            // Remote Turso database
            libsql::Builder::new_remote(url.to_owned(), auth_token)
                .build()
                .await?
        };

        let conn = db.connect()?;

        // Verify connection
        let one = conn
            .query("SELECT 1", ())
            .await?
            .next()
            .await?
            .ok_or_else(|| Error::Corrupt("connection check failed".into()))?
            .get::<i32>(0)?;
        debug_assert_eq!(one, 1);

        migrations::run(&conn).await?;

        tracing::info!("database connection has been verified");

        Ok(Self { db: Arc::new(db) })
    }

    pub(crate) fn connect(&self) -> Result<libsql::Connection> {
        Ok(self.db.connect()?)
    }

    pub async fn migration_applied(&self, version: &str) -> Result<bool> {
        let conn = self.connect()?;
        let row = conn
            .query(
                "SELECT 1 FROM schema_migrations WHERE version = ?",
                libsql::params![version],
            )
            .await?
            .next()
            .await?;
        Ok(row.is_some())
    }
}
