//! Database configuration module for the batch transfer service.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust models.

use crate::entities::{BatchTransfer, BatchTransferHistory, BatchTransferRelation};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

/// Default database used when neither the config file nor `DATABASE_URL` names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/batch_transfer.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling
/// back to `configured` and then to [`DEFAULT_DATABASE_URL`].
#[must_use]
pub fn get_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        configured.map_or_else(|| DEFAULT_DATABASE_URL.to_string(), ToString::to_string)
    })
}

/// Establishes a connection to the database at `database_url`.
#[instrument(skip(database_url))]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database");
    let db = Database::connect(database_url).await?;
    info!("Database connection established");
    Ok(db)
}

/// Creates the batch, relation and history tables if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut batch_table = schema.create_table_from_entity(BatchTransfer);
    let mut relation_table = schema.create_table_from_entity(BatchTransferRelation);
    let mut history_table = schema.create_table_from_entity(BatchTransferHistory);

    batch_table.if_not_exists();
    relation_table.if_not_exists();
    history_table.if_not_exists();

    db.execute(builder.build(&batch_table)).await?;
    db.execute(builder.build(&relation_table)).await?;
    db.execute(builder.build(&history_table)).await?;

    debug!("Batch transfer tables ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{BatchTransferHistoryModel, BatchTransferModel, BatchTransferRelationModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<BatchTransferModel> = BatchTransfer::find().limit(1).all(&db).await?;
        let _: Vec<BatchTransferRelationModel> =
            BatchTransferRelation::find().limit(1).all(&db).await?;
        let _: Vec<BatchTransferHistoryModel> =
            BatchTransferHistory::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[test]
    fn test_get_database_url_prefers_configured_value() {
        // DATABASE_URL may be set by the surrounding environment
        if std::env::var("DATABASE_URL").is_err() {
            assert_eq!(get_database_url(Some("sqlite::memory:")), "sqlite::memory:");
            assert_eq!(get_database_url(None), DEFAULT_DATABASE_URL);
        }
    }
}
