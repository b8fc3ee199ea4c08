use crate::config::StoreConfig;
use crate::error::{LoaderError, Result};
use crate::storage::DocumentStore;
use crate::types::NormalizedRecord;
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use std::time::Duration;
use tracing::{debug, info};

/// MongoDB-backed document store
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and ping so an unreachable server fails here, not mid-run
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| LoaderError::StoreConnection {
                message: format!("Invalid connection string: {e}"),
            })?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.server_selection_timeout = Some(Duration::from_secs(config.connect_timeout_secs));

        let client = Client::with_options(options).map_err(|e| LoaderError::StoreConnection {
            message: format!("Failed to create client: {e}"),
        })?;
        let db = client.database(&config.database);

        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| LoaderError::StoreConnection {
                message: format!("Failed to reach database '{}': {e}", config.database),
            })?;

        info!("Connected to MongoDB database {}", config.database);
        Ok(Self { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Connectivity problems surface as connection errors, everything else as
/// a failed operation.
fn map_store_error(
    operation: &'static str,
    collection: &str,
    err: mongodb::error::Error,
) -> LoaderError {
    match *err.kind {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => LoaderError::StoreConnection {
            message: format!("{operation} on '{collection}': {err}"),
        },
        _ => LoaderError::StoreOperation {
            operation,
            collection: collection.to_string(),
            message: err.to_string(),
        },
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn clear(&self, collection: &str) -> Result<u64> {
        let result = self
            .db
            .collection::<Document>(collection)
            .delete_many(doc! {})
            .await
            .map_err(|e| map_store_error("delete_many", collection, e))?;
        Ok(result.deleted_count)
    }

    async fn insert_batch(&self, collection: &str, records: &[NormalizedRecord]) -> Result<u64> {
        // The driver rejects an empty insert_many
        if records.is_empty() {
            debug!("No records to insert into {}", collection);
            return Ok(0);
        }

        let docs: Vec<Document> = records.iter().map(NormalizedRecord::to_document).collect();
        let result = self
            .db
            .collection::<Document>(collection)
            .insert_many(docs)
            .await
            .map_err(|e| map_store_error("insert_many", collection, e))?;
        Ok(result.inserted_ids.len() as u64)
    }
}
