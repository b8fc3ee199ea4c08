use crate::error::{LoaderError, Result};
use crate::types::NormalizedRecord;
use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Document};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Document store the pipeline writes to
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Delete every document in `collection`, returning how many were removed
    async fn clear(&self, collection: &str) -> Result<u64>;

    /// Insert each record as a new document with a store-assigned id,
    /// returning how many were inserted
    async fn insert_batch(&self, collection: &str, records: &[NormalizedRecord]) -> Result<u64>;
}

/// In-memory store for local runs and tests
#[derive(Default)]
pub struct InMemoryStore {
    collections: Arc<Mutex<HashMap<String, Vec<Document>>>>,
    clear_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
        operation: &'static str,
        collection: &str,
    ) -> Result<MutexGuard<'_, HashMap<String, Vec<Document>>>> {
        self.collections.lock().map_err(|_| LoaderError::StoreOperation {
            operation,
            collection: collection.to_string(),
            message: "in-memory store lock poisoned".to_string(),
        })
    }

    /// Seed a collection with existing documents, bypassing `insert_batch`
    pub fn seed(&self, collection: &str, docs: Vec<Document>) -> Result<()> {
        let mut collections = self.lock("seed", collection)?;
        collections.entry(collection.to_string()).or_default().extend(docs);
        Ok(())
    }

    /// Snapshot of the documents currently in `collection`, in insertion order
    pub fn documents(&self, collection: &str) -> Result<Vec<Document>> {
        let collections = self.lock("find", collection)?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    /// Number of times `clear` has been called on any collection
    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn clear(&self, collection: &str) -> Result<u64> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.lock("delete_many", collection)?;
        let deleted = collections
            .get_mut(collection)
            .map(|docs| docs.drain(..).count())
            .unwrap_or(0);

        debug!("Cleared {} documents from {}", deleted, collection);
        Ok(deleted as u64)
    }

    async fn insert_batch(&self, collection: &str, records: &[NormalizedRecord]) -> Result<u64> {
        let mut collections = self.lock("insert_many", collection)?;
        let docs = collections.entry(collection.to_string()).or_default();
        for record in records {
            let mut doc = Document::new();
            doc.insert("_id", ObjectId::new());
            for (key, value) in record.to_document() {
                doc.insert(key, value);
            }
            docs.push(doc);
        }

        debug!("Inserted {} documents into {}", records.len(), collection);
        Ok(records.len() as u64)
    }
}
