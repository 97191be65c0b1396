//! Document and object storage behind the mesh services
//!
//! Backends only need the handful of operations the services and their
//! attacks use. The in-memory implementations keep each process
//! self-contained.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const ORDERS: &str = "orders";
pub const SECRETS: &str = "secrets";
pub const PAYMENTS_BUCKET: &str = "payments";
pub const INVOICES_BUCKET: &str = "invoices";
pub const HAPPY_FILE: &str = "happy-little-file.txt";

const HAPPY_FILE_CONTENTS: &str = "We don't make mistakes, just happy little accidents.\n";

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; fails if `id` already exists
    async fn create(&self, collection: &str, id: &str, doc: Value) -> Result<()>;
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<()>;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;
    /// Some document of `collection`, if it has any
    async fn first(&self, collection: &str) -> Result<Option<Value>>;
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<()>;
    async fn get(&self, bucket: &str, name: &str) -> Result<Option<Vec<u8>>>;
    async fn list(&self, bucket: &str) -> Result<Vec<String>>;
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Err(Error::Store(format!("{}/{} already exists", collection, id)));
        }
        docs.insert(id.to_string(), doc);
        Ok(())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn first(&self, collection: &str) -> Result<Option<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.values().next())
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<()> {
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(name.to_string(), data);
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(name))
            .cloned())
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        Ok(self
            .buckets
            .read()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// The stores one process works against
#[derive(Clone)]
pub struct MeshStore {
    pub documents: Arc<dyn DocumentStore>,
    pub objects: Arc<dyn ObjectStore>,
}

impl MeshStore {
    /// Fresh in-memory stores, seeded with the data attacks go after
    pub fn in_memory() -> Self {
        let mut secrets = BTreeMap::new();
        secrets.insert(
            "flag".to_string(),
            serde_json::json!({ "secret": "the-mesh-trusts-every-bearer" }),
        );
        let documents = MemoryDocumentStore {
            collections: RwLock::new(BTreeMap::from([(SECRETS.to_string(), secrets)])),
        };

        let objects = MemoryObjectStore::default();
        objects.buckets.write().insert(
            PAYMENTS_BUCKET.to_string(),
            BTreeMap::from([(HAPPY_FILE.to_string(), HAPPY_FILE_CONTENTS.as_bytes().to_vec())]),
        );

        Self {
            documents: Arc::new(documents),
            objects: Arc::new(objects),
        }
    }
}
