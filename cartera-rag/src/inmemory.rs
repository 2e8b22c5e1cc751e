//! In-memory vector store using cosine distance.
//!
//! [`InMemoryVectorStore`] keeps every collection in a `HashMap` behind a
//! `tokio::sync::RwLock`. Nothing is persisted, so it suits tests and
//! short-lived processes; [`JsonlVectorStore`](crate::JsonlVectorStore) has
//! the same semantics with durable storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::document::{IndexedDocument, Match};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionData, VectorStore};

const BACKEND: &str = "InMemory";

/// An in-memory vector store.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, CollectionData>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(collection: &str) -> RagError {
    RagError::index(BACKEND, format!("collection '{collection}' does not exist"))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if !collections.contains_key(name) {
            info!(backend = BACKEND, collection = name, "created collection");
            collections.insert(name.to_string(), CollectionData::default());
        }
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(CollectionData::len).ok_or_else(|| missing(collection))
    }

    async fn add(&self, collection: &str, documents: Vec<IndexedDocument>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let data = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        data.check_insert(collection, &documents)?;
        data.insert(documents);
        Ok(())
    }

    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<Match>> {
        let collections = self.collections.read().await;
        let data = collections.get(collection).ok_or_else(|| missing(collection))?;
        data.nearest(collection, embedding, k)
    }
}
