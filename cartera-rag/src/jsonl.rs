//! Durable vector store persisted as one JSONL file per collection.
//!
//! Each collection lives at `{dir}/{collection}.jsonl`, one
//! [`IndexedDocument`] per line in insertion order. All collections are read
//! into memory when the store is opened; inserts are appended to the file
//! under an exclusive `fs2` lock before the in-memory view is updated, so a
//! successful `add` is always on disk.
//!
//! Several stores (or processes) may share a directory. While holding the
//! lock, `add` compares the file length with the length it last saw; if
//! another writer appended in between, the collection is reloaded from disk
//! and ids already written there are rejected with
//! [`RagError::Conflict`] instead of being appended twice.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use fs2::FileExt;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::document::{IndexedDocument, Match};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionData, VectorStore};

const BACKEND: &str = "Jsonl";
const EXTENSION: &str = "jsonl";
const LOCK_RETRIES: usize = 10;
const LOCK_RETRY_MS: u64 = 100;

/// A collection's documents plus the file length they were read from.
#[derive(Debug, Default)]
struct Collection {
    data: CollectionData,
    synced_len: u64,
}

/// A [`VectorStore`] persisted under a directory on the local filesystem.
///
/// Reads are served from memory and do not observe other writers until
/// this store's next `add` to the same collection, or until it is reopened.
#[derive(Debug)]
pub struct JsonlVectorStore {
    dir: PathBuf,
    collections: RwLock<HashMap<String, Collection>>,
}

impl JsonlVectorStore {
    /// Open (creating if needed) the store rooted at `dir` and load every
    /// collection found there.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailable`] if the directory cannot be
    /// created or read, or if a collection file holds an unreadable line.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, "create directory", e))?;

        let mut collections = HashMap::new();
        let entries = std::fs::read_dir(&dir).map_err(|e| io_error(&dir, "read directory", e))?;
        for entry in entries {
            let path = entry.map_err(|e| io_error(&dir, "read directory", e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let file = File::open(&path).map_err(|e| io_error(&path, "open", e))?;
            let collection = load_collection(&path, &file, name)?;
            info!(
                backend = BACKEND,
                collection = name,
                documents = collection.data.len(),
                "loaded collection"
            );
            collections.insert(name.to_string(), collection);
        }

        Ok(Self { dir, collections: RwLock::new(collections) })
    }

    /// The directory this store persists to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(RagError::InvalidArgument(format!(
                "collection name '{name}' must be non-empty ASCII alphanumerics, '_' or '-'"
            )));
        }
        Ok(self.dir.join(format!("{name}.{EXTENSION}")))
    }
}

fn missing(collection: &str) -> RagError {
    RagError::index(BACKEND, format!("collection '{collection}' does not exist"))
}

fn io_error(path: &Path, action: &str, e: std::io::Error) -> RagError {
    error!(backend = BACKEND, path = %path.display(), action, error = %e, "storage I/O failed");
    RagError::index(BACKEND, format!("failed to {action} '{}': {e}", path.display()))
}

fn open_collection_file(path: &Path) -> std::io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true).read(true);
    #[cfg(unix)]
    {
        opts.mode(0o600);
    }
    opts.open(path)
}

/// Read every document in `file` from the start. The caller holds a lock.
fn read_documents(path: &Path, file: &File) -> Result<Vec<IndexedDocument>> {
    let mut documents = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_error(path, "read", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let doc = serde_json::from_str::<IndexedDocument>(&line).map_err(|e| {
            RagError::index(
                BACKEND,
                format!("corrupt document on line {} of '{}': {e}", index + 1, path.display()),
            )
        })?;
        documents.push(doc);
    }
    Ok(documents)
}

fn load_collection(path: &Path, file: &File, name: &str) -> Result<Collection> {
    lock_with_retry(file, <File as FileExt>::try_lock_shared)
        .map_err(|e| io_error(path, "lock", e))?;
    let synced_len = file.metadata().map_err(|e| io_error(path, "stat", e))?.len();
    let documents = read_documents(path, file)?;
    let data = CollectionData::from_documents(name, documents)
        .map_err(|e| RagError::index(BACKEND, format!("{}: {e}", path.display())))?;
    Ok(Collection { data, synced_len })
}

/// What an append found and did while holding the exclusive lock.
struct AppendOutcome {
    /// Documents on disk before the append, if another writer changed the file.
    reloaded: Option<Vec<IndexedDocument>>,
    /// Ids rejected because another writer already stored them.
    conflicts: Vec<String>,
    /// File length once the lock is released.
    len: u64,
}

fn append_documents(
    path: &Path,
    synced_len: u64,
    ids: &HashSet<String>,
    payload: &[u8],
) -> Result<AppendOutcome> {
    let mut file = open_collection_file(path).map_err(|e| io_error(path, "open", e))?;
    lock_with_retry(&file, <File as FileExt>::try_lock_exclusive)
        .map_err(|e| io_error(path, "lock", e))?;
    let current_len = file.metadata().map_err(|e| io_error(path, "stat", e))?.len();

    let mut outcome = AppendOutcome { reloaded: None, conflicts: Vec::new(), len: current_len };
    if current_len != synced_len {
        let on_disk = read_documents(path, &file)?;
        outcome.conflicts =
            on_disk.iter().filter(|doc| ids.contains(&doc.id)).map(|doc| doc.id.clone()).collect();
        outcome.reloaded = Some(on_disk);
        if !outcome.conflicts.is_empty() {
            return Ok(outcome);
        }
    }

    file.write_all(payload).map_err(|e| io_error(path, "append to", e))?;
    file.flush().map_err(|e| io_error(path, "append to", e))?;
    file.sync_data().map_err(|e| io_error(path, "sync", e))?;
    outcome.len = current_len + payload.len() as u64;
    Ok(outcome)
}

fn lock_with_retry(
    file: &File,
    try_lock: fn(&File) -> std::io::Result<()>,
) -> std::io::Result<()> {
    for _ in 0..LOCK_RETRIES {
        match try_lock(file) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(LOCK_RETRY_MS));
            }
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, "collection file lock timeout"))
}

#[async_trait]
impl VectorStore for JsonlVectorStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<()> {
        let path = self.collection_path(name)?;
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Ok(());
        }
        // Another writer may have created and filled the file since `open`.
        let file = open_collection_file(&path).map_err(|e| io_error(&path, "create", e))?;
        let collection = load_collection(&path, &file, name)?;
        info!(
            backend = BACKEND,
            collection = name,
            path = %path.display(),
            documents = collection.data.len(),
            "opened collection"
        );
        collections.insert(name.to_string(), collection);
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let path = self.collection_path(name)?;
        let mut collections = self.collections.write().await;
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&path, "delete", e)),
        }
        if collections.remove(name).is_some() {
            info!(backend = BACKEND, collection = name, "deleted collection");
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.data.len()).ok_or_else(|| missing(collection))
    }

    async fn add(&self, collection: &str, documents: Vec<IndexedDocument>) -> Result<()> {
        let path = self.collection_path(collection)?;
        let mut collections = self.collections.write().await;
        let entry = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        entry.data.check_insert(collection, &documents)?;

        let mut payload = String::new();
        for doc in &documents {
            let line = serde_json::to_string(doc).map_err(|e| {
                RagError::index(BACKEND, format!("failed to serialize '{}': {e}", doc.id))
            })?;
            payload.push_str(&line);
            payload.push('\n');
        }
        let ids: HashSet<String> = documents.iter().map(|doc| doc.id.clone()).collect();

        let synced_len = entry.synced_len;
        let outcome = tokio::task::spawn_blocking(move || {
            append_documents(&path, synced_len, &ids, payload.as_bytes())
        })
        .await
        .map_err(|e| RagError::index(BACKEND, format!("write task failed: {e}")))??;

        if let Some(on_disk) = outcome.reloaded {
            warn!(
                backend = BACKEND,
                collection,
                documents = on_disk.len(),
                "collection changed on disk, reloaded"
            );
            entry.data = CollectionData::from_documents(collection, on_disk)?;
        }
        entry.synced_len = outcome.len;
        if !outcome.conflicts.is_empty() {
            return Err(RagError::Conflict {
                collection: collection.to_string(),
                ids: outcome.conflicts,
            });
        }

        entry.data.insert(documents);
        Ok(())
    }

    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<Match>> {
        let collections = self.collections.read().await;
        let entry = collections.get(collection).ok_or_else(|| missing(collection))?;
        entry.data.nearest(collection, embedding, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::CustomerMetadata;

    fn doc(id: &str, embedding: Vec<f32>) -> IndexedDocument {
        IndexedDocument {
            id: id.to_string(),
            summary: format!("summary {id}"),
            embedding,
            metadata: CustomerMetadata {
                customer_id: id.to_string(),
                sex: "F".into(),
                age: 40.0,
                income: 1000.0,
                public_sector: 0,
            },
        }
    }

    #[tokio::test]
    async fn documents_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = JsonlVectorStore::open(tmp.path()).unwrap();
            store.get_or_create_collection("clientes").await.unwrap();
            store
                .add("clientes", vec![doc("a", vec![1.0, 0.0]), doc("b", vec![0.0, 1.0])])
                .await
                .unwrap();
        }

        let reopened = JsonlVectorStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.count("clientes").await.unwrap(), 2);
        let matches = reopened.query("clientes", &[0.0, 1.0], 1).await.unwrap();
        assert_eq!(matches[0].customer_id, "b");
    }

    #[tokio::test]
    async fn second_writer_on_same_directory_conflicts_instead_of_duplicating() {
        let tmp = tempfile::tempdir().unwrap();
        let first = JsonlVectorStore::open(tmp.path()).unwrap();
        let second = JsonlVectorStore::open(tmp.path()).unwrap();
        first.get_or_create_collection("c").await.unwrap();
        second.get_or_create_collection("c").await.unwrap();

        first.add("c", vec![doc("C001", vec![1.0, 0.0])]).await.unwrap();
        let err = second.add("c", vec![doc("C001", vec![1.0, 0.0])]).await.unwrap_err();
        match err {
            RagError::Conflict { collection, ids } => {
                assert_eq!(collection, "c");
                assert_eq!(ids, ["C001"]);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        // The rejected writer picked up the other writer's document.
        assert_eq!(second.count("c").await.unwrap(), 1);

        second.add("c", vec![doc("C002", vec![0.0, 1.0])]).await.unwrap();
        first.add("c", vec![doc("C003", vec![1.0, 1.0])]).await.unwrap();
        assert_eq!(first.count("c").await.unwrap(), 3);

        let reopened = JsonlVectorStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.count("c").await.unwrap(), 3);
        let ids: Vec<String> = reopened
            .query("c", &[1.0, 0.0], 3)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.customer_id)
            .collect();
        assert_eq!(ids, ["C001", "C003", "C002"]);
    }

    #[tokio::test]
    async fn collection_created_elsewhere_is_loaded_on_first_use() {
        let tmp = tempfile::tempdir().unwrap();
        let late = JsonlVectorStore::open(tmp.path()).unwrap();
        {
            let early = JsonlVectorStore::open(tmp.path()).unwrap();
            early.get_or_create_collection("c").await.unwrap();
            early.add("c", vec![doc("C001", vec![1.0])]).await.unwrap();
        }

        late.get_or_create_collection("c").await.unwrap();
        assert_eq!(late.count("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonlVectorStore::open(tmp.path()).unwrap();
        store.get_or_create_collection("clientes").await.unwrap();
        store.add("clientes", vec![doc("a", vec![1.0])]).await.unwrap();
        store.get_or_create_collection("clientes").await.unwrap();
        assert_eq!(store.count("clientes").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejected_insert_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonlVectorStore::open(tmp.path()).unwrap();
        store.get_or_create_collection("clientes").await.unwrap();
        store.add("clientes", vec![doc("a", vec![1.0])]).await.unwrap();

        let err = store
            .add("clientes", vec![doc("b", vec![1.0]), doc("a", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Conflict { ref ids, .. } if ids == &["a".to_string()]));

        let reopened = JsonlVectorStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.count("clientes").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonlVectorStore::open(tmp.path()).unwrap();
        store.get_or_create_collection("clientes").await.unwrap();
        assert!(tmp.path().join("clientes.jsonl").exists());

        store.delete_collection("clientes").await.unwrap();
        assert!(!tmp.path().join("clientes.jsonl").exists());
        assert!(matches!(
            store.count("clientes").await,
            Err(RagError::IndexUnavailable { .. })
        ));
        store.delete_collection("clientes").await.unwrap();
    }

    #[test]
    fn corrupt_file_fails_open() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("clientes.jsonl"), "{not json}\n").unwrap();
        let err = JsonlVectorStore::open(tmp.path()).unwrap_err();
        assert!(matches!(err, RagError::IndexUnavailable { .. }));
    }

    #[tokio::test]
    async fn rejects_path_like_collection_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonlVectorStore::open(tmp.path()).unwrap();
        let err = store.get_or_create_collection("../escape").await.unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
    }
}
