//! In-memory contact store for testing

use crate::error::{StoreError, StoreResult};
use crate::traits::ContactStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// In-memory contact store
///
/// Useful for testing and embedding. Counts writes so callers can assert
/// that a pass left the store untouched.
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seed a store from `(path, text)` pairs without counting writes
    pub fn with_documents<P, T>(documents: impl IntoIterator<Item = (P, T)>) -> Self
    where
        P: Into<String>,
        T: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut map) = store.documents.write() {
            for (path, text) in documents {
                map.insert(path.into(), text.into());
            }
        }
        store
    }

    /// Number of successful writes and deletes since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Synchronous read, handy in assertions
    pub fn get(&self, path: &str) -> Option<String> {
        self.documents
            .read()
            .ok()
            .and_then(|map| map.get(path).cloned())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("Lock error: {}", e))
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn initialize(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn list_documents(&self) -> StoreResult<Vec<String>> {
        let documents = self.documents.read().map_err(lock_error)?;
        Ok(documents.keys().cloned().collect())
    }

    async fn read_document(&self, path: &str) -> StoreResult<Option<String>> {
        let documents = self.documents.read().map_err(lock_error)?;
        Ok(documents.get(path).cloned())
    }

    async fn write_document(&self, path: &str, text: &str) -> StoreResult<()> {
        if path.trim().is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let mut documents = self.documents.write().map_err(lock_error)?;
        documents.insert(path.to_string(), text.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("Wrote {} ({} bytes)", path, text.len());
        Ok(())
    }

    async fn delete_document(&self, path: &str) -> StoreResult<()> {
        let mut documents = self.documents.write().map_err(lock_error)?;
        if documents.remove(path).is_none() {
            return Err(StoreError::DocumentNotFound(path.to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_core::ContactId;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        store.initialize().await.unwrap();

        store
            .write_document("Ann.md", "---\nUID: ann-1\nFN: Ann\n---\n")
            .await
            .unwrap();
        assert_eq!(store.write_count(), 1);

        let doc = store.load_document("Ann.md").await.unwrap().unwrap();
        assert_eq!(doc.contact_id(), ContactId::new("ann-1"));
        assert_eq!(doc.display_name(), "Ann");

        store.delete_document("Ann.md").await.unwrap();
        assert!(store.read_document("Ann.md").await.unwrap().is_none());
        assert!(matches!(
            store.delete_document("Ann.md").await,
            Err(StoreError::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_seeded_documents_are_not_writes() {
        let store = MemoryStore::with_documents([("b.md", "B"), ("a.md", "A")]);
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.list_documents().await.unwrap(), vec!["a.md", "b.md"]);

        let documents = store.load_all().await.unwrap();
        let names: Vec<_> = documents.iter().map(|d| d.display_name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_save_round_trips_text() {
        let text = "---\nFN: Bob\nX-CUSTOM:  spaced \n---\n# Bob\n";
        let store = MemoryStore::with_documents([("Bob.md", text)]);
        let doc = store.require_document("Bob.md").await.unwrap();
        store.save_document(&doc).await.unwrap();
        assert_eq!(store.get("Bob.md").unwrap(), text);
    }
}
