//! Contact store trait definitions

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use kinship_core::ContactDocument;

/// Trait for contact document stores
///
/// Paths are relative, `/`-separated and include the file extension.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Prepare the store (create the vault directory, etc.)
    async fn initialize(&self) -> StoreResult<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// All document paths, sorted
    async fn list_documents(&self) -> StoreResult<Vec<String>>;

    /// Raw text of a document, `None` if it does not exist
    async fn read_document(&self, path: &str) -> StoreResult<Option<String>>;

    /// Create or replace a document
    async fn write_document(&self, path: &str, text: &str) -> StoreResult<()>;

    /// Delete a document
    async fn delete_document(&self, path: &str) -> StoreResult<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Parsed Access
    // ─────────────────────────────────────────────────────────────────────────

    /// Read and parse a document
    async fn load_document(&self, path: &str) -> StoreResult<Option<ContactDocument>> {
        Ok(self
            .read_document(path)
            .await?
            .map(|text| ContactDocument::parse(path, &text)))
    }

    /// Load a document that must exist
    async fn require_document(&self, path: &str) -> StoreResult<ContactDocument> {
        self.load_document(path)
            .await?
            .ok_or_else(|| StoreError::DocumentNotFound(path.to_string()))
    }

    /// Serialize and write a document back to its path
    async fn save_document(&self, document: &ContactDocument) -> StoreResult<()> {
        self.write_document(&document.path, &document.to_text()).await
    }

    /// Load every document in path order
    async fn load_all(&self) -> StoreResult<Vec<ContactDocument>> {
        let mut documents = Vec::new();
        for path in self.list_documents().await? {
            if let Some(document) = self.load_document(&path).await? {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}
