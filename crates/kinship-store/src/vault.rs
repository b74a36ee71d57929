//! Vault store: a directory tree of markdown contact documents

use crate::error::{StoreError, StoreResult};
use crate::traits::ContactStore;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Default document extension
pub const DOCUMENT_EXTENSION: &str = "md";

/// File-system backed store rooted at a vault directory
///
/// Hidden files and directories (`.git`, `.obsidian`, ...) are skipped.
/// Writes go through a sibling temp file and a rename so a crash never
/// leaves a half-written document behind.
#[derive(Debug, Clone)]
pub struct VaultStore {
    root: PathBuf,
    extension: String,
}

impl VaultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DOCUMENT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a vault-relative path to a file path, refusing anything that
    /// would escape the vault
    pub fn resolve(&self, relative: &str) -> StoreResult<PathBuf> {
        let candidate = Path::new(relative);
        if relative.trim().is_empty() {
            return Err(StoreError::InvalidPath(relative.to_string()));
        }
        for component in candidate.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StoreError::InvalidPath(relative.to_string())),
            }
        }
        Ok(self.root.join(candidate))
    }

    /// Vault-relative `/`-separated path for a file inside the vault
    pub fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        (!parts.is_empty()).then(|| parts.join("/"))
    }

    /// Whether a path names a document this store manages
    pub fn is_document(&self, path: &Path) -> bool {
        let has_extension = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension.as_str()));
        let hidden = path
            .strip_prefix(&self.root)
            .map(|rel| rel.components().any(|c| is_hidden(c.as_os_str())))
            .unwrap_or(true);
        has_extension && !hidden
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

#[async_trait]
impl ContactStore for VaultStore {
    async fn initialize(&self) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tracing::debug!("Vault ready at {}", self.root.display());
        Ok(())
    }

    async fn list_documents(&self) -> StoreResult<Vec<String>> {
        if !self.root.is_dir() {
            return Err(StoreError::VaultNotFound(self.root.display().to_string()));
        }
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut paths = Vec::new();
            let walker = WalkDir::new(&store.root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));
            for entry in walker {
                let entry = entry?;
                if !entry.file_type().is_file() || !store.is_document(entry.path()) {
                    continue;
                }
                if let Some(relative) = store.relative(entry.path()) {
                    paths.push(relative);
                }
            }
            paths.sort();
            Ok::<_, StoreError>(paths)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("vault scan failed: {e}")))?
    }

    async fn read_document(&self, path: &str) -> StoreResult<Option<String>> {
        let file = self.resolve(path)?;
        match tokio::fs::read_to_string(&file).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, path: &str, text: &str) -> StoreResult<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
        let temp = file.with_file_name(format!(".{name}.tmp"));
        tokio::fs::write(&temp, text).await?;
        tokio::fs::rename(&temp, &file).await?;
        tracing::debug!("Wrote {}", path);
        Ok(())
    }

    async fn delete_document(&self, path: &str) -> StoreResult<()> {
        let file = self.resolve(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::DocumentNotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn vault() -> (TempDir, VaultStore) {
        let dir = TempDir::new().unwrap();
        let store = VaultStore::new(dir.path());
        store.initialize().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let (_dir, store) = vault().await;
        store
            .write_document("People/Ann.md", "---\nFN: Ann\n---\n")
            .await
            .unwrap();

        let doc = store.require_document("People/Ann.md").await.unwrap();
        assert_eq!(doc.display_name(), "Ann");
        assert_eq!(doc.stem(), "Ann");

        store.delete_document("People/Ann.md").await.unwrap();
        assert!(store.read_document("People/Ann.md").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_skips_hidden_and_foreign_files() {
        let (dir, store) = vault().await;
        std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join(".obsidian/app.md"), "x").unwrap();
        std::fs::write(dir.path().join("b/Bob.md"), "x").unwrap();
        std::fs::write(dir.path().join("Ann.md"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join(".Ann.md.tmp"), "x").unwrap();

        let paths = store.list_documents().await.unwrap();
        assert_eq!(paths, vec!["Ann.md", "b/Bob.md"]);
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_vault() {
        let (_dir, store) = vault().await;
        assert!(matches!(
            store.write_document("../evil.md", "x").await,
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.read_document("/etc/passwd").await,
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_vault_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = VaultStore::new(dir.path().join("missing"));
        assert!(matches!(
            store.list_documents().await,
            Err(StoreError::VaultNotFound(_))
        ));
    }
}
