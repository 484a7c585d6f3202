//! Storage module - Persistenza degli allegati caricati via multipart
//!
//! I file vengono salvati sotto una chiave opaca generata dal server: il nome
//! originale del client non tocca mai il filesystem.

use crate::core::AppError;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Metadati di un allegato salvato, inclusi nel payload `metadata` del
/// messaggio che lo referenzia.
#[derive(Serialize, Debug, Clone)]
pub struct StoredFile {
    pub key: String,
    pub original_name: String,
    pub content_type: String,
    pub size: usize,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn save(
        &self,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, AppError>;
}

/// Storage su disco locale. La directory viene creata al primo salvataggio.
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalDiskStorage { root: root.into() }
    }

    /// Chiave opaca che preserva solo l'estensione (se presente e innocua).
    fn storage_key(original_name: &str) -> String {
        let ext = original_name
            .rsplit_once('.')
            .map(|(_, e)| e)
            .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()));
        match ext {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase()),
            None => Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
impl FileStorage for LocalDiskStorage {
    #[instrument(skip(self, bytes), fields(original_name = %original_name, size = bytes.len()))]
    async fn save(
        &self,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, AppError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            warn!("Failed to create upload directory: {}", e);
            AppError::internal_server_error("Upload storage unavailable").with_details(e.to_string())
        })?;

        let key = Self::storage_key(original_name);
        let path = self.root.join(&key);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            warn!("Failed to write uploaded file: {}", e);
            AppError::internal_server_error("Failed to store file").with_details(e.to_string())
        })?;

        info!(key = %key, "File stored");
        Ok(StoredFile {
            key,
            original_name: original_name.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
        })
    }
}

/// Storage in memoria per i test: registra solo i metadati.
pub struct MemoryStorage;

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn save(
        &self,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, AppError> {
        Ok(StoredFile {
            key: Uuid::new_v4().to_string(),
            original_name: original_name.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_keeps_simple_extensions() {
        let key = LocalDiskStorage::storage_key("photo.JPG");
        assert!(key.ends_with(".jpg"));
    }

    #[test]
    fn storage_key_drops_suspicious_extensions() {
        let key = LocalDiskStorage::storage_key("archive.tar.gz/../../etc");
        assert!(!key.contains('/'));
        assert!(!key.contains(".."));
    }

    #[test]
    fn storage_key_handles_names_without_extension() {
        let key = LocalDiskStorage::storage_key("README");
        assert!(!key.contains('.'));
    }
}
