//! Chunk store persistence.
//!
//! The `ChunkStore` writes the ordered chunk list to a single JSON array and
//! reads it back. Array position is chunk identity, so the file is always
//! rewritten as a whole and never appended to.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::chunk::Chunk;
use crate::error::{DocumentError, Result, StorageError};

/// JSON file holding every chunk of the corpus, in id order.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    path: PathBuf,
}

impl ChunkStore {
    /// Create a store backed by `path`. Nothing is read or written yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Replace the stored chunks with `chunks`.
    ///
    /// Creates the parent directory if needed and writes atomically through a
    /// temp file, so a crash never leaves a half-written store behind.
    pub async fn save(&self, chunks: &[Chunk]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::CreateDirectory(format!("{}: {e}", parent.display())))?;
        }

        let content = serde_json::to_string_pretty(chunks)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", self.path.display())))?;

        info!("Saved {} chunks to {}", chunks.len(), self.path.display());
        Ok(())
    }

    /// Flatten per-document chunk lists in order and save them.
    pub async fn save_documents(&self, documents: &[Vec<Chunk>]) -> Result<usize> {
        let chunks: Vec<Chunk> = documents.iter().flatten().cloned().collect();
        self.save(&chunks).await?;
        Ok(chunks.len())
    }

    /// Load every stored chunk, in id order.
    pub async fn load(&self) -> Result<Vec<Chunk>> {
        if !self.exists() {
            return Err(DocumentError::MissingStore(self.path.clone()));
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", self.path.display())))?;

        let chunks: Vec<Chunk> = serde_json::from_str(&content)?;
        debug!("Loaded {} chunks from {}", chunks.len(), self.path.display());
        Ok(chunks)
    }
}
