//! Error types for the retrieval pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::generator::GeneratorError;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval pipeline.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Document extraction or chunk store error.
    #[error("document error: {0}")]
    Documents(#[from] handbook_documents::DocumentError),

    /// Embedding or index error.
    #[error("embedding error: {0}")]
    Embedding(#[from] handbook_embeddings::EmbeddingError),

    /// A query ran before ingestion produced the store and index.
    #[error("not ingested: {} is missing, run ingestion first", path.display())]
    NotIngested { path: PathBuf },

    /// Chunk store and index disagree on the number of chunks.
    #[error("chunk store has {chunks} chunks but index has {vectors} vectors")]
    StateMismatch { chunks: usize, vectors: usize },

    /// The index was built with a different embedding model.
    #[error("index was built with {indexed} but the engine uses {configured}, re-run ingestion")]
    ModelMismatch { indexed: String, configured: String },

    /// Ingestion produced no chunks and the policy is to abort.
    #[error("no chunks extracted from {}", .0.display())]
    EmptyCorpus(PathBuf),

    /// Answer generation failed.
    #[error("answer generation failed: {0}")]
    Generator(#[from] GeneratorError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrievalError {
    /// Whether the caller must fix configuration (or credentials) before retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Generator(GeneratorError::MissingCredential(_))
        )
    }
}
