//! Error types for document extraction and chunk storage.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Errors that can occur while reading documents or chunk files.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Source document does not exist.
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Source document has no bytes.
    #[error("document is empty: {}", .0.display())]
    EmptyFile(PathBuf),

    /// Extension is not one of the supported formats.
    #[error("unsupported document format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// PDF could not be parsed.
    #[error("failed to read PDF {}: {reason}", path.display())]
    Pdf { path: PathBuf, reason: String },

    /// DOCX archive or markup could not be parsed.
    #[error("failed to read DOCX {}: {reason}", path.display())]
    Docx { path: PathBuf, reason: String },

    /// Tokenizer could not be loaded or failed to encode.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Chunk store file is missing.
    #[error("chunk store not found: {}", .0.display())]
    MissingStore(PathBuf),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create storage directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read the chunk file.
    #[error("failed to read file: {0}")]
    ReadFile(String),

    /// Failed to write the chunk file.
    #[error("failed to write file: {0}")]
    WriteFile(String),
}
