//! # Handbook Documents
//!
//! Turns a folder of company documents into an ordered list of chunk records
//! and keeps that list on disk.
//!
//! - **Discovery**: non-recursive, extension-filtered, sorted by file name
//! - **Extraction**: PDF pages, form-feed pages of text files, and
//!   heading-delimited DOCX sections become chunks with text statistics
//! - **Chunk Store**: a single JSON array whose positions are chunk ids
//!
//! ```text
//! data/*.{pdf,docx,txt} ──► ChunkExtractor ──► Vec<Chunk> ──► ChunkStore
//!                                │
//!                                ▼
//!                          TokenCounter
//! ```

pub mod chunk;
pub mod error;
pub mod extractor;
pub mod reader;
pub mod store;
pub mod text;
pub mod tokenizer;

pub use chunk::{Chunk, FileType, UNTITLED};
pub use error::{DocumentError, Result, StorageError};
pub use extractor::{ChunkExtractor, ExtractionOutput, SkippedDocument, discover};
pub use store::ChunkStore;
pub use tokenizer::{HuggingFaceTokenizer, TokenCounter};
