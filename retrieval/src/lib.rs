//! # Handbook Retrieval
//!
//! Retrieval-augmented question answering over a folder of company documents.
//!
//! - **Ingestion**: extract chunks, embed them, persist the chunk store and
//!   the flat vector index
//! - **Query**: embed the question, find the nearest chunks, and pass their
//!   text to an answer generator
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Retrieval Pipeline                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Ingestion:                                                     │
//! │  documents ──► ChunkExtractor ──► ChunkStore                    │
//! │                                      │                          │
//! │                                      ▼                          │
//! │                 EmbeddingEngine ──► FlatIndex                   │
//! │                                                                 │
//! │  Query:                                                         │
//! │  question ──► EmbeddingEngine ──► FlatIndex ──► ChunkStore      │
//! │                                                     │           │
//! │                                                     ▼           │
//! │                                            AnswerGenerator      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use handbook_retrieval::{RetrievalConfig, RetrievalPipeline, Services};
//!
//! let config = RetrievalConfig::load("handbook.toml")?.with_root("/srv/handbook");
//! let services = Services::from_config(&config)?;
//! let pipeline = RetrievalPipeline::new(config, services).with_generator(generator);
//!
//! pipeline.run_ingestion().await?;
//! let answer = pipeline.run_query("How many days can I work from home?").await?;
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod pipeline;

pub use config::{
    EmbeddingConfig, EmbeddingProviderType, EmptyCorpusPolicy, RetrievalConfig, TokenizerConfig,
};
pub use error::{Result, RetrievalError};
pub use generator::{AnswerGenerator, GeneratorError, MISSING_ANSWER, parse_answer};
pub use pipeline::{Answer, IngestionReport, RetrievalPipeline, RetrievedChunk, Services};

// Re-export from dependencies for convenience
pub use handbook_documents::{Chunk, ChunkStore, TokenCounter};
pub use handbook_embeddings::{EmbeddingEngine, EmbeddingProvider, FlatIndex};
