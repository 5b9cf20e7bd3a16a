//! # Embeddings
//!
//! This crate turns text into dense vectors and answers exact
//! nearest-neighbour queries over them.
//!
//! ## Features
//!
//! - **Embedding Engine**: batch and single-text embedding through one provider
//! - **Providers**: hosted OpenAI-compatible API, or an in-process
//!   sentence-transformer with the `local-model` feature
//! - **Flat Index**: brute-force squared-euclidean search with a binary file format
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► EmbeddingEngine ──► FlatIndex            │
//! │       │                                        │                │
//! │       ▼                                        ▼                │
//! │  OpenAI / SentenceTransformer            SearchHit (position)   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod index;
#[cfg(feature = "local-model")]
pub mod local;
pub mod provider;
pub mod similarity;

pub use engine::{DEFAULT_BATCH_SIZE, EmbeddingEngine};
pub use error::{EmbeddingError, Result};
pub use index::FlatIndex;
#[cfg(feature = "local-model")]
pub use local::SentenceTransformerProvider;
pub use provider::{EmbeddingProvider, OpenAIProvider};
pub use similarity::{SearchHit, squared_euclidean};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings when the model does not say otherwise.
pub const DEFAULT_DIMENSION: usize = 384; // all-MiniLM-L6-v2
