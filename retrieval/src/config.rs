//! Configuration for the retrieval pipeline.

use std::path::{Path, PathBuf};

use handbook_documents::FileType;
use handbook_embeddings::DEFAULT_BATCH_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Sentence-transformer used for both embeddings and token counts.
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Number of chunks handed to the answer generator.
pub const DEFAULT_TOP_K: usize = 5;

/// Configuration for the retrieval pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Directory scanned for source documents.
    pub documents_dir: PathBuf,

    /// Chunk store file.
    pub chunks_path: PathBuf,

    /// Vector index file.
    pub index_path: PathBuf,

    /// Extensions (without the dot) that are ingested.
    pub allowed_extensions: Vec<String>,

    /// Chunks retrieved per query.
    pub top_k: usize,

    /// What ingestion does when no chunks are produced.
    pub empty_corpus: EmptyCorpusPolicy,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Tokenizer used for chunk token counts.
    pub tokenizer: TokenizerConfig,
}

impl RetrievalConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML configuration file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))
    }

    /// Resolve the relative document, chunk and index paths against `root`.
    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        for path in [
            &mut self.documents_dir,
            &mut self.chunks_path,
            &mut self.index_path,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }

    /// Set the documents directory.
    pub fn with_documents_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.documents_dir = dir.into();
        self
    }

    /// Set the number of chunks retrieved per query.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the empty-corpus policy.
    pub fn with_empty_corpus(mut self, policy: EmptyCorpusPolicy) -> Self {
        self.empty_corpus = policy;
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("data"),
            chunks_path: PathBuf::from("chunks/chunks_and_statistics.json"),
            index_path: PathBuf::from("chunks/flat.index"),
            allowed_extensions: FileType::ALL
                .iter()
                .map(|t| t.extension().to_string())
                .collect(),
            top_k: DEFAULT_TOP_K,
            empty_corpus: EmptyCorpusPolicy::default(),
            embedding: EmbeddingConfig::default(),
            tokenizer: TokenizerConfig::default(),
        }
    }
}

/// Behaviour of ingestion when no documents yield chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCorpusPolicy {
    /// Log a warning and write an empty store and index.
    #[default]
    Continue,
    /// Fail with [`RetrievalError::EmptyCorpus`].
    Abort,
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings.
    pub model: String,

    /// Texts per provider call.
    pub batch_size: usize,

    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Requested output size for models that can shorten their vectors.
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Local,
            model: DEFAULT_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimensions: None,
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// In-process sentence-transformer (needs the `local-model` feature).
    Local,
    /// OpenAI-compatible embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
}

/// Where the token-counting tokenizer comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Hugging Face model whose `tokenizer.json` is used.
    pub model: String,

    /// Local `tokenizer.json`, used instead of the hub when set.
    pub path: Option<PathBuf>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.documents_dir, PathBuf::from("data"));
        assert_eq!(
            config.chunks_path,
            PathBuf::from("chunks/chunks_and_statistics.json")
        );
        assert_eq!(config.allowed_extensions, vec!["pdf", "docx", "txt"]);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.empty_corpus, EmptyCorpusPolicy::Continue);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Local);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.tokenizer.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_load_partial_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("handbook.toml");
        std::fs::write(
            &path,
            r#"
top_k = 3
empty_corpus = "abort"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dimensions = 256
"#,
        )
        .unwrap();

        let config = RetrievalConfig::load(&path).unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.empty_corpus, EmptyCorpusPolicy::Abort);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::OpenAI);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.dimensions, Some(256));
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.documents_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("handbook.toml");
        std::fs::write(&path, "top_k = \"many\"").unwrap();

        let err = RetrievalConfig::load(&path).unwrap_err();
        assert!(matches!(err, RetrievalError::Config(_)));
    }

    #[test]
    fn test_with_root_keeps_absolute_paths() {
        let config = RetrievalConfig {
            index_path: PathBuf::from("/var/lib/handbook/flat.index"),
            ..RetrievalConfig::default()
        }
        .with_root("/srv/handbook");

        assert_eq!(config.documents_dir, PathBuf::from("/srv/handbook/data"));
        assert_eq!(
            config.chunks_path,
            PathBuf::from("/srv/handbook/chunks/chunks_and_statistics.json")
        );
        assert_eq!(config.index_path, PathBuf::from("/var/lib/handbook/flat.index"));
    }
}
