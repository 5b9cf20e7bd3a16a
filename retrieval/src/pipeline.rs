//! Ingestion and query paths.
//!
//! Ingestion turns the documents directory into two files: the chunk store
//! and the vector index. Position `i` in one is position `i` in the other.
//! Queries read both back, embed the question, and hand the nearest chunks
//! to an [`AnswerGenerator`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use handbook_documents::{
    Chunk, ChunkExtractor, ChunkStore, HuggingFaceTokenizer, SkippedDocument, TokenCounter,
    discover,
};
use handbook_embeddings::{
    EmbeddingEngine, EmbeddingError, EmbeddingProvider, FlatIndex, OpenAIProvider,
};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::{EmbeddingConfig, EmbeddingProviderType, EmptyCorpusPolicy, RetrievalConfig};
use crate::error::{Result, RetrievalError};
use crate::generator::{AnswerGenerator, parse_answer};

/// Long-lived collaborators shared by every pipeline operation.
#[derive(Clone)]
pub struct Services {
    /// Counts model tokens for chunk statistics.
    pub token_counter: Arc<dyn TokenCounter>,

    /// Embeds chunk and query text.
    pub embeddings: EmbeddingEngine,
}

impl Services {
    /// Bundle already constructed services.
    pub fn new(token_counter: Arc<dyn TokenCounter>, embeddings: EmbeddingEngine) -> Self {
        Self {
            token_counter,
            embeddings,
        }
    }

    /// Load the tokenizer and embedding provider named by `config`.
    ///
    /// This may download model files on first use.
    pub fn from_config(config: &RetrievalConfig) -> Result<Self> {
        let token_counter: Arc<dyn TokenCounter> = match &config.tokenizer.path {
            Some(path) => Arc::new(HuggingFaceTokenizer::from_file(path)?),
            None => Arc::new(HuggingFaceTokenizer::from_pretrained(&config.tokenizer.model)?),
        };

        let provider = match config.embedding.provider {
            EmbeddingProviderType::Local => local_provider(&config.embedding)?,
            EmbeddingProviderType::OpenAI => openai_provider(&config.embedding),
        };
        info!(
            "Using {} embeddings with model {}",
            provider.name(),
            provider.model()
        );

        let embeddings =
            EmbeddingEngine::new(provider).with_batch_size(config.embedding.batch_size);
        Ok(Self::new(token_counter, embeddings))
    }
}

#[cfg(feature = "local-model")]
fn local_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = handbook_embeddings::SentenceTransformerProvider::load(config.model.as_str())?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "local-model"))]
fn local_provider(_config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(RetrievalError::Config(
        "local embeddings require the `local-model` feature".to_string(),
    ))
}

fn openai_provider(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    let mut provider = OpenAIProvider::new()
        .without_api_key()
        .with_base_url(config.base_url.as_str())
        .with_model(config.model.as_str());
    if let Some(dimensions) = config.dimensions {
        provider = provider.with_dimensions(dimensions);
    }
    match std::env::var(&config.api_key_env) {
        Ok(key) if !key.is_empty() => provider = provider.with_api_key(key),
        _ => warn!("{} is not set, embedding requests will fail", config.api_key_env),
    }
    Arc::new(provider)
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionReport {
    /// Documents found in the documents directory.
    pub files_discovered: usize,

    /// Documents that produced no chunks.
    pub skipped: Vec<SkippedDocument>,

    /// Chunks written to the store and index.
    pub chunks_written: usize,

    /// Embedding dimension of the index.
    pub dimension: usize,

    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

/// A chunk returned for a query, nearest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// Chunk id (store and index position).
    pub position: usize,

    /// Squared euclidean distance to the query.
    pub distance: f32,

    /// The stored chunk.
    pub chunk: Chunk,
}

/// Answer to a query plus the chunks it was grounded in.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Answer text extracted from the generator response.
    pub text: String,

    /// Unparsed generator response.
    pub raw: String,

    /// Retrieved chunks, nearest first.
    pub sources: Vec<RetrievedChunk>,
}

/// The ingestion and query pipeline.
pub struct RetrievalPipeline {
    config: RetrievalConfig,
    services: Services,
    generator: Option<Arc<dyn AnswerGenerator>>,
}

impl RetrievalPipeline {
    /// Create a pipeline over `config` using `services`.
    pub fn new(config: RetrievalConfig, services: Services) -> Self {
        Self {
            config,
            services,
            generator: None,
        }
    }

    /// Set the answer generator used by [`RetrievalPipeline::run_query`].
    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn chunk_store(&self) -> ChunkStore {
        ChunkStore::new(&self.config.chunks_path)
    }

    /// Rebuild the chunk store and vector index from the documents directory.
    ///
    /// Previous state is overwritten wholesale. Unreadable documents are
    /// skipped; embedding and index failures abort the run.
    pub async fn run_ingestion(&self) -> Result<IngestionReport> {
        let start = Instant::now();
        self.prepare_directories().await?;

        let paths = discover(
            &self.config.documents_dir,
            &self.config.allowed_extensions,
        )?;
        if paths.is_empty() {
            warn!(
                "No documents found in {}",
                self.config.documents_dir.display()
            );
        }

        let extractor = ChunkExtractor::new(Arc::clone(&self.services.token_counter));
        let output = extractor.extract(&paths)?;
        let skipped = output.skipped.clone();

        let mut chunks = output.flatten();
        if chunks.is_empty() {
            warn!(
                "No chunks extracted from {}",
                self.config.documents_dir.display()
            );
            if self.config.empty_corpus == EmptyCorpusPolicy::Abort {
                return Err(RetrievalError::EmptyCorpus(
                    self.config.documents_dir.clone(),
                ));
            }
        }

        // The old index no longer matches the store once the store is rewritten.
        // A run that fails past this point leaves no index, so queries report
        // `NotIngested` instead of mapping old positions onto new chunks.
        self.remove_index().await?;

        let store = self.chunk_store();
        store.save(&chunks).await?;

        let embed_start = Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.services.embeddings.embed_many(&texts).await?;
        info!(
            "Embedded {} chunks in {:.3} seconds",
            embeddings.len(),
            embed_start.elapsed().as_secs_f64()
        );

        let dimension = self.services.embeddings.dimension();
        let index = FlatIndex::build(dimension, &embeddings)?
            .with_model(self.services.embeddings.model());

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = Some(embedding);
        }
        store.save(&chunks).await?;
        index.persist(&self.config.index_path).await?;

        let report = IngestionReport {
            files_discovered: paths.len(),
            skipped,
            chunks_written: chunks.len(),
            dimension,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Ingested {} chunks from {} documents in {}ms",
            report.chunks_written, report.files_discovered, report.elapsed_ms
        );
        Ok(report)
    }

    async fn remove_index(&self) -> Result<()> {
        match fs::remove_file(&self.config.index_path).await {
            Ok(()) => {
                debug!("Removed previous index {}", self.config.index_path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn prepare_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.config.documents_dir).await?;
        for file in [&self.config.chunks_path, &self.config.index_path] {
            if let Some(parent) = file.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Return the `k` chunks nearest to `query`, nearest first.
    ///
    /// Fails with [`RetrievalError::NotIngested`] before the first ingestion
    /// (or after a failed one), with [`RetrievalError::StateMismatch`] when
    /// the store and index were written by different runs, and with a
    /// dimension or model mismatch when the index was built by another model.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let start = Instant::now();
        let store = self.chunk_store();
        ensure_ingested(store.path())?;
        ensure_ingested(&self.config.index_path)?;

        let chunks = store.load().await?;
        let index = FlatIndex::load(&self.config.index_path).await?;
        if index.len() != chunks.len() {
            return Err(RetrievalError::StateMismatch {
                chunks: chunks.len(),
                vectors: index.len(),
            });
        }
        self.check_index_model(&index)?;
        if index.is_empty() || k == 0 {
            debug!("Nothing to retrieve (index size {}, k {k})", index.len());
            return Ok(Vec::new());
        }

        let query_vector = self.services.embeddings.embed_one(query).await?;
        let hits = index.search(&query_vector, k)?;

        let retrieved: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter_map(|hit| {
                chunks.get(hit.position).map(|chunk| RetrievedChunk {
                    position: hit.position,
                    distance: hit.distance,
                    chunk: chunk.clone(),
                })
            })
            .collect();

        info!(
            "Retrieved {} chunks in {:.3} seconds",
            retrieved.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(retrieved)
    }

    /// Reject an index written by a different embedding model.
    fn check_index_model(&self, index: &FlatIndex) -> Result<()> {
        let engine = &self.services.embeddings;
        if index.dimension() != engine.dimension() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: index.dimension(),
                actual: engine.dimension(),
            }
            .into());
        }
        if !index.model().is_empty() && index.model() != engine.model() {
            return Err(RetrievalError::ModelMismatch {
                indexed: index.model().to_string(),
                configured: engine.model().to_string(),
            });
        }
        Ok(())
    }

    /// Answer `query` with the configured generator.
    pub async fn run_query(&self, query: &str) -> Result<Answer> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| RetrievalError::Config("no answer generator configured".to_string()))?;
        self.run_query_with(query, generator.as_ref()).await
    }

    /// Answer `query` with `generator`, grounded in the `top_k` nearest chunks.
    pub async fn run_query_with(
        &self,
        query: &str,
        generator: &dyn AnswerGenerator,
    ) -> Result<Answer> {
        let sources = self.retrieve(query, self.config.top_k).await?;
        let contexts: Vec<String> = sources.iter().map(|r| r.chunk.text.clone()).collect();

        let start = Instant::now();
        let raw = generator.generate(&contexts, query).await?;
        info!(
            "Generated answer from {} chunks in {:.3} seconds",
            contexts.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(Answer {
            text: parse_answer(&raw),
            raw,
            sources,
        })
    }
}

fn ensure_ingested(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RetrievalError::NotIngested {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_openai_provider_honors_dimensions() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::OpenAI,
            model: "text-embedding-3-small".to_string(),
            api_key_env: "HANDBOOK_TEST_UNSET_KEY".to_string(),
            ..EmbeddingConfig::default()
        };
        assert_eq!(openai_provider(&config).dimension(), 1536);

        let shortened = EmbeddingConfig {
            dimensions: Some(256),
            ..config
        };
        let provider = openai_provider(&shortened);
        assert_eq!(provider.dimension(), 256);
        assert_eq!(provider.model(), "text-embedding-3-small");
    }

    #[cfg(not(feature = "local-model"))]
    #[test]
    fn test_local_provider_requires_feature() {
        let err = local_provider(&EmbeddingConfig::default()).err();
        assert!(matches!(err, Some(RetrievalError::Config(_))));
        assert!(err.is_some_and(|e| e.is_configuration()));
    }
}
