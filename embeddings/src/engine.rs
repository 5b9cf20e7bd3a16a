//! Batch and single-text embedding on top of a provider.

use std::sync::Arc;

use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;

/// Default number of texts sent to the provider per call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Maps chunk texts and query texts into the same vector space.
///
/// Both entry points go through the same provider, so stored chunk vectors and
/// query vectors are comparable as long as the model identifier is unchanged
/// between ingestion and querying.
#[derive(Clone)]
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl EmbeddingEngine {
    /// Create an engine over `provider` with the default batch size.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of texts embedded per provider call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Identifier of the underlying model.
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Vector length produced by this engine.
    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// Embed `texts`, returning one vector per text in input order.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let vectors = self.provider.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "provider {} returned {} vectors for {} texts",
                    self.provider.name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            for vector in &vectors {
                self.check_dimension(vector)?;
            }
            embeddings.extend(vectors);
            debug!("Embedded {}/{} texts", embeddings.len(), texts.len());
        }

        info!(
            "Embedded {} texts with {} ({} dimensions)",
            embeddings.len(),
            self.model(),
            self.dimension()
        );
        Ok(embeddings)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Embedding> {
        let mut vectors = self.provider.embed_batch(&[text.to_string()]).await?;
        let vector = vectors.pop().ok_or_else(|| {
            EmbeddingError::InvalidResponse("provider returned no vector".to_string())
        })?;
        if !vectors.is_empty() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "provider returned {} vectors for one text",
                vectors.len() + 1
            )));
        }
        self.check_dimension(&vector)?;
        Ok(vector)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        let expected = self.dimension();
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Encodes each text as `[len, first byte]` and records batch sizes.
    struct RecordingProvider {
        batches: Mutex<Vec<usize>>,
        dimension: usize,
    }

    impl RecordingProvider {
        fn new(dimension: usize) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                dimension,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "recording-v1"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.batches.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|t| {
                    vec![
                        t.len() as f32,
                        t.bytes().next().map_or(0.0, f32::from),
                    ]
                })
                .collect())
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn corpus() -> Vec<String> {
        ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_embed_many_preserves_order_across_batch_sizes() {
        let texts = corpus();
        let mut outputs = Vec::new();

        for batch_size in [1, 2, 5, 64] {
            let provider = Arc::new(RecordingProvider::new(2));
            let engine = EmbeddingEngine::new(provider).with_batch_size(batch_size);
            outputs.push(engine.embed_many(&texts).await.unwrap());
        }

        for output in &outputs {
            assert_eq!(output, &outputs[0]);
        }
        let lengths: Vec<f32> = outputs[0].iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn test_embed_many_batches_requests() {
        let provider = Arc::new(RecordingProvider::new(2));
        let engine = EmbeddingEngine::new(provider.clone()).with_batch_size(2);

        engine.embed_many(&corpus()).await.unwrap();

        assert_eq!(*provider.batches.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_embed_one_matches_embed_many() {
        let engine = EmbeddingEngine::new(Arc::new(RecordingProvider::new(2)));

        let single = engine.embed_one("ccc").await.unwrap();
        let many = engine.embed_many(&corpus()).await.unwrap();

        assert_eq!(single, many[2]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let provider = Arc::new(RecordingProvider::new(2));
        let engine = EmbeddingEngine::new(provider.clone());

        assert!(engine.embed_many(&[]).await.unwrap().is_empty());
        assert!(provider.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_dimension_is_enforced() {
        // Advertises 3 dimensions but produces 2
        let engine = EmbeddingEngine::new(Arc::new(RecordingProvider::new(3)));

        let err = engine.embed_one("x").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }
}
