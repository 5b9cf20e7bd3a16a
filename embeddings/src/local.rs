//! In-process sentence-transformer provider.
//!
//! Loads a BERT sentence-transformer (by default `all-MiniLM-L6-v2`) from the
//! Hugging Face hub and reproduces the sentence-transformers encode path:
//! padded batch, attention-masked mean pooling, then L2 normalisation.

use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;

/// Longest sequence the sentence-transformer was trained with.
const MAX_SEQUENCE_LENGTH: usize = 256;

fn model_err(e: impl std::fmt::Display) -> EmbeddingError {
    EmbeddingError::Model(e.to_string())
}

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl LoadedModel {
    fn encode(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(model_err)?;

        let batch = encodings.len();
        let seq_len = encodings.first().map_or(0, |e| e.get_ids().len());

        let mut ids = Vec::with_capacity(batch * seq_len);
        let mut type_ids = Vec::with_capacity(batch * seq_len);
        let mut mask = Vec::with_capacity(batch * seq_len);
        for encoding in &encodings {
            ids.extend_from_slice(encoding.get_ids());
            type_ids.extend_from_slice(encoding.get_type_ids());
            mask.extend_from_slice(encoding.get_attention_mask());
        }

        self.forward(ids, type_ids, mask, (batch, seq_len))
            .map_err(model_err)
    }

    fn forward(
        &self,
        ids: Vec<u32>,
        type_ids: Vec<u32>,
        mask: Vec<u32>,
        shape: (usize, usize),
    ) -> candle_core::Result<Vec<Embedding>> {
        let input_ids = Tensor::from_vec(ids, shape, &self.device)?;
        let token_type_ids = Tensor::from_vec(type_ids, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(mask, shape, &self.device)?;

        // (batch, seq, hidden)
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        let pooled = summed.broadcast_div(&counts)?;

        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        pooled.broadcast_div(&norms)?.to_vec2::<f32>()
    }
}

/// Sentence-transformer running on the CPU via candle.
pub struct SentenceTransformerProvider {
    model_id: String,
    dimension: usize,
    inner: Arc<LoadedModel>,
}

impl SentenceTransformerProvider {
    /// Download (or reuse the hub cache for) `model_id` and load it.
    ///
    /// This blocks while weights are fetched; call it once at startup.
    pub fn load(model_id: impl Into<String>) -> Result<Self> {
        let model_id = model_id.into();
        info!("Loading sentence-transformer {model_id}");

        let api = Api::new().map_err(model_err)?;
        let repo = api.repo(Repo::with_revision(
            model_id.clone(),
            RepoType::Model,
            "main".to_string(),
        ));

        let config_path = repo.get("config.json").map_err(model_err)?;
        let tokenizer_path = repo.get("tokenizer.json").map_err(model_err)?;
        let weights_path = repo.get("model.safetensors").map_err(model_err)?;

        let config_text = std::fs::read_to_string(config_path)?;
        let config: BertConfig = serde_json::from_str(&config_text)?;
        let raw_config: serde_json::Value = serde_json::from_str(&config_text)?;
        let dimension = raw_config["hidden_size"]
            .as_u64()
            .ok_or_else(|| model_err("config.json has no hidden_size"))? as usize;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(model_err)?;
        tokenizer.with_padding(Some(PaddingParams::default()));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(model_err)?;

        let device = Device::Cpu;
        // SAFETY: the weights file is owned by the hub cache and not mutated while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device) }
            .map_err(model_err)?;
        let model = BertModel::load(vb, &config).map_err(model_err)?;

        info!("Loaded {model_id} ({dimension} dimensions)");

        Ok(Self {
            model_id,
            dimension,
            inner: Arc::new(LoadedModel {
                model,
                tokenizer,
                device,
            }),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for SentenceTransformerProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Encoding {} texts with {}", texts.len(), self.model_id);

        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || inner.encode(&texts))
            .await
            .map_err(model_err)?
    }

    fn is_available(&self) -> bool {
        true
    }
}
