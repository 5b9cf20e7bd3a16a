//! Token accounting with the embedding model's tokenizer.
//!
//! Token counts are tied to the embedding model's vocabulary, so the counter
//! should be loaded from the same model the embedding engine uses.

use std::path::Path;

use hf_hub::api::sync::Api;
use tokenizers::Tokenizer;
use tracing::info;

use crate::error::{DocumentError, Result};

/// Counts model tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Number of input ids the model would see for `text`, special tokens included.
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

fn tokenizer_err(e: impl std::fmt::Display) -> DocumentError {
    DocumentError::Tokenizer(e.to_string())
}

/// A Hugging Face `tokenizer.json` tokenizer.
pub struct HuggingFaceTokenizer {
    tokenizer: Tokenizer,
}

impl HuggingFaceTokenizer {
    /// Load a tokenizer from a local `tokenizer.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DocumentError::NotFound(path.to_path_buf()));
        }
        let tokenizer = Tokenizer::from_file(path).map_err(tokenizer_err)?;
        Self::prepare(tokenizer, &path.display().to_string())
    }

    /// Fetch `tokenizer.json` for `model_id` from the Hugging Face hub (or its cache).
    pub fn from_pretrained(model_id: &str) -> Result<Self> {
        let api = Api::new().map_err(tokenizer_err)?;
        let path = api
            .model(model_id.to_string())
            .get("tokenizer.json")
            .map_err(tokenizer_err)?;
        let tokenizer = Tokenizer::from_file(path).map_err(tokenizer_err)?;
        Self::prepare(tokenizer, model_id)
    }

    /// Disable padding and truncation so counts reflect the whole text.
    fn prepare(mut tokenizer: Tokenizer, source: &str) -> Result<Self> {
        tokenizer.with_padding(None);
        tokenizer.with_truncation(None).map_err(tokenizer_err)?;
        info!("Loaded tokenizer from {source}");
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for HuggingFaceTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self.tokenizer.encode(text, true).map_err(tokenizer_err)?;
        Ok(encoding.get_ids().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tokenizer_file() {
        let err = HuggingFaceTokenizer::from_file("/nonexistent/tokenizer.json")
            .err()
            .unwrap();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }
}
