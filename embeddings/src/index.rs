//! Flat (brute-force) nearest-neighbour index.
//!
//! Vectors are stored contiguously in insertion order, so position `i` in the
//! index is position `i` in the chunk store. Search is exact: every stored
//! vector is compared against the query.
//!
//! ## File format
//!
//! ```text
//! magic  "HBFX"          4 bytes
//! version u32 LE         currently 2
//! dimension u32 LE
//! count u64 LE
//! model_len u32 LE
//! model  model_len bytes, UTF-8 embedding model identifier
//! data   count * dimension f32 LE, row-major
//! ```

use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};
use tokio::fs;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::{SearchHit, nearest_k};

const MAGIC: &[u8; 4] = b"HBFX";
const FORMAT_VERSION: u32 = 2;
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 4;

/// Exact nearest-neighbour index over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    model: String,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model: String::new(),
            data: Vec::new(),
        }
    }

    /// Record the identifier of the model that produced the vectors.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Identifier of the embedding model, empty if unknown.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build an index from `vectors`, keeping their order.
    pub fn build(dimension: usize, vectors: &[Embedding]) -> Result<Self> {
        let mut index = Self::new(dimension);
        index.data.reserve(dimension * vectors.len());
        for vector in vectors {
            index.add(vector)?;
        }
        info!(
            "Built flat index with {} vectors of {} dimensions",
            index.len(),
            dimension
        );
        Ok(index)
    }

    /// Append one vector at the next position.
    fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Vector length.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The vector stored at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len() {
            return None;
        }
        let start = position * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// Find the `k` stored vectors closest to `query`.
    ///
    /// Distances are squared euclidean, ascending, ties resolved by lowest
    /// position. A `k` larger than the index returns every vector.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.dimension == 0 {
            return Ok(Vec::new());
        }

        let hits = nearest_k(query, self.data.chunks_exact(self.dimension), k)?;
        debug!("Flat index search returned {} of {} vectors", hits.len(), self.len());
        Ok(hits)
    }

    /// Encode the index in its binary file format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf =
            BytesMut::with_capacity(HEADER_LEN + self.model.len() + self.data.len() * 4);
        buf.put_slice(MAGIC);
        buf.put_u32_le(FORMAT_VERSION);
        buf.put_u32_le(self.dimension as u32);
        buf.put_u64_le(self.len() as u64);
        buf.put_u32_le(self.model.len() as u32);
        buf.put_slice(self.model.as_bytes());
        for value in &self.data {
            buf.put_f32_le(*value);
        }
        buf.to_vec()
    }

    /// Decode an index from its binary file format.
    pub fn from_bytes(bytes: &[u8], origin: &Path) -> Result<Self> {
        let corrupt = |reason: String| EmbeddingError::CorruptIndex {
            path: origin.to_path_buf(),
            reason,
        };

        if bytes.len() < HEADER_LEN {
            return Err(corrupt(format!("file is only {} bytes", bytes.len())));
        }

        let mut buf = bytes;
        if &buf[..4] != MAGIC {
            return Err(corrupt("bad magic".to_string()));
        }
        buf.advance(4);

        let version = buf.get_u32_le();
        if version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported version {version}")));
        }

        let dimension = buf.get_u32_le() as usize;
        let count = buf.get_u64_le() as usize;

        let model_len = buf.get_u32_le() as usize;
        if buf.remaining() < model_len {
            return Err(corrupt(format!("model identifier needs {model_len} bytes")));
        }
        let model = std::str::from_utf8(&buf[..model_len])
            .map_err(|e| corrupt(format!("model identifier is not UTF-8: {e}")))?
            .to_string();
        buf.advance(model_len);

        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| corrupt("vector count overflows".to_string()))?;
        if buf.remaining() != expected {
            return Err(corrupt(format!(
                "expected {expected} data bytes for {count}x{dimension}, found {}",
                buf.remaining()
            )));
        }

        let mut data = Vec::with_capacity(count * dimension);
        while buf.has_remaining() {
            data.push(buf.get_f32_le());
        }

        Ok(Self {
            dimension,
            model,
            data,
        })
    }

    /// Write the index to `path`, replacing any previous file.
    pub async fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using a temp file
        let temp_path = path.with_extension("index.tmp");
        fs::write(&temp_path, self.to_bytes()).await?;
        fs::rename(&temp_path, path).await?;

        info!("Persisted {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    /// Read an index previously written with [`FlatIndex::persist`].
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).await?;
        let index = Self::from_bytes(&bytes, path)?;
        info!("Loaded {} vectors from {}", index.len(), path.display());
        Ok(index)
    }
}
