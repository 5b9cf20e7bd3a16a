//! Chunk extraction: documents in, ordered chunk records out.
//!
//! Extraction is best-effort per file. Missing, empty, unsupported or corrupt
//! documents are logged and skipped; the remaining files still produce chunks.
//! The order of the output (files in input order, units in document order)
//! is the chunk id space used by the rest of the pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunk::{Chunk, FileType};
use crate::error::{DocumentError, Result};
use crate::reader::{RawUnit, read_units};
use crate::text::{clean_text, has_content, sentence_count, title_of, word_count};
use crate::tokenizer::TokenCounter;

/// A document that produced no chunks, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDocument {
    /// Path of the document.
    pub path: PathBuf,

    /// Human-readable reason.
    pub reason: String,
}

/// Result of extracting a batch of documents.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    /// Chunks per document, in input order.
    pub documents: Vec<Vec<Chunk>>,

    /// Documents that were skipped or yielded nothing.
    pub skipped: Vec<SkippedDocument>,
}

impl ExtractionOutput {
    /// Total number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(Vec::len).sum()
    }

    /// All chunks in id order.
    pub fn flatten(self) -> Vec<Chunk> {
        self.documents.into_iter().flatten().collect()
    }
}

/// Reads documents and turns their pages or sections into chunks.
pub struct ChunkExtractor {
    token_counter: Arc<dyn TokenCounter>,
}

impl ChunkExtractor {
    /// Create an extractor that counts tokens with `token_counter`.
    pub fn new(token_counter: Arc<dyn TokenCounter>) -> Self {
        Self { token_counter }
    }

    /// Extract chunks from every path, in order.
    ///
    /// Per-file problems are logged and recorded in
    /// [`ExtractionOutput::skipped`]; only tokenizer failures abort the batch,
    /// since they would affect every document alike.
    pub fn extract<P: AsRef<Path>>(&self, paths: &[P]) -> Result<ExtractionOutput> {
        let mut output = ExtractionOutput::default();

        for path in paths {
            let path = path.as_ref();
            let start = Instant::now();

            match self.extract_file(path) {
                Ok(chunks) => {
                    info!(
                        "Parsed '{}' into {} chunks in {:.3} seconds",
                        path.display(),
                        chunks.len(),
                        start.elapsed().as_secs_f64()
                    );
                    if chunks.is_empty() {
                        warn!("No text extracted from {}", path.display());
                        output.skipped.push(SkippedDocument {
                            path: path.to_path_buf(),
                            reason: "no text extracted".to_string(),
                        });
                    }
                    output.documents.push(chunks);
                }
                Err(DocumentError::Tokenizer(reason)) => {
                    return Err(DocumentError::Tokenizer(reason));
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    output.skipped.push(SkippedDocument {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Extracted {} chunks from {} documents ({} skipped)",
            output.chunk_count(),
            paths.len(),
            output.skipped.len()
        );
        Ok(output)
    }

    /// Extract the chunks of a single document.
    pub fn extract_file(&self, path: &Path) -> Result<Vec<Chunk>> {
        if !path.exists() {
            return Err(DocumentError::NotFound(path.to_path_buf()));
        }
        let file_type = FileType::from_path(path)
            .ok_or_else(|| DocumentError::UnsupportedFormat(path.to_path_buf()))?;

        let bytes = std::fs::read(path)?;
        if bytes.is_empty() {
            return Err(DocumentError::EmptyFile(path.to_path_buf()));
        }

        let units = read_units(path, file_type, &bytes)?;
        let directory = path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut chunks = Vec::with_capacity(units.len());
        for unit in units {
            if !has_content(&unit.text) {
                debug!("Skipping empty unit {} of {}", unit.number, path.display());
                continue;
            }
            chunks.push(self.build_chunk(unit, &directory, &file_name, file_type)?);
        }
        Ok(chunks)
    }

    fn build_chunk(
        &self,
        unit: RawUnit,
        directory: &str,
        file_name: &str,
        file_type: FileType,
    ) -> Result<Chunk> {
        let cleaned = clean_text(&unit.text);

        Ok(Chunk {
            directory: directory.to_string(),
            file_name: file_name.to_string(),
            file_type,
            page_number: unit.number,
            char_count: unit.text.chars().count(),
            word_count: word_count(&cleaned),
            sentence_count: sentence_count(&cleaned),
            token_count: self.token_counter.count_tokens(&cleaned)?,
            origin_elements: unit.origin_elements,
            title: title_of(&unit.text),
            has_text: true,
            text: cleaned,
            embedding: None,
        })
    }
}

/// List the documents directly inside `dir` whose extension is allowed.
///
/// Matching is case-insensitive and the result is sorted by file name so
/// repeated ingestion runs assign the same chunk positions.
pub fn discover(dir: &Path, allowed_extensions: &[String]) -> Result<Vec<PathBuf>> {
    let allowed: Vec<String> = allowed_extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| DocumentError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| allowed.contains(&ext.to_ascii_lowercase()));
        if matches {
            files.push(entry.into_path());
        }
    }

    info!("Found {} documents in {}", files.len(), dir.display());
    Ok(files)
}
