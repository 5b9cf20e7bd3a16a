//! Chunk records: one extracted page or section plus its statistics.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Title used when the first line of a chunk is too short to name it.
pub const UNTITLED: &str = "Untitled";

/// Supported source document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Portable Document Format, one chunk per page.
    Pdf,
    /// Plain text, pages separated by form feeds.
    Txt,
    /// Word document, one chunk per heading-delimited section.
    Docx,
}

impl FileType {
    /// Every supported format.
    pub const ALL: [FileType; 3] = [FileType::Pdf, FileType::Docx, FileType::Txt];

    /// Detect the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Detect the format of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical lowercase extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Docx => "docx",
        }
    }
}

/// A unit of extracted document text, the atomic unit of retrieval.
///
/// A chunk has no stored id: its identity is its position in the chunk store,
/// which is also its position in the vector index. Field names on disk match
/// the `chunks_and_statistics.json` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Directory containing the source document.
    #[serde(rename = "file_directory")]
    pub directory: String,

    /// File name of the source document.
    pub file_name: String,

    /// Source document format.
    pub file_type: FileType,

    /// 1-indexed page (or section) number within the document.
    pub page_number: usize,

    /// Character count of the raw, uncleaned text.
    #[serde(rename = "page_char_count")]
    pub char_count: usize,

    /// Number of `\w+` runs in the cleaned text.
    #[serde(rename = "page_word_count")]
    pub word_count: usize,

    /// Number of sentences in the cleaned text.
    #[serde(rename = "page_sentence_count_raw")]
    pub sentence_count: usize,

    /// Number of embedding-model tokens in the cleaned text.
    #[serde(rename = "page_token_count")]
    pub token_count: usize,

    /// Kinds of source elements this chunk was built from.
    pub origin_elements: Vec<String>,

    /// First line of the text, or [`UNTITLED`].
    pub title: String,

    /// Whether meaningful text was found.
    #[serde(rename = "contains_text")]
    pub has_text: bool,

    /// Cleaned text.
    pub text: String,

    /// Embedding vector, filled in by the embedding stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Full path of the source document.
    pub fn source_path(&self) -> std::path::PathBuf {
        Path::new(&self.directory).join(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_path(Path::new("a/Policy.PDF")), Some(FileType::Pdf));
        assert_eq!(FileType::from_path(Path::new("notes.txt")), Some(FileType::Txt));
        assert_eq!(FileType::from_path(Path::new("handbook.docx")), Some(FileType::Docx));
        assert_eq!(FileType::from_path(Path::new("legacy.doc")), None);
        assert_eq!(FileType::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_chunk_json_layout() {
        let chunk = Chunk {
            directory: "data".to_string(),
            file_name: "leave.txt".to_string(),
            file_type: FileType::Txt,
            page_number: 1,
            char_count: 32,
            word_count: 5,
            sentence_count: 1,
            token_count: 9,
            origin_elements: vec!["Text".to_string()],
            title: "Parental leave is sixteen weeks.".to_string(),
            has_text: true,
            text: "Parental leave is sixteen weeks.".to_string(),
            embedding: None,
        };

        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["file_directory"], "data");
        assert_eq!(value["file_type"], "txt");
        assert_eq!(value["page_sentence_count_raw"], 1);
        assert_eq!(value["contains_text"], true);
        assert!(value.get("embedding").is_none());
        assert_eq!(chunk.source_path(), Path::new("data").join("leave.txt"));
    }
}
