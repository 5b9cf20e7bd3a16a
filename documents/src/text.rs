//! Text cleaning and per-chunk statistics.

use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::chunk::UNTITLED;

/// Shortest first line accepted as a title.
pub const MIN_TITLE_CHARS: usize = 5;

#[allow(clippy::expect_used)]
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid word regex"));

/// Replace newlines and runs of whitespace with single spaces and trim.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-blank line of `raw` if it is long enough to be a title.
pub fn title_of(raw: &str) -> String {
    let first = raw.trim().lines().next().unwrap_or_default().trim();
    if first.chars().count() >= MIN_TITLE_CHARS {
        first.to_string()
    } else {
        UNTITLED.to_string()
    }
}

/// Number of `\w+` runs.
pub fn word_count(cleaned: &str) -> usize {
    WORD.find_iter(cleaned).count()
}

/// Number of UAX #29 sentences that contain at least one alphanumeric character.
pub fn sentence_count(cleaned: &str) -> usize {
    cleaned
        .split_sentence_bounds()
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count()
}

/// Whether `raw` holds anything besides whitespace.
pub fn has_content(raw: &str) -> bool {
    raw.chars().any(|c| !c.is_whitespace())
}
