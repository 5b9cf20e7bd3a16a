//! Distance computation for embeddings.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, Result};

/// Compute the squared euclidean distance between two embeddings.
///
/// The square root is skipped: ordering is identical and the flat index
/// reports distances in this form.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum())
}

/// A nearest-neighbour search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Position of the matched vector in the index (and in the chunk store).
    pub position: usize,

    /// Squared euclidean distance to the query.
    pub distance: f32,
}

/// Find the `k` candidates closest to `query`.
///
/// Results are sorted by ascending distance; equal distances keep the lower
/// position first. Asking for more than `candidates.len()` returns them all.
pub fn nearest_k<'a, I>(query: &[f32], candidates: I, k: usize) -> Result<Vec<SearchHit>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scored: Vec<(OrderedFloat<f32>, usize)> = Vec::new();

    for (position, candidate) in candidates.into_iter().enumerate() {
        let distance = squared_euclidean(query, candidate)?;
        scored.push((OrderedFloat(distance), position));
    }

    // Tuple ordering gives (distance, position) ascending
    scored.sort_unstable();

    Ok(scored
        .into_iter()
        .take(k)
        .map(|(distance, position)| SearchHit {
            position,
            distance: distance.0,
        })
        .collect())
}
