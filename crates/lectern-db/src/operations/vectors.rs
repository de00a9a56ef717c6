//! Vector encoding and similarity search.

use crate::database::SqliteIndex;
use crate::error::DbResult;
use crate::operations::artifacts::ArtifactRow;
use lectern_core::{ArtifactId, IndexHit};
use std::cmp::Ordering;

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot_product / denominator
}

/// Serialize a vector as little-endian `f32` bytes.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`], reading at most `dimensions` values.
pub fn decode_vector(bytes: &[u8], dimensions: usize) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .take(dimensions)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

impl SqliteIndex {
    /// Find the artifacts most similar to `query_vector`.
    ///
    /// This performs a brute-force search over all stored vectors.
    pub fn vector_search(
        &self,
        query_vector: &[f32],
        limit: usize,
        min_similarity: Option<f32>,
    ) -> DbResult<Vec<IndexHit>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM artifacts", ArtifactRow::COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map([], ArtifactRow::from_row)?;

        let mut results = Vec::new();
        for row in rows {
            let row = row?;
            let vector = decode_vector(&row.vector, row.dimensions);
            let score = cosine_similarity(query_vector, &vector);

            if min_similarity.map_or(true, |min| score >= min) {
                results.push(IndexHit {
                    id: ArtifactId::new(row.id.clone()),
                    metadata: row.metadata()?,
                    score,
                });
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(limit);

        Ok(results)
    }
}
