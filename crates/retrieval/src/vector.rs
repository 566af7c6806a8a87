//! Vector similarity utilities for the embedding retrieval strategy.

use konsul_core::knowledge::DocumentChunk;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 =
/// opposite. Returns 0.0 if either vector is zero-length or the lengths
/// differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank chunks by cosine similarity to a query embedding.
///
/// Only chunks that carry an embedding and meet the similarity floor are
/// included; results are sorted by descending similarity and truncated.
pub fn rank_by_similarity(
    chunks: &[DocumentChunk],
    query_embedding: &[f32],
    limit: usize,
    min_similarity: f32,
) -> Vec<DocumentChunk> {
    let mut scored: Vec<(f32, &DocumentChunk)> = chunks
        .iter()
        .filter_map(|chunk| {
            let emb = chunk.embedding.as_ref()?;
            let sim = cosine_similarity(emb, query_embedding);
            (sim >= min_similarity).then_some((sim, chunk))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored.into_iter().map(|(_, c)| c.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, embedding: Option<Vec<f32>>) -> DocumentChunk {
        let mut c = DocumentChunk::new("src_1", 0, format!("Contenido {id}"));
        c.id = id.into();
        c.embedding = embedding;
        c
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn rank_orders_by_similarity() {
        let query = vec![1.0, 0.0, 0.0];
        let chunks = vec![
            chunk("a", Some(vec![0.0, 1.0, 0.0])),
            chunk("b", Some(vec![1.0, 0.0, 0.0])),
            chunk("c", Some(vec![0.5, 0.5, 0.0])),
        ];

        let ranked = rank_by_similarity(&chunks, &query, 10, 0.0);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].id, "b");
        assert_eq!(ranked[1].id, "c");
        assert_eq!(ranked[2].id, "a");
    }

    #[test]
    fn rank_respects_floor_and_limit() {
        let query = vec![1.0, 0.0];
        let chunks = vec![
            chunk("a", Some(vec![1.0, 0.0])),
            chunk("b", Some(vec![0.0, 1.0])),
            chunk("c", None),
        ];

        let ranked = rank_by_similarity(&chunks, &query, 10, 0.4);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "a");

        let ranked = rank_by_similarity(&chunks, &query, 0, 0.0);
        assert!(ranked.is_empty());
    }
}
