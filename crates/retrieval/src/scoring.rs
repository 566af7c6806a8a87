//! Keyword-overlap chunk scoring.
//!
//! Score = number of query words (lowercased, whitespace-split) that appear
//! as substrings of the lowercased chunk, plus a flat +5 when the entire
//! lowercased query appears verbatim. Score-0 chunks are never returned.

/// Flat bonus applied when the whole query phrase appears verbatim.
pub const PHRASE_BONUS: u32 = 5;

/// Score one chunk against a query.
pub fn score_chunk(content: &str, query: &str) -> u32 {
    let chunk = content.to_lowercase();
    let query = query.to_lowercase();
    let query = query.trim();

    if query.is_empty() {
        return 0;
    }

    let mut score = query
        .split_whitespace()
        .filter(|word| chunk.contains(*word))
        .count() as u32;

    if chunk.contains(query) {
        score += PHRASE_BONUS;
    }

    score
}
