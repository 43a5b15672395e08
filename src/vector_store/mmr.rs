//! Maximal Marginal Relevance selection.
//!
//! Each step picks the candidate maximizing
//! `λ × sim(query, doc) − (1 − λ) × max(sim(doc, selected))`.
//! `λ = 1.0` reproduces plain top-k by relevance; `λ = 0.0` favours diversity only.

/// Cosine similarity of two vectors; zero when either has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for idx in 0..len {
        dot += a[idx] * b[idx];
        norm_a += a[idx] * a[idx];
        norm_b += b[idx] * b[idx];
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Select up to `k` candidate indices in MMR rank order.
///
/// Ties on the MMR score go to the more relevant candidate, then to the earlier one. When
/// there are no more than `k` candidates, all of them are returned (still MMR-ordered).
pub fn mmr_select(query: &[f32], candidates: &[Vec<f32>], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(candidates.len());
    if k == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|vector| cosine_similarity(query, vector))
        .collect();
    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k {
        let mut best: Option<(usize, f32, f32)> = None;
        for (slot, &candidate) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&chosen| cosine_similarity(&candidates[candidate], &candidates[chosen]))
                .fold(None, |acc: Option<f32>, sim| Some(acc.map_or(sim, |max| max.max(sim))))
                .unwrap_or(0.0);
            let score = lambda * relevance[candidate] - (1.0 - lambda) * redundancy;

            let better = match best {
                None => true,
                Some((_, best_score, best_relevance)) => {
                    score > best_score
                        || (score == best_score && relevance[candidate] > best_relevance)
                }
            };
            if better {
                best = Some((slot, score, relevance[candidate]));
            }
        }

        match best {
            Some((slot, _, _)) => selected.push(remaining.remove(slot)),
            None => break,
        }
    }

    selected
}
