use docqa_core::config::RetrievalParams;
use docqa_core::error::AppError;

use crate::embeddings::Embedder;
use crate::model::Candidate;
use crate::store::VectorStore;

pub mod similarity;

/// Two-stage coarse-to-fine search: shortlist the nearest page-range
/// blocks, then search only those blocks' local chunk indexes. A
/// relevant chunk inside a coarse-rejected block is unreachable; that
/// recall trade keeps query cost sub-linear in corpus size.
pub fn search(
    store: &VectorStore,
    embedder: &dyn Embedder,
    query: &str,
    params: &RetrievalParams,
) -> Result<Vec<Candidate>, AppError> {
    let total_blocks = store.block_count()?;
    if total_blocks == 0 {
        return Ok(Vec::new());
    }

    let query_vector = embedder.embed(query)?;

    // Stage 1: coarse block search.
    let k_blocks = params.top_k_blocks.min(total_blocks);
    let block_ids = store.search_blocks(&query_vector, k_blocks)?;

    // Stage 2: chunk search within the shortlisted blocks. Hits past
    // the score threshold are discarded before merging.
    let mut candidates: Vec<Candidate> = Vec::new();
    for block_id in block_ids.iter() {
        let hits = store.search_chunks(block_id, &query_vector, params.top_k_chunks)?;
        for (chunk, distance) in hits {
            if distance > params.score_threshold {
                continue;
            }
            candidates.push(Candidate {
                text: chunk.text,
                page: chunk.page,
                score: distance,
                document_name: chunk.source,
            });
        }
    }

    candidates.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Adaptive margin: keep only results close to the best match, so a
    // single truly relevant passage is not padded with filler hits.
    let mut results: Vec<Candidate> = Vec::new();
    if let Some(best) = candidates.first().map(|c| c.score) {
        for c in candidates {
            if c.score <= best * params.score_margin {
                results.push(c);
            } else {
                // Sorted ascending, so nothing later can pass.
                break;
            }
        }
    }

    results.truncate(params.top_k_chunks);
    Ok(results)
}
