use docqa_core::config::PartitionParams;
use docqa_core::error::AppError;
use tracing::info;

use crate::embeddings::Embedder;
use crate::model::{BlockMeta, ChunkRecord};
use crate::store::VectorStore;

/// A passage as produced by document parsing, before it is bound to a
/// block.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestChunk {
    pub text: String,
    /// 1-based page number.
    pub page: u32,
}

/// Deterministic grouping of chunks into page-range blocks: chunks are
/// ordered by page and block `i` holds pages `[i*B+1, (i+1)*B]`.
/// Returns `(block_index, chunks)` pairs in ascending block order.
pub fn partition_pages(
    mut chunks: Vec<IngestChunk>,
    block_size_pages: u32,
) -> Vec<(u32, Vec<IngestChunk>)> {
    chunks.sort_by_key(|c| c.page);

    let mut blocks: Vec<(u32, Vec<IngestChunk>)> = Vec::new();
    for chunk in chunks {
        let block_idx = (chunk.page.max(1) - 1) / block_size_pages;
        match blocks.last_mut() {
            Some((idx, group)) if *idx == block_idx => group.push(chunk),
            _ => blocks.push((block_idx, vec![chunk])),
        }
    }
    blocks
}

/// Nominal inclusive page range for a block. The upper bound is the
/// block's page ceiling, not the max page actually present.
pub fn page_range(block_index: u32, block_size_pages: u32) -> String {
    let start = block_index * block_size_pages + 1;
    let end = (block_index + 1) * block_size_pages;
    format!("{start}-{end}")
}

/// Ingest one document: group its chunks into blocks, embed each
/// block's chunks as a batch, mean-pool the representative vector, and
/// append every block to the store. Persists once at the end of the
/// document. A document with zero chunks is a no-op.
pub fn add_document(
    store: &VectorStore,
    embedder: &dyn Embedder,
    doc_id: &str,
    doc_name: &str,
    chunks: Vec<IngestChunk>,
    params: &PartitionParams,
) -> Result<(), AppError> {
    if chunks.is_empty() {
        return Ok(());
    }

    for (block_idx, group) in partition_pages(chunks, params.block_size_pages) {
        let block_id = format!("{doc_id}_block_{block_idx}");
        let range = page_range(block_idx, params.block_size_pages);

        let texts: Vec<String> = group.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts)?;
        let representative = mean_vector(&embeddings)?;

        let chunk_meta: Vec<ChunkRecord> = group
            .iter()
            .map(|c| ChunkRecord {
                text: c.text.clone(),
                page: c.page,
                source: doc_name.to_string(),
            })
            .collect();
        let block_meta = BlockMeta {
            block_id: block_id.clone(),
            doc_id: doc_id.to_string(),
            name: doc_name.to_string(),
            page_range: range.clone(),
            chunk_count: group.len() as u32,
        };

        store.append_block(&block_id, representative, block_meta, embeddings, chunk_meta)?;
        info!(
            doc = doc_name,
            block = block_idx,
            pages = range.as_str(),
            "indexed block"
        );
    }

    store.persist()
}

/// Element-wise mean of a non-empty batch of equal-length vectors.
fn mean_vector(vectors: &[Vec<f32>]) -> Result<Vec<f32>, AppError> {
    let first = vectors.first().ok_or_else(|| {
        AppError::new("RAG_EMBEDDINGS_FAILED", "Cannot pool an empty embedding batch")
    })?;
    let mut mean = vec![0.0f32; first.len()];
    for v in vectors {
        if v.len() != first.len() {
            return Err(AppError::new(
                "RAG_DIMENSION_MISMATCH",
                "Embedding batch has inconsistent dimensions",
            )
            .with_details(format!("expected={}; got={}", first.len(), v.len())));
        }
        for (m, x) in mean.iter_mut().zip(v.iter()) {
            *m += x;
        }
    }
    let n = vectors.len() as f32;
    for m in mean.iter_mut() {
        *m /= n;
    }
    Ok(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(page: u32) -> IngestChunk {
        IngestChunk {
            text: format!("page {page}"),
            page,
        }
    }

    #[test]
    fn partitions_by_twenty_page_blocks() {
        let chunks = vec![chunk(41), chunk(1), chunk(20), chunk(21)];
        let blocks = partition_pages(chunks, 20);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].0, 0);
        assert_eq!(blocks[0].1.len(), 2);
        assert_eq!(blocks[1].0, 1);
        assert_eq!(blocks[2].0, 2);
    }

    #[test]
    fn page_range_is_nominal_ceiling() {
        assert_eq!(page_range(0, 20), "1-20");
        assert_eq!(page_range(1, 20), "21-40");
        assert_eq!(page_range(2, 20), "41-60");
    }

    #[test]
    fn mean_vector_pools_elementwise() {
        let mean = mean_vector(&[vec![1.0, 3.0], vec![3.0, 5.0]]).expect("mean");
        assert_eq!(mean, vec![2.0, 4.0]);
    }
}
