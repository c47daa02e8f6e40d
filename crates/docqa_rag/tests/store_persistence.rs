use std::fs;

use docqa_core::config::PartitionParams;
use docqa_core::error::AppError;
use docqa_rag::embeddings::Embedder;
use docqa_rag::model::{BlockMeta, ChunkRecord};
use docqa_rag::partition::{add_document, IngestChunk};
use docqa_rag::store::VectorStore;
use pretty_assertions::assert_eq;

/// Chunk text literally encodes its embedding vector, e.g. "0.7,0.1".
struct VecEmbedder;

impl Embedder for VecEmbedder {
    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        Ok(input
            .split(',')
            .map(|p| p.trim().parse::<f32>().unwrap_or(0.0))
            .collect())
    }
}

fn ingest_two_blocks(store: &VectorStore) {
    let chunks = vec![
        IngestChunk {
            text: "0.1,0.0".to_string(),
            page: 1,
        },
        IngestChunk {
            text: "0.2,0.0".to_string(),
            page: 2,
        },
        IngestChunk {
            text: "0.0,0.9".to_string(),
            page: 25,
        },
    ];
    add_document(
        store,
        &VecEmbedder,
        "doc1",
        "doc.pdf",
        chunks,
        &PartitionParams::default(),
    )
    .expect("add_document");
}

#[test]
fn persisted_store_reloads_identically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = VectorStore::open(dir.path().to_path_buf(), 2);
    ingest_two_blocks(&store);

    // Per-corpus layout: global artifacts plus one index + meta pair
    // per block, named by block_id.
    assert!(dir.path().join("block_index.json").exists());
    assert!(dir.path().join("block_metadata.json").exists());
    assert!(dir.path().join("indexes/doc1_block_0.json").exists());
    assert!(dir.path().join("indexes/doc1_block_0_meta.json").exists());
    assert!(dir.path().join("indexes/doc1_block_1.json").exists());
    assert!(dir.path().join("indexes/doc1_block_1_meta.json").exists());

    let reloaded = VectorStore::open(dir.path().to_path_buf(), 2);
    reloaded.load().expect("load");

    assert_eq!(reloaded.block_count().expect("count"), 2);
    assert_eq!(
        reloaded.block_metas().expect("metas"),
        store.block_metas().expect("metas")
    );
    assert_eq!(reloaded.chunk_count("doc1_block_0").expect("cc"), Some(2));
    assert_eq!(reloaded.chunk_count("doc1_block_1").expect("cc"), Some(1));

    // The reloaded fine indexes answer searches.
    let hits = reloaded
        .search_chunks("doc1_block_0", &[0.1, 0.0], 5)
        .expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].0.text, "0.1,0.0");
    assert_eq!(hits[0].1, 0.0);
}

#[test]
fn missing_block_artifacts_leave_block_unsearchable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = VectorStore::open(dir.path().to_path_buf(), 2);
    ingest_two_blocks(&store);

    fs::remove_file(dir.path().join("indexes/doc1_block_1.json")).expect("remove");

    let reloaded = VectorStore::open(dir.path().to_path_buf(), 2);
    reloaded.load().expect("load");

    // Still routed by the coarse index, but its fine index is gone.
    assert_eq!(reloaded.block_count().expect("count"), 2);
    assert_eq!(reloaded.chunk_count("doc1_block_1").expect("cc"), None);
    let hits = reloaded
        .search_chunks("doc1_block_1", &[0.0, 0.9], 5)
        .expect("search");
    assert!(hits.is_empty());

    // The intact block is unaffected.
    assert_eq!(reloaded.chunk_count("doc1_block_0").expect("cc"), Some(2));
}

#[test]
fn diverged_artifacts_are_rejected_at_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = VectorStore::open(dir.path().to_path_buf(), 2);
    ingest_two_blocks(&store);

    // Truncate the metadata sequence so it no longer matches the index.
    let metas: Vec<BlockMeta> =
        serde_json::from_slice(&fs::read(dir.path().join("block_metadata.json")).expect("read"))
            .expect("decode");
    fs::write(
        dir.path().join("block_metadata.json"),
        serde_json::to_string_pretty(&metas[..1]).expect("encode"),
    )
    .expect("write");

    let reloaded = VectorStore::open(dir.path().to_path_buf(), 2);
    let err = reloaded.load().expect_err("load must fail");
    assert_eq!(err.code, "RAG_INDEX_CORRUPT");
}

#[test]
fn dimension_mismatch_is_fatal_and_leaves_store_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = VectorStore::open(dir.path().to_path_buf(), 2);

    let err = store
        .append_block(
            "doc1_block_0",
            vec![0.1, 0.2, 0.3],
            BlockMeta {
                block_id: "doc1_block_0".to_string(),
                doc_id: "doc1".to_string(),
                name: "doc.pdf".to_string(),
                page_range: "1-20".to_string(),
                chunk_count: 1,
            },
            vec![vec![0.1, 0.2, 0.3]],
            vec![ChunkRecord {
                text: "x".to_string(),
                page: 1,
                source: "doc.pdf".to_string(),
            }],
        )
        .expect_err("append must fail");
    assert_eq!(err.code, "RAG_DIMENSION_MISMATCH");
    assert_eq!(store.block_count().expect("count"), 0);
}

#[test]
fn duplicate_block_id_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = VectorStore::open(dir.path().to_path_buf(), 2);
    ingest_two_blocks(&store);

    let err = store
        .append_block(
            "doc1_block_0",
            vec![0.0, 0.0],
            BlockMeta {
                block_id: "doc1_block_0".to_string(),
                doc_id: "doc1".to_string(),
                name: "doc.pdf".to_string(),
                page_range: "1-20".to_string(),
                chunk_count: 0,
            },
            Vec::new(),
            Vec::new(),
        )
        .expect_err("append must fail");
    assert_eq!(err.code, "RAG_DUPLICATE_BLOCK");
}
