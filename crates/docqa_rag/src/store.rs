use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use docqa_core::error::AppError;
use tracing::warn;

use crate::model::{BlockMeta, ChunkRecord};
use crate::retrieve::similarity;

/// Local index over one block's chunks. Vectors and metadata are
/// aligned positionally.
#[derive(Debug, Clone, Default)]
struct ChunkIndex {
    vectors: Vec<Vec<f32>>,
    meta: Vec<ChunkRecord>,
}

#[derive(Debug, Default)]
struct StoreState {
    /// Global coarse index: one representative vector per block.
    block_vectors: Vec<Vec<f32>>,
    /// Aligned positionally with `block_vectors`.
    block_meta: Vec<BlockMeta>,
    /// Loaded local indexes, keyed by block_id. A block present in
    /// `block_meta` but absent here is unsearchable.
    chunk_indexes: BTreeMap<String, ChunkIndex>,
}

/// Durable two-level store: a global block index plus per-block chunk
/// indexes, with aligned metadata. Sole owner of the in-memory state;
/// readers share the lock, mutation is single-writer.
#[derive(Debug)]
pub struct VectorStore {
    root: PathBuf,
    dimension: usize,
    state: RwLock<StoreState>,
}

impl VectorStore {
    pub fn open(root: PathBuf, dimension: usize) -> Self {
        Self {
            root,
            dimension,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn block_index_path(&self) -> PathBuf {
        self.root.join("block_index.json")
    }

    fn block_metadata_path(&self) -> PathBuf {
        self.root.join("block_metadata.json")
    }

    fn indexes_dir(&self) -> PathBuf {
        self.root.join("indexes")
    }

    fn chunk_index_path(&self, block_id: &str) -> PathBuf {
        self.indexes_dir().join(format!("{block_id}.json"))
    }

    fn chunk_meta_path(&self, block_id: &str) -> PathBuf {
        self.indexes_dir().join(format!("{block_id}_meta.json"))
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.indexes_dir()).map_err(|e| {
            AppError::new("RAG_STORE_FAILED", "Failed to create index directories")
                .with_details(format!("path={}; err={}", self.indexes_dir().display(), e))
        })
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>, AppError> {
        self.state
            .read()
            .map_err(|_| AppError::new("RAG_STORE_FAILED", "Store lock poisoned"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>, AppError> {
        self.state
            .write()
            .map_err(|_| AppError::new("RAG_STORE_FAILED", "Store lock poisoned"))
    }

    /// Read the persisted indexes into memory. Absent global artifacts
    /// initialize an empty store; a block whose local artifacts are
    /// missing stays in the coarse index but is unsearchable.
    pub fn load(&self) -> Result<(), AppError> {
        self.ensure_dirs()?;

        let mut next = StoreState::default();

        let index_path = self.block_index_path();
        let meta_path = self.block_metadata_path();
        if index_path.exists() && meta_path.exists() {
            next.block_vectors = read_json(&index_path, "global block index")?;
            next.block_meta = read_json(&meta_path, "block metadata")?;

            if next.block_vectors.len() != next.block_meta.len() {
                return Err(AppError::new(
                    "RAG_INDEX_CORRUPT",
                    "Global index and block metadata lengths diverge",
                )
                .with_details(format!(
                    "vectors={}; meta={}",
                    next.block_vectors.len(),
                    next.block_meta.len()
                )));
            }
            for v in next.block_vectors.iter() {
                self.check_dimension(v)?;
            }

            for meta in next.block_meta.iter() {
                match self.load_chunk_index(&meta.block_id)? {
                    Some(idx) => {
                        next.chunk_indexes.insert(meta.block_id.clone(), idx);
                    }
                    None => {
                        warn!(
                            block_id = meta.block_id.as_str(),
                            "chunk index artifacts missing; block is unsearchable"
                        );
                    }
                }
            }
        }

        *self.write_state()? = next;
        Ok(())
    }

    fn load_chunk_index(&self, block_id: &str) -> Result<Option<ChunkIndex>, AppError> {
        let index_path = self.chunk_index_path(block_id);
        let meta_path = self.chunk_meta_path(block_id);
        if !index_path.exists() || !meta_path.exists() {
            return Ok(None);
        }

        let vectors: Vec<Vec<f32>> = read_json(&index_path, "chunk index")?;
        let meta: Vec<ChunkRecord> = read_json(&meta_path, "chunk metadata")?;
        if vectors.len() != meta.len() {
            return Err(AppError::new(
                "RAG_INDEX_CORRUPT",
                "Chunk index and chunk metadata lengths diverge",
            )
            .with_details(format!(
                "block_id={}; vectors={}; meta={}",
                block_id,
                vectors.len(),
                meta.len()
            )));
        }
        for v in vectors.iter() {
            self.check_dimension(v)?;
        }
        Ok(Some(ChunkIndex { vectors, meta }))
    }

    /// Write every artifact to disk, each via tmp-then-rename so a
    /// crash mid-persist never leaves an index and its metadata
    /// mutually inconsistent.
    pub fn persist(&self) -> Result<(), AppError> {
        self.ensure_dirs()?;
        let state = self.read_state()?;
        check_aligned(&state)?;

        write_json_atomic(&self.block_index_path(), &state.block_vectors, "global block index")?;
        write_json_atomic(&self.block_metadata_path(), &state.block_meta, "block metadata")?;

        for (block_id, idx) in state.chunk_indexes.iter() {
            write_json_atomic(&self.chunk_index_path(block_id), &idx.vectors, "chunk index")?;
            write_json_atomic(&self.chunk_meta_path(block_id), &idx.meta, "chunk metadata")?;
        }
        Ok(())
    }

    /// Insert one block: its representative vector and metadata into
    /// the global index, and a fresh local index over its chunks.
    /// In-memory only; callers persist once per ingested document.
    pub fn append_block(
        &self,
        block_id: &str,
        representative: Vec<f32>,
        block_meta: BlockMeta,
        chunk_vectors: Vec<Vec<f32>>,
        chunk_meta: Vec<ChunkRecord>,
    ) -> Result<(), AppError> {
        self.check_dimension(&representative)?;
        for v in chunk_vectors.iter() {
            self.check_dimension(v)?;
        }
        if chunk_vectors.len() != chunk_meta.len() {
            return Err(AppError::new(
                "RAG_INDEX_CORRUPT",
                "Chunk vectors and chunk metadata lengths differ",
            )
            .with_details(format!(
                "block_id={}; vectors={}; meta={}",
                block_id,
                chunk_vectors.len(),
                chunk_meta.len()
            )));
        }

        let mut state = self.write_state()?;
        // Refuse to extend an index that has already diverged.
        check_aligned(&state)?;
        if state.chunk_indexes.contains_key(block_id)
            || state.block_meta.iter().any(|m| m.block_id == block_id)
        {
            return Err(AppError::new(
                "RAG_DUPLICATE_BLOCK",
                "Block id already present in the store",
            )
            .with_details(format!("block_id={block_id}")));
        }

        state.block_vectors.push(representative);
        state.block_meta.push(block_meta);
        state.chunk_indexes.insert(
            block_id.to_string(),
            ChunkIndex {
                vectors: chunk_vectors,
                meta: chunk_meta,
            },
        );
        Ok(())
    }

    /// Number of vectors in the global block index.
    pub fn block_count(&self) -> Result<usize, AppError> {
        Ok(self.read_state()?.block_vectors.len())
    }

    pub fn block_metas(&self) -> Result<Vec<BlockMeta>, AppError> {
        Ok(self.read_state()?.block_meta.clone())
    }

    /// Chunk count of a block's loaded local index, if searchable.
    pub fn chunk_count(&self, block_id: &str) -> Result<Option<usize>, AppError> {
        Ok(self
            .read_state()?
            .chunk_indexes
            .get(block_id)
            .map(|idx| idx.vectors.len()))
    }

    /// Coarse stage: ids of the up-to-`k` nearest blocks by squared L2
    /// distance over the global index.
    pub fn search_blocks(&self, query: &[f32], k: usize) -> Result<Vec<String>, AppError> {
        self.check_dimension(query)?;
        let state = self.read_state()?;
        let hits = similarity::nearest(&state.block_vectors, query, k);
        Ok(hits
            .into_iter()
            .map(|(i, _)| state.block_meta[i].block_id.clone())
            .collect())
    }

    /// Fine stage: up-to-`k` nearest chunks within one block. A block
    /// whose local index never loaded yields no hits.
    pub fn search_chunks(
        &self,
        block_id: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, AppError> {
        self.check_dimension(query)?;
        let state = self.read_state()?;
        let idx = match state.chunk_indexes.get(block_id) {
            Some(idx) => idx,
            None => return Ok(Vec::new()),
        };
        let hits = similarity::nearest(&idx.vectors, query, k);
        Ok(hits
            .into_iter()
            .map(|(i, dist)| (idx.meta[i].clone(), dist))
            .collect())
    }

    fn check_dimension(&self, v: &[f32]) -> Result<(), AppError> {
        if v.len() != self.dimension {
            return Err(AppError::new(
                "RAG_DIMENSION_MISMATCH",
                "Vector dimension does not match the store",
            )
            .with_details(format!("expected={}; got={}", self.dimension, v.len())));
        }
        Ok(())
    }
}

fn check_aligned(state: &StoreState) -> Result<(), AppError> {
    if state.block_vectors.len() != state.block_meta.len() {
        return Err(AppError::new(
            "RAG_INDEX_CORRUPT",
            "Global index and block metadata lengths diverge",
        )
        .with_details(format!(
            "vectors={}; meta={}",
            state.block_vectors.len(),
            state.block_meta.len()
        )));
    }
    for (block_id, idx) in state.chunk_indexes.iter() {
        if idx.vectors.len() != idx.meta.len() {
            return Err(AppError::new(
                "RAG_INDEX_CORRUPT",
                "Chunk index and chunk metadata lengths diverge",
            )
            .with_details(format!(
                "block_id={}; vectors={}; meta={}",
                block_id,
                idx.vectors.len(),
                idx.meta.len()
            )));
        }
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("RAG_STORE_FAILED", format!("Failed to read {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("RAG_STORE_FAILED", format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
    what: &str,
) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("RAG_STORE_FAILED", format!("Failed to encode {what}"))
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("RAG_STORE_FAILED", format!("Failed to write {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("RAG_STORE_FAILED", format!("Failed to finalize {what} write"))
            .with_details(format!(
                "tmp={}; dest={}; err={}",
                tmp.display(),
                path.display(),
                e
            ))
    })?;
    Ok(())
}
