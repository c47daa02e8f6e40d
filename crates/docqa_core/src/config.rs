use serde::{Deserialize, Serialize};

/// Tunables for the coarse-to-fine search. Scores are squared L2
/// distances, lower is better.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalParams {
    /// Blocks to shortlist in the coarse stage.
    pub top_k_blocks: usize,
    /// Chunks per block in the fine stage, and the final result cap.
    pub top_k_chunks: usize,
    /// Hits with a distance above this are discarded outright.
    /// The 1.35 default approximates a cosine-similarity cutoff around
    /// 0.32 for normalized embeddings.
    pub score_threshold: f32,
    /// Keep candidates while `score <= best * score_margin`.
    pub score_margin: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k_blocks: 3,
            top_k_chunks: 5,
            score_threshold: 1.35,
            score_margin: 1.1,
        }
    }
}

/// Tunables for document ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionParams {
    /// Pages covered by one block. Block `i` covers pages
    /// `[i*B+1, (i+1)*B]`.
    pub block_size_pages: u32,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self {
            block_size_pages: 20,
        }
    }
}

/// The grounding instruction is a versioned contract the language model
/// is conditioned on; it lives here so prompt iteration never touches
/// orchestration logic.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r#"You are a precise and honest assistant. Your task is to answer the user's question using ONLY the provided context.
Instructions:
1. The User Question may contain typos. Match distinct words in the context (e.g. "Marigin" matches "Margin").
2. Answer the question using ONLY the provided context.
3. If the context does not contain the answer, output the exact phrase: "The requested information is not available in the uploaded documents."
4. CRITICAL: Do NOT use outside knowledge. Do NOT explain concepts (like "Softmax") not found in the context."#;

/// Tunables for grounded answer generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
    pub system_instruction: String,
    /// Retrieval settings for complete-response mode.
    pub retrieval: RetrievalParams,
    /// Streaming trades context breadth for prompt length; fewer chunks
    /// keep first-token latency down.
    pub stream_top_k_chunks: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: "phi3".to_string(),
            max_tokens: 512,
            stop_sequences: vec!["User Question:".to_string(), "\n\n".to_string()],
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            retrieval: RetrievalParams::default(),
            stream_top_k_chunks: 3,
        }
    }
}
