use serde::{Deserialize, Serialize};

/// Canonical refusal, returned whenever no sufficiently relevant
/// passage exists or the model reports it cannot answer.
pub const REFUSAL_ANSWER: &str =
    "The requested information is not available in the uploaded documents.";

/// Markers a model may emit when it refuses in its own words; matching
/// either (case-insensitive) triggers the canonical-refusal override.
pub const REFUSAL_MARKERS: [&str; 2] = ["information is not available", "context does not contain"];

/// Notice returned in place of an answer when no language model is
/// loaded. Retrieval still runs; only generation degrades.
pub const MODEL_NOT_LOADED_NOTICE: &str =
    "System notice: language model not loaded. Displaying retrieved context only.";

const SNIPPET_MAX_CHARS: usize = 150;

/// One passage of a document as handed to ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub text: String,
    /// 1-based page number.
    pub page: u32,
    /// Name of the owning document.
    pub source: String,
}

/// Block-level metadata, aligned positionally with the global index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockMeta {
    pub block_id: String,
    pub doc_id: String,
    pub name: String,
    /// Inclusive nominal range `"start-end"`; the end is the block's
    /// page ceiling, not the max page actually present.
    pub page_range: String,
    pub chunk_count: u32,
}

/// An ephemeral retrieval hit. Score is a squared L2 distance, lower
/// is better. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub page: u32,
    pub score: f32,
    pub document_name: String,
}

/// A candidate projected for presentation alongside an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub document_name: String,
    pub page_number: u32,
    pub text_snippet: String,
    pub score: f32,
}

impl Citation {
    pub fn from_candidate(c: &Candidate) -> Self {
        Self {
            document_name: c.document_name.clone(),
            page_number: c.page,
            text_snippet: snippet_first_chars(&c.text, SNIPPET_MAX_CHARS),
            score: c.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
}

impl AnswerResponse {
    pub fn refusal() -> Self {
        Self {
            answer: REFUSAL_ANSWER.to_string(),
            citations: Vec::new(),
        }
    }
}

/// Ordered streaming wire contract: `Citations` first, then one
/// `Token` per generated fragment. `Refusal` is terminal and replaces
/// the normal sequence (empty corpus) or anything already rendered
/// (post-hoc override after the final token).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "event", content = "data")]
pub enum StreamEvent {
    Citations(Vec<Citation>),
    Token(String),
    Refusal(AnswerResponse),
}

/// True when the model's output textually self-reports inability to
/// answer, in language other than the canonical phrase.
pub fn is_refusal_text(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    REFUSAL_MARKERS.iter().any(|m| lower.contains(m))
}

pub(crate) fn snippet_first_chars(text: &str, max_chars: usize) -> String {
    let t = text.trim();
    match t.char_indices().nth(max_chars) {
        None => t.to_string(),
        Some((byte_idx, _)) => {
            let mut s = t[..byte_idx].to_string();
            s.push_str("...");
            s
        }
    }
}
