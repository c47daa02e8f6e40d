use docqa_core::config::{GenerationParams, RetrievalParams};
use docqa_core::error::AppError;
use tracing::{info, warn};

use crate::embeddings::Embedder;
use crate::llm::{GenerateOptions, Llm};
use crate::model::{
    is_refusal_text, AnswerResponse, Candidate, Citation, StreamEvent, MODEL_NOT_LOADED_NOTICE,
};
use crate::retrieve;
use crate::store::VectorStore;

pub mod prompts;

/// Turns filtered retrieval candidates into a grounded answer or a
/// refusal. The language model is optional: without one, generation
/// degrades to a fixed notice while retrieval keeps working.
pub struct AnswerEngine<'a> {
    store: &'a VectorStore,
    embedder: &'a dyn Embedder,
    llm: Option<&'a dyn Llm>,
    params: GenerationParams,
}

impl<'a> AnswerEngine<'a> {
    pub fn new(
        store: &'a VectorStore,
        embedder: &'a dyn Embedder,
        llm: Option<&'a dyn Llm>,
        params: GenerationParams,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            params,
        }
    }

    fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            max_tokens: self.params.max_tokens,
            stop_sequences: self.params.stop_sequences.clone(),
        }
    }

    fn build_prompt(&self, candidates: &[Candidate], query: &str) -> String {
        let context = prompts::context_block(candidates);
        prompts::grounded_answer_prompt(&self.params.system_instruction, &context, query)
    }

    /// Complete-response mode: one blocking generation, then the
    /// post-hoc refusal check on the model's output.
    pub fn answer(&self, query: &str) -> Result<AnswerResponse, AppError> {
        let candidates =
            retrieve::search(self.store, self.embedder, query, &self.params.retrieval)?;

        if candidates.is_empty() {
            info!(query, "refusal: no candidates passed the score filters");
            return Ok(AnswerResponse::refusal());
        }

        let answer = match self.llm {
            Some(llm) => {
                let prompt = self.build_prompt(&candidates, query);
                llm.generate(&prompt, &self.generate_options())?
            }
            None => {
                warn!("language model not loaded; returning notice with retrieved context");
                MODEL_NOT_LOADED_NOTICE.to_string()
            }
        };

        // Safety net: a model refusing in its own words still yields
        // the canonical refusal with no citations.
        if is_refusal_text(&answer) {
            return Ok(AnswerResponse::refusal());
        }

        let citations = candidates.iter().map(Citation::from_candidate).collect();
        Ok(AnswerResponse { answer, citations })
    }

    /// Streaming mode: a citations event first, then one event per
    /// generated fragment. Retrieval uses the smaller streaming
    /// `top_k_chunks` to keep the prompt short. The sink returning
    /// `false` cancels the stream promptly.
    ///
    /// Tokens already emitted cannot be retracted, so the post-hoc
    /// refusal check runs on the accumulated text after the final
    /// token and emits a terminal `Refusal` event for the presentation
    /// layer to replace what it rendered.
    pub fn answer_stream(
        &self,
        query: &str,
        sink: &mut dyn FnMut(StreamEvent) -> bool,
    ) -> Result<(), AppError> {
        let params = RetrievalParams {
            top_k_chunks: self.params.stream_top_k_chunks,
            ..self.params.retrieval.clone()
        };
        let candidates = retrieve::search(self.store, self.embedder, query, &params)?;

        if candidates.is_empty() {
            info!(query, "refusal: no candidates passed the score filters");
            sink(StreamEvent::Refusal(AnswerResponse::refusal()));
            return Ok(());
        }

        let citations: Vec<Citation> = candidates.iter().map(Citation::from_candidate).collect();
        if !sink(StreamEvent::Citations(citations)) {
            return Ok(());
        }

        let llm = match self.llm {
            Some(llm) => llm,
            None => {
                warn!("language model not loaded; streaming notice token");
                sink(StreamEvent::Token(MODEL_NOT_LOADED_NOTICE.to_string()));
                return Ok(());
            }
        };

        let prompt = self.build_prompt(&candidates, query);
        let mut accumulated = String::new();
        let mut cancelled = false;
        llm.generate_stream(&prompt, &self.generate_options(), &mut |token| {
            accumulated.push_str(token);
            if sink(StreamEvent::Token(token.to_string())) {
                true
            } else {
                cancelled = true;
                false
            }
        })?;

        if !cancelled && is_refusal_text(&accumulated) {
            sink(StreamEvent::Refusal(AnswerResponse::refusal()));
        }
        Ok(())
    }
}
