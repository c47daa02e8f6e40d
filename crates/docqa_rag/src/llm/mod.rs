use docqa_core::error::AppError;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
}

/// Black-box language model: prompt in, text out. Implementations must
/// honor the stop sequences and the generation cap.
pub trait Llm {
    fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, AppError>;

    /// Streaming variant: `on_token` receives fragments in generation
    /// order. Returning `false` cancels the stream promptly; the
    /// implementation must stop its token loop and release resources.
    fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        on_token: &mut dyn FnMut(&str) -> bool,
    ) -> Result<(), AppError>;
}

pub mod ollama_llm;
