use docqa_core::error::AppError;

/// Black-box text embedding: text in, fixed-dimension vector out. The
/// dimension must match the store the vectors are destined for.
pub trait Embedder {
    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError>;

    /// Embed a batch, preserving order. The default loops `embed`;
    /// implementations with a true batch endpoint should override.
    fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            out.push(self.embed(input)?);
        }
        Ok(out)
    }
}

pub mod ollama_embed;
