use crate::model::Candidate;

/// Labeled context block per retrieved passage. The labels are part of
/// the grounding contract; the model cites documents by these names.
pub fn context_block(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(|c| {
            format!(
                "Document: {} (Page {})\nContent: {}",
                c.document_name, c.page, c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// ChatML-wrapped grounded prompt. The system instruction is supplied
/// by configuration; the wrapper and the Context/User Question layout
/// are a stable contract the model is conditioned on.
pub fn grounded_answer_prompt(system_instruction: &str, context: &str, query: &str) -> String {
    let user_content = format!("Context:\n{context}\n\nUser Question: {query}");
    format!("<|user|>\n{system_instruction}\n\n{user_content}<|end|>\n<|assistant|>")
}
