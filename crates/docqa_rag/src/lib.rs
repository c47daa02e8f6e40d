pub mod answer;
pub mod embeddings;
pub mod llm;
pub mod model;
pub mod ollama;
pub mod partition;
pub mod retrieve;
pub mod store;
