//! Service layer: external generation calls

pub mod llm;

pub use llm::{Generator, LlmClient};
