pub mod llm;
pub mod patterns;
