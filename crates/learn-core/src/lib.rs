//! Curriculum generation: LLM adapters, the outline, detail and translation
//! pipelines, the lazy-load queue, visual rendering and export.

pub mod chapter;
pub mod error;
pub mod export;
pub mod llm;
pub mod parse;
pub mod plan;
pub mod queue;
pub mod translate;
pub mod visual;

#[cfg(test)]
mod testing;

pub use error::GenerationError;
