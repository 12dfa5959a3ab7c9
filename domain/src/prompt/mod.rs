//! Prompt domain
//!
//! Templates for the consolidation call.

mod template;

pub use template::PromptTemplate;
