//! Free-text contributions to a deliberation session.

pub mod entities;

pub use entities::{ConversationId, Embedding, Response, ResponseId};
