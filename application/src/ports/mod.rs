//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod embedding;
pub mod event_logger;
pub mod llm_gateway;
pub mod progress;
pub mod repository;
