//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`]: the language model used for consolidation
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod model;
