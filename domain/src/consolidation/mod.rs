//! Consolidation of a cluster's responses into semantic buckets.
//!
//! The model call itself lives in the application layer; this module holds
//! the value objects, the payload parser and the validation that turns an
//! untrusted model answer into a result that accounts for every input id.

pub mod entities;
pub mod parsing;
pub mod validation;

pub use entities::{ConsolidationResult, SemanticBucket};
pub use parsing::{
    ConsolidationParseError, RawBucket, RawConsolidation, parse_consolidation_json,
    parse_consolidation_response,
};
pub use validation::{ValidationReport, reconcile};

use crate::response::Response;

/// Split a cluster into consecutive batches of at most `max_per_call`.
pub fn batches(responses: &[Response], max_per_call: usize) -> impl Iterator<Item = &[Response]> {
    responses.chunks(max_per_call.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_cover_every_response() {
        let responses: Vec<Response> = (0..7)
            .map(|i| Response::new(format!("r{}", i), "text"))
            .collect();

        let sizes: Vec<usize> = batches(&responses, 3).map(<[Response]>::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_zero_cap_is_treated_as_one() {
        let responses = vec![Response::new("a", "x"), Response::new("b", "y")];
        assert_eq!(batches(&responses, 0).count(), 2);
    }
}
