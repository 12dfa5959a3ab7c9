//! Parsing of the language model's consolidation payload.
//!
//! Pure domain logic: no I/O, just turning model text into a structure.
//! Ids are kept as raw strings here; nothing is trusted until
//! [`super::validation::reconcile`] has checked them against the input.
//!
//! Expected payload:
//!
//! ```json
//! {
//!   "buckets": [
//!     {
//!       "bucket_name": "string",
//!       "consolidated_statement": "string",
//!       "response_ids": ["id", ...]
//!     }
//!   ],
//!   "unconsolidated_ids": ["id", ...]
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsolidationParseError {
    #[error("No JSON object found in model output")]
    NoJson,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing or malformed field: {0}")]
    MissingField(&'static str),
}

/// A bucket exactly as the model described it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawBucket {
    pub bucket_name: String,
    pub consolidated_statement: String,
    pub response_ids: Vec<String>,
}

/// Model output before validation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawConsolidation {
    pub buckets: Vec<RawBucket>,
    pub unconsolidated_ids: Vec<String>,
}

/// Parse consolidation output from model text.
///
/// Accepts, in order:
/// 1. The whole response as JSON
/// 2. A fenced ```` ```json ```` block
/// 3. The span from the first `{` to the last `}`
pub fn parse_consolidation_response(
    response: &str,
) -> Result<RawConsolidation, ConsolidationParseError> {
    let value = extract_json(response)?;
    parse_consolidation_json(&value)
}

/// Parse consolidation output from an already-decoded JSON value.
pub fn parse_consolidation_json(
    json: &serde_json::Value,
) -> Result<RawConsolidation, ConsolidationParseError> {
    let buckets = json
        .get("buckets")
        .and_then(|v| v.as_array())
        .ok_or(ConsolidationParseError::MissingField("buckets"))?;

    let buckets = buckets
        .iter()
        .map(|bucket| {
            if !bucket.is_object() {
                return Err(ConsolidationParseError::MissingField("buckets[]"));
            }
            Ok(RawBucket {
                bucket_name: bucket
                    .get("bucket_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                consolidated_statement: bucket
                    .get("consolidated_statement")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                response_ids: id_list(bucket.get("response_ids")),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawConsolidation {
        buckets,
        unconsolidated_ids: id_list(json.get("unconsolidated_ids")),
    })
}

fn extract_json(response: &str) -> Result<serde_json::Value, ConsolidationParseError> {
    let trimmed = response.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return Ok(value);
    }

    if let Some(block) = fenced_block(trimmed)
        && let Ok(value) = serde_json::from_str::<serde_json::Value>(&block)
    {
        return Ok(value);
    }

    let start = trimmed.find('{').ok_or(ConsolidationParseError::NoJson)?;
    let end = trimmed.rfind('}').ok_or(ConsolidationParseError::NoJson)?;
    if end < start {
        return Err(ConsolidationParseError::NoJson);
    }
    serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| ConsolidationParseError::InvalidJson(e.to_string()))
}

fn fenced_block(response: &str) -> Option<String> {
    let mut in_block = false;
    let mut block = String::new();

    for line in response.lines() {
        let line_trimmed = line.trim();
        if !in_block && (line_trimmed == "```json" || line_trimmed == "```") {
            in_block = true;
            block.clear();
        } else if in_block && line_trimmed == "```" {
            return Some(block);
        } else if in_block {
            block.push_str(line);
            block.push('\n');
        }
    }
    None
}

/// Ids may come back as strings or numbers; anything else is dropped.
fn id_list(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|ids| ids.iter().filter_map(json_value_to_id).collect())
        .unwrap_or_default()
}

fn json_value_to_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let text = r#"{
            "buckets": [
                {"bucket_name": "Transit", "consolidated_statement": "Run buses more often.", "response_ids": ["r1", "r2"]}
            ],
            "unconsolidated_ids": ["r3"]
        }"#;

        let parsed = parse_consolidation_response(text).unwrap();
        assert_eq!(parsed.buckets.len(), 1);
        assert_eq!(parsed.buckets[0].bucket_name, "Transit");
        assert_eq!(parsed.buckets[0].response_ids, vec!["r1", "r2"]);
        assert_eq!(parsed.unconsolidated_ids, vec!["r3"]);
    }

    #[test]
    fn test_parse_fenced_block() {
        let text = "Here you go:\n```json\n{\"buckets\": [], \"unconsolidated_ids\": [\"a\"]}\n```\nThanks";
        let parsed = parse_consolidation_response(text).unwrap();
        assert!(parsed.buckets.is_empty());
        assert_eq!(parsed.unconsolidated_ids, vec!["a"]);
    }

    #[test]
    fn test_parse_embedded_object() {
        let text = "Result: {\"buckets\": [{\"bucket_name\": \"X\", \"consolidated_statement\": \"Y\", \"response_ids\": [7, 8]}]} done";
        let parsed = parse_consolidation_response(text).unwrap();
        assert_eq!(parsed.buckets[0].response_ids, vec!["7", "8"]);
        assert!(parsed.unconsolidated_ids.is_empty());
    }

    #[test]
    fn test_missing_buckets_is_error() {
        let err = parse_consolidation_response(r#"{"groups": []}"#).unwrap_err();
        assert_eq!(err, ConsolidationParseError::MissingField("buckets"));
    }

    #[test]
    fn test_no_json_is_error() {
        let err = parse_consolidation_response("I cannot help with that.").unwrap_err();
        assert_eq!(err, ConsolidationParseError::NoJson);
    }

    #[test]
    fn test_truncated_json_is_error() {
        let err = parse_consolidation_response(r#"{"buckets": [{"bucket_name": "A"}"#).unwrap_err();
        assert!(matches!(
            err,
            ConsolidationParseError::NoJson | ConsolidationParseError::InvalidJson(_)
        ));
    }

    #[test]
    fn test_non_string_ids_are_dropped() {
        let text = r#"{"buckets": [{"bucket_name": "A", "consolidated_statement": "B", "response_ids": ["x", null, {"id": 1}, ""]}]}"#;
        let parsed = parse_consolidation_response(text).unwrap();
        assert_eq!(parsed.buckets[0].response_ids, vec!["x"]);
    }
}
