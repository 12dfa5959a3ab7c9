//! Prompt templates for cluster consolidation

use crate::response::Response;

/// Templates for generating consolidation prompts
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for consolidating one cluster
    pub fn consolidation_system() -> &'static str {
        r#"You are an analyst condensing contributions from a public deliberation.
You receive a group of responses that were judged semantically similar.
Your task is to merge responses that express the same core idea into a single consolidated statement.

Rules:
1. Group by core meaning, not by surface wording.
2. Every response belongs to at most one bucket.
3. Preserve distinct viewpoints. Never merge responses that disagree.
4. Write each consolidated statement in the voice and tense used by most of the responses it replaces.
5. Keep statements concise: one sentence where possible.
6. Responses that fit no bucket go in "unconsolidated_ids".
7. Only use the ids you were given. Never invent ids.

Reply with JSON only."#
    }

    /// User prompt listing every response with its id.
    ///
    /// Texts are sent whole; batch size is the only bound on prompt length.
    pub fn consolidation_prompt(responses: &[Response]) -> String {
        let mut prompt = format!(
            "Consolidate the following {} responses.\n\nResponses:\n",
            responses.len()
        );

        for response in responses {
            prompt.push_str(&format!("\n[id: {}]\n{}\n", response.id, response.text.trim()));
        }

        prompt.push_str(
            r#"
Respond with a JSON object in this exact shape:
{
  "buckets": [
    {
      "bucket_name": "short label",
      "consolidated_statement": "one concise statement",
      "response_ids": ["id", "id"]
    }
  ],
  "unconsolidated_ids": ["id"]
}"#,
        );

        prompt
    }
}
