use crate::dataset::DatasetProfile;
use crate::llm::models::{GenerationConfig, GenerationRequest};
use crate::llm::LlmManager;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct SimplifierResponse {
    simplified_user_query: String,
}

/// Rewrites the raw question into a concise, unambiguous intent statement.
///
/// This stage never fails the request: a model error or a malformed response
/// falls back to the raw question, which the SQL generator handles fine.
pub async fn simplify_query(
    llm: &LlmManager,
    question: &str,
    schema_text: &str,
    profile: &DatasetProfile,
) -> String {
    let prompt = build_prompt(question, schema_text, profile);
    let request = GenerationRequest::new(prompt, GenerationConfig::deterministic(1000).with_json_output());

    match llm.generate(&request).await {
        Ok(text) => match parse_response(&text) {
            Some(simplified) => {
                debug!("Simplified question: {}", simplified);
                simplified
            }
            None => {
                warn!("Simplifier returned malformed output, using the raw question");
                question.to_string()
            }
        },
        Err(e) => {
            warn!("Simplifier call failed ({}), using the raw question", e);
            question.to_string()
        }
    }
}

/// Extracts the simplified question from the model's JSON response.
/// Returns `None` on any contract violation.
pub fn parse_response(text: &str) -> Option<String> {
    let cleaned = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let response: SimplifierResponse = serde_json::from_str(cleaned).ok()?;
    let simplified = response.simplified_user_query.trim().to_string();
    if simplified.is_empty() {
        return None;
    }
    Some(simplified)
}

fn build_prompt(question: &str, schema_text: &str, profile: &DatasetProfile) -> String {
    format!(
        r#"You are a Query Simplifier. Your task is to take a natural language user query and convert it into a concise, unambiguous version suitable for generating SQL.

Follow these steps:

1. Identify the **intent** of the query (e.g., count, compare, retrieve).
2. Determine the **target entity** (e.g., request type, neighborhood, agency).
3. Extract any **filters or constraints** (e.g., time range, specific values).
4. Translate the natural phrasing into a format that uses **clear and analytical language**.
5. Ensure the final query is **complete, logical, and easily translatable to SQL**.

User Query:
{question}

You have access to this dataset:
`{table}`

Table schema:
{schema}

**Important Rules**:
- Use the request creation time for date filtering or extracting components (day, hour, month).
- Use the neighborhood for location-specific analysis.
- Do not include actual column names in the simplified query.
- Simplify the query in a way that's **logical and easy for an LLM to convert into SQL**.

**Examples**:

Input: "Which neighborhood had the most complaints in January 2023?"
→ simplified_user_query: "Find the neighborhood with the highest number of service requests in January 2023"

Input: "Compare number of street cleaning complaints vs pothole repair in 2022"
→ simplified_user_query: "Compare the total number of street cleaning and pothole repair requests in 2022"

Input: "When do most noise complaints occur during the day?"
→ simplified_user_query: "Find the hour of the day when noise complaints are most frequent"

Input: "List agencies with the longest average resolution time"
→ simplified_user_query: "Find agencies ranked by average time taken to resolve service requests"

Return result as:
{{"simplified_user_query": "final-simplified-query"}}

simplify the user query."#,
        question = question,
        table = profile.qualified_table(),
        schema = schema_text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_contract_field() {
        let text = r#"{"simplified_user_query": "Find the neighborhood with the most requests"}"#;
        assert_eq!(
            parse_response(text).as_deref(),
            Some("Find the neighborhood with the most requests")
        );
    }

    #[test]
    fn tolerates_code_fences() {
        let text = "```json\n{\"simplified_user_query\": \"Count requests per agency\"}\n```";
        assert_eq!(parse_response(text).as_deref(), Some("Count requests per agency"));
    }

    #[test]
    fn rejects_malformed_output() {
        assert!(parse_response("not json at all").is_none());
        assert!(parse_response(r#"{"other_field": "x"}"#).is_none());
        assert!(parse_response(r#"{"simplified_user_query": "  "}"#).is_none());
    }
}
