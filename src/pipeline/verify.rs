use crate::llm::models::{GenerationConfig, GenerationRequest};
use crate::llm::LlmManager;
use crate::pipeline::PipelineError;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct VerifierResponse {
    correct_query: String,
}

/// Reviews the generated SQL against the original question and schema and
/// returns the (possibly corrected) query.
///
/// The verification judgment itself belongs to the model; this component owns
/// only the contract. A response that does not parse as
/// `{"correct_query": "..."}` fails the whole request — an unverified query
/// must never be cost-estimated or executed.
pub async fn verify_query(
    llm: &LlmManager,
    question: &str,
    sql: &str,
    schema_text: &str,
) -> Result<String, PipelineError> {
    let prompt = build_prompt(question, sql, schema_text);
    let request = GenerationRequest::new(prompt, GenerationConfig::deterministic(2000).with_json_output());

    let text = llm
        .generate(&request)
        .await
        .map_err(|e| PipelineError::Verification(e.to_string()))?;

    let verified = parse_response(&text)
        .ok_or_else(|| PipelineError::Verification(format!("malformed verifier output: {}", text)))?;

    debug!("Verified SQL: {}", verified);
    Ok(verified)
}

/// Strict contract parse. `None` on anything but a JSON mapping with a
/// non-empty `correct_query` field.
pub fn parse_response(text: &str) -> Option<String> {
    let cleaned = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let response: VerifierResponse = serde_json::from_str(cleaned).ok()?;
    let sql = response.correct_query.trim().to_string();
    if sql.is_empty() {
        return None;
    }
    Some(sql)
}

fn build_prompt(question: &str, sql: &str, schema_text: &str) -> String {
    format!(
        r#"You are a SQL reviewer. You are given a user's question, the table schema, and a SQL query generated to answer that question.

Review the query carefully:

1. Check that it answers the user's question.
2. Check that every referenced field exists in the schema.
3. Check filters, aggregations, grouping and ordering for correctness.
4. If the query is correct, return it unchanged. If not, return a corrected query.

User's Question:
{question}

Table Schema:
{schema}

Generated SQL:
{sql}

Return result as:
{{"correct_query": "the final SQL query"}}

Return only the JSON object. Do not explain."#,
        question = question,
        schema = schema_text,
        sql = sql,
    )
}
