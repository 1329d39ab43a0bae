use crate::dataset::DatasetProfile;
use crate::llm::models::{GenerationConfig, GenerationRequest};
use crate::llm::LlmManager;
use crate::table::ResultTable;
use tracing::warn;

/// Rows of the result sampled into the insight prompt.
pub const INSIGHT_SAMPLE_ROWS: usize = 250;

/// Summarizes the result in natural language, conditioned on the question.
///
/// Inherently generative; a model failure degrades to no insight rather than
/// failing the request.
pub async fn generate_insight(
    llm: &LlmManager,
    question: &str,
    table: &ResultTable,
    profile: &DatasetProfile,
) -> Option<String> {
    let records = table.head_records(INSIGHT_SAMPLE_ROWS);
    let dataset_json = serde_json::to_string(&records).unwrap_or_else(|_| "[]".to_string());

    let prompt = build_prompt(question, &dataset_json, profile);
    let config = GenerationConfig {
        temperature: 0.0,
        top_p: 1.0,
        seed: Some(0),
        max_output_tokens: 1000,
        json_output: false,
    };

    match llm.generate(&GenerationRequest::new(prompt, config)).await {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => {
            warn!("Insight generation failed: {}", e);
            None
        }
    }
}

fn build_prompt(question: &str, dataset_json: &str, profile: &DatasetProfile) -> String {
    format!(
        r#"You are an advanced data analysis assistant. Your task is to analyze the provided JSON dataset and generate insights based on the user's question.

**Instructions**:
1. Carefully review the dataset provided in JSON format.
2. Ensure your analysis directly addresses the user's question.
3. Provide accurate, concise, and actionable insights based on the data.
4. If relevant, include statistics, trends, or patterns observed in the dataset.

**Column Descriptions (from {table})**:
{columns}

**User's Question**:
{question}

**JSON Dataset**:
{dataset}

**Output Format**:
Provide the insights as a clear and concise explanation in natural language. Do **not** mention phrases like "based on the provided JSON data." Just write the insight directly. Always mention units such as dates or counts wherever relevant.

Generate insights."#,
        table = profile.qualified_table(),
        columns = profile.column_descriptions,
        question = question,
        dataset = dataset_json,
    )
}
