use crate::dataset::DatasetProfile;
use crate::llm::models::{GenerationConfig, GenerationRequest};
use crate::llm::LlmManager;
use regex::Regex;
use tracing::{debug, warn};

/// Default bound applied to generated queries that carry no explicit limit.
pub const DEFAULT_ROW_CAP: usize = 100;

/// Turns the simplified question into a SQL string against the fixed table.
///
/// Returns `None` when the model call fails or produces nothing usable; the
/// caller short-circuits verification and everything downstream.
pub async fn generate_sql(
    llm: &LlmManager,
    question: &str,
    schema_text: &str,
    sample_rows: Option<&str>,
    profile: &DatasetProfile,
) -> Option<String> {
    let instruction = build_instruction(schema_text, sample_rows, profile);
    let request = GenerationRequest::new(question, GenerationConfig::default())
        .with_system_instruction(instruction);

    let raw = match llm.generate(&request).await {
        Ok(text) => text,
        Err(e) => {
            warn!("SQL generation failed: {}", e);
            return None;
        }
    };

    let sql = strip_sql_fences(&raw);
    if sql.is_empty() {
        warn!("SQL generation produced empty output");
        return None;
    }

    let sql = apply_default_row_cap(&sql);
    debug!("Generated SQL: {}", sql);
    Some(sql)
}

/// Strips known markdown fence markers the model sometimes wraps SQL in.
pub fn strip_sql_fences(text: &str) -> String {
    text.replace("```sql", "").replace("```", "").trim().to_string()
}

/// Appends `LIMIT 100` when the query has no LIMIT clause of its own.
/// Queries that already carry an explicit limit (the "user asked otherwise"
/// path) are left untouched.
pub fn apply_default_row_cap(sql: &str) -> String {
    let has_limit = Regex::new(r"(?i)\blimit\s+\d+").expect("valid regex");
    if has_limit.is_match(sql) {
        return sql.to_string();
    }

    let trimmed = sql.trim_end().trim_end_matches(';').trim_end();
    format!("{}\nLIMIT {}", trimmed, DEFAULT_ROW_CAP)
}

fn build_instruction(
    schema_text: &str,
    sample_rows: Option<&str>,
    profile: &DatasetProfile,
) -> String {
    let table = profile.qualified_table();
    let sample_section = sample_rows
        .map(|rows| format!("\n\n### Sample Rows:\n\n{}\n", rows))
        .unwrap_or_default();

    format!(
        r#"You are a SQL generator for a cloud data warehouse.

Your task is to convert natural language questions into valid SQL queries using the dataset:
`{table}`


### Instructions:

1. **Understand the intent** of the user — e.g., count, group by, filter, compare, sort.
2. **Generate a syntactically correct SQL query** based on the user's request.
3. Use the correct **field names** and **functions** (e.g., `EXTRACT(DATE FROM ...)`, `TIMESTAMP_DIFF`, `COUNT`, etc.).
4. Include **LIMIT {row_cap}** by default unless the user specifies otherwise.
5. Handle time filtering using `created_at` (request timestamp) and `closed_date` (resolution timestamp).
6. Use `service_subtype` or `service_name` for request types like potholes, graffiti, noise, etc.
7. Use `agency_responsible`, `status`, and `source` as needed.
8. Do not hallucinate fields that don't exist.


### Table Schema:

{schema}

### Field Reference (partial):

{field_notes}
{sample_section}

### Examples:

**Input:** "Which neighborhood had the most pothole complaints last year?"
**Output:**
```sql
SELECT neighborhood, COUNT(*) AS pothole_requests
FROM `{table}`
WHERE EXTRACT(YEAR FROM created_at) = EXTRACT(YEAR FROM CURRENT_DATE()) - 1
  AND LOWER(service_subtype) LIKE '%pothole%'
GROUP BY neighborhood
ORDER BY pothole_requests DESC
LIMIT {row_cap}
```"#,
        table = table,
        row_cap = DEFAULT_ROW_CAP,
        schema = schema_text,
        field_notes = profile.field_notes,
        sample_section = sample_section,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sql_fences() {
        let text = "```sql\nSELECT 1\n```";
        assert_eq!(strip_sql_fences(text), "SELECT 1");
    }

    #[test]
    fn leaves_unfenced_sql_alone() {
        assert_eq!(strip_sql_fences("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn caps_unbounded_queries_at_the_default() {
        let sql = "SELECT neighborhood, COUNT(*) AS n FROM t GROUP BY neighborhood;";
        let capped = apply_default_row_cap(sql);
        assert!(capped.ends_with("LIMIT 100"));
        assert!(!capped.contains(';'));
    }

    #[test]
    fn respects_an_explicit_limit() {
        let sql = "SELECT * FROM t LIMIT 500";
        assert_eq!(apply_default_row_cap(sql), sql);

        let lowercase = "select * from t limit 25";
        assert_eq!(apply_default_row_cap(lowercase), lowercase);
    }

    #[test]
    fn limit_in_an_identifier_does_not_count() {
        let sql = "SELECT speed_limit FROM t";
        let capped = apply_default_row_cap(sql);
        assert!(capped.ends_with("LIMIT 100"));
    }
}
