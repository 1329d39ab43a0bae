pub mod chart;
pub mod cost;
pub mod generate;
pub mod insight;
pub mod simplify;
pub mod verify;

use crate::dataset::DatasetProfile;
use crate::llm::LlmManager;
use crate::table::ResultTable;
use crate::warehouse::{WarehouseError, WarehouseManager};
use chart::figure::Figure;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Rows fetched from the fixed table to ground the SQL generator.
const SAMPLE_ROW_COUNT: usize = 10;

#[derive(Debug)]
pub enum PipelineError {
    /// Schema fetch or another warehouse metadata failure before execution.
    Warehouse(WarehouseError),
    /// The verifier's JSON contract was violated; the request must not
    /// proceed to cost estimation or execution.
    Verification(String),
    /// The warehouse rejected the verified query at execution time.
    Execution(WarehouseError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Warehouse(e) => write!(f, "warehouse error: {}", e),
            PipelineError::Verification(msg) => write!(f, "query verification failed: {}", msg),
            PipelineError::Execution(e) => write!(f, "query execution failed: {}", e),
        }
    }
}

impl Error for PipelineError {}

/// Request-scoped context accumulated by the planning half of the pipeline.
/// Fields after a failed stage stay `None`; later stages short-circuit on
/// them instead of erroring.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub question: String,
    pub simplified_question: String,
    pub sql: Option<String>,
    pub verified_sql: Option<String>,
    pub estimated_bytes: Option<i64>,
}

/// What a verified, executed query came back as.
pub enum Outcome {
    Answer(Answer),
    /// The query ran but produced nothing usable (possibly after null-row
    /// dropping). A terminal state, not an error.
    NoData,
}

pub struct Answer {
    pub table: ResultTable,
    pub insight: Option<String>,
    /// `None` means "could not create a chart" — also a reportable state.
    pub chart: Option<Figure>,
}

/// Everything one question produced, for callers that run both halves.
pub struct PipelineRun {
    pub plan: QueryPlan,
    pub outcome: Option<Outcome>,
}

/// The question-to-chart pipeline. Stages run strictly in sequence; each
/// external call blocks before the next stage starts.
pub struct Pipeline {
    warehouse: Arc<WarehouseManager>,
    llm: Arc<LlmManager>,
    profile: DatasetProfile,
}

impl Pipeline {
    pub fn new(
        warehouse: Arc<WarehouseManager>,
        llm: Arc<LlmManager>,
        profile: DatasetProfile,
    ) -> Self {
        Self {
            warehouse,
            llm,
            profile,
        }
    }

    pub fn profile(&self) -> &DatasetProfile {
        &self.profile
    }

    /// Fetches the schema text for the fixed table.
    pub async fn schema_text(&self) -> Result<String, PipelineError> {
        let schema = self
            .warehouse
            .fetch_table_schema(&self.profile.table)
            .await
            .map_err(PipelineError::Warehouse)?;
        Ok(schema.schema_text())
    }

    /// Stages 1-5: schema, simplification, SQL generation, verification and
    /// the dry-run cost estimate. Nothing here executes the query.
    pub async fn plan(&self, question: &str) -> Result<QueryPlan, PipelineError> {
        info!("Planning question: {}", question);
        let schema_text = self.schema_text().await?;

        let simplified =
            simplify::simplify_query(&self.llm, question, &schema_text, &self.profile).await;

        let sample_rows = self.sample_rows_json().await;
        let sql = generate::generate_sql(
            &self.llm,
            &simplified,
            &schema_text,
            sample_rows.as_deref(),
            &self.profile,
        )
        .await;

        let (verified_sql, estimated_bytes) = match &sql {
            Some(sql) => {
                let verified =
                    verify::verify_query(&self.llm, question, sql, &schema_text).await?;
                let bytes = cost::estimate_query_cost(&self.warehouse, &verified).await;
                (Some(verified), bytes)
            }
            None => (None, None),
        };

        Ok(QueryPlan {
            question: question.to_string(),
            simplified_question: simplified,
            sql,
            verified_sql,
            estimated_bytes,
        })
    }

    /// Stages 6-9: execution, insight, chart selection and rendering.
    /// `verified_sql` is the query the caller approved after seeing the plan.
    pub async fn answer(&self, question: &str, verified_sql: &str) -> Result<Outcome, PipelineError> {
        let table = self
            .warehouse
            .execute(verified_sql)
            .await
            .map_err(PipelineError::Execution)?;

        let table = table.drop_null_rows();
        if table.is_empty() {
            info!("Query produced no usable rows");
            return Ok(Outcome::NoData);
        }

        let insight = insight::generate_insight(&self.llm, question, &table, &self.profile).await;

        let chart = match chart::suggest::suggest_chart(
            &self.llm,
            &table,
            question,
            insight.as_deref().unwrap_or(""),
        )
        .await
        {
            Some(suggestion) => chart::parse_recommendation(&suggestion)
                .and_then(|rec| chart::render::render_chart(&table, &rec)),
            None => None,
        };

        Ok(Outcome::Answer(Answer {
            table,
            insight,
            chart,
        }))
    }

    /// Both halves back to back, with the cost gate auto-approved. Returns
    /// no outcome when SQL generation came up empty.
    pub async fn run(&self, question: &str) -> Result<PipelineRun, PipelineError> {
        let plan = self.plan(question).await?;

        let outcome = match &plan.verified_sql {
            Some(sql) => Some(self.answer(question, sql).await?),
            None => None,
        };

        Ok(PipelineRun { plan, outcome })
    }

    /// A few rows of the fixed table, serialized for the generator prompt.
    /// Degrades to `None`; schema-only grounding still works.
    async fn sample_rows_json(&self) -> Option<String> {
        let sql = format!(
            "SELECT * FROM `{}` LIMIT {}",
            self.profile.qualified_table(),
            SAMPLE_ROW_COUNT
        );

        match self.warehouse.execute(&sql).await {
            Ok(table) => {
                let records = table.head_records(SAMPLE_ROW_COUNT);
                serde_json::to_string_pretty(&records).ok()
            }
            Err(e) => {
                debug!("Sample-row fetch failed ({}), grounding on schema only", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;
    use crate::llm::models::GenerationRequest;
    use crate::llm::{LlmError, TextGenerator};
    use crate::table::{CellValue, Column, ColumnKind};
    use crate::warehouse::{ColumnInfo, TableRef, TableSchema, Warehouse};
    use async_trait::async_trait;

    /// Warehouse that serves a fixed schema and a scripted result table.
    struct MockWarehouse {
        result: ResultTable,
    }

    #[async_trait]
    impl Warehouse for MockWarehouse {
        async fn fetch_table_schema(&self, table: &TableRef) -> Result<TableSchema, WarehouseError> {
            Ok(TableSchema {
                table: table.table.clone(),
                columns: vec![
                    ColumnInfo {
                        name: "neighborhood".to_string(),
                        field_type: "STRING".to_string(),
                    },
                    ColumnInfo {
                        name: "requested_datetime".to_string(),
                        field_type: "TIMESTAMP".to_string(),
                    },
                ],
            })
        }

        async fn dry_run_cost(&self, _sql: &str) -> Result<i64, WarehouseError> {
            Ok(1536)
        }

        async fn execute(&self, _sql: &str) -> Result<ResultTable, WarehouseError> {
            Ok(self.result.clone())
        }
    }

    /// Model whose per-stage responses are keyed off prompt markers, so one
    /// scripted generator can drive the whole pipeline.
    struct ScriptedModel {
        verifier_response: String,
        suggestion: String,
    }

    #[async_trait]
    impl TextGenerator for ScriptedModel {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
            if request.system_instruction.is_some() {
                // Only the SQL generator uses a system instruction.
                return Ok(
                    "```sql\nSELECT neighborhood, COUNT(*) AS request_count FROM t GROUP BY neighborhood\n```"
                        .to_string(),
                );
            }
            if request.prompt.contains("Query Simplifier") {
                return Ok(
                    r#"{"simplified_user_query": "Find the neighborhood with the highest number of service requests in January 2023"}"#
                        .to_string(),
                );
            }
            if request.prompt.contains("SQL reviewer") {
                return Ok(self.verifier_response.clone());
            }
            if request.prompt.contains("data analysis assistant") {
                return Ok(
                    "The Mission had the most service requests (1,200) in January 2023.".to_string(),
                );
            }
            if request.prompt.contains("data visualization expert") {
                return Ok(self.suggestion.clone());
            }
            Err(LlmError::ResponseError("unexpected prompt".to_string()))
        }
    }

    fn neighborhood_table() -> ResultTable {
        ResultTable::new(
            vec![
                Column {
                    name: "neighborhood".to_string(),
                    kind: ColumnKind::Categorical,
                },
                Column {
                    name: "request_count".to_string(),
                    kind: ColumnKind::Numeric,
                },
            ],
            vec![
                vec![CellValue::Text("Mission".to_string()), CellValue::Int(1200)],
                vec![CellValue::Text("Sunset".to_string()), CellValue::Int(640)],
            ],
        )
    }

    fn scalar_table() -> ResultTable {
        ResultTable::new(
            vec![Column {
                name: "total_requests".to_string(),
                kind: ColumnKind::Numeric,
            }],
            vec![vec![CellValue::Int(48_213)]],
        )
    }

    fn build_pipeline(result: ResultTable, model: ScriptedModel) -> Pipeline {
        let warehouse = Arc::new(WarehouseManager::from_backend(Box::new(MockWarehouse {
            result,
        })));
        let llm = Arc::new(LlmManager::from_generator(Box::new(model)));
        let profile = DatasetProfile::from_config(&DatasetConfig {
            project_id: "bigquery-public-data".to_string(),
            dataset_id: "san_francisco_311".to_string(),
            table_name: "311_service_requests".to_string(),
        });
        Pipeline::new(warehouse, llm, profile)
    }

    fn verified_ok() -> String {
        r#"{"correct_query": "SELECT neighborhood, COUNT(*) AS request_count FROM t GROUP BY neighborhood LIMIT 100"}"#
            .to_string()
    }

    #[tokio::test]
    async fn question_flows_through_to_a_bar_chart() {
        let model = ScriptedModel {
            verifier_response: verified_ok(),
            suggestion: "Chart type: bar\nX-axis: neighborhood\nY-axis: request_count\nValues: N/A\nLabels: N/A"
                .to_string(),
        };
        let pipeline = build_pipeline(neighborhood_table(), model);

        let run = pipeline
            .run("Which neighborhood had the most requests in January 2023?")
            .await
            .expect("pipeline runs");

        assert!(run.plan.sql.is_some());
        assert!(run.plan.verified_sql.is_some());
        assert_eq!(run.plan.estimated_bytes, Some(1536));

        let Some(Outcome::Answer(answer)) = run.outcome else {
            panic!("expected an answer outcome");
        };
        assert_eq!(answer.table.row_count(), 2);
        assert!(answer.insight.is_some());

        let chart = answer.chart.expect("a bar chart is produced");
        let value = chart.to_plotly_value();
        assert_eq!(value["data"][0]["type"], "bar");
        assert_eq!(value["data"][0]["x"][0], "Mission");
    }

    #[tokio::test]
    async fn single_scalar_result_yields_no_chart() {
        let model = ScriptedModel {
            verifier_response: verified_ok(),
            suggestion: "VISUALISATION NOT NEEDED".to_string(),
        };
        let pipeline = build_pipeline(scalar_table(), model);

        let run = pipeline
            .run("How many requests were there in total?")
            .await
            .expect("pipeline runs");

        let Some(Outcome::Answer(answer)) = run.outcome else {
            panic!("expected an answer outcome");
        };
        assert!(answer.insight.is_some());
        assert!(answer.chart.is_none());
    }

    #[tokio::test]
    async fn broken_verifier_contract_fails_the_request() {
        let model = ScriptedModel {
            verifier_response: "looks good to me!".to_string(),
            suggestion: String::new(),
        };
        let pipeline = build_pipeline(neighborhood_table(), model);

        let err = pipeline
            .plan("Which neighborhood had the most requests?")
            .await
            .expect_err("verification must fail");
        assert!(matches!(err, PipelineError::Verification(_)));
    }

    #[tokio::test]
    async fn all_null_rows_terminate_as_no_data() {
        let table = ResultTable::new(
            vec![
                Column {
                    name: "neighborhood".to_string(),
                    kind: ColumnKind::Categorical,
                },
                Column {
                    name: "request_count".to_string(),
                    kind: ColumnKind::Numeric,
                },
            ],
            vec![
                vec![CellValue::Null, CellValue::Int(3)],
                vec![CellValue::Text("Mission".to_string()), CellValue::Null],
            ],
        );

        let model = ScriptedModel {
            verifier_response: verified_ok(),
            suggestion: String::new(),
        };
        let pipeline = build_pipeline(table, model);

        let outcome = pipeline
            .answer("Which neighborhood had the most requests?", "SELECT 1")
            .await
            .expect("execution succeeds");
        assert!(matches!(outcome, Outcome::NoData));
    }
}
