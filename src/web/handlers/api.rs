use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::pipeline::cost::bytes_to_human_readable;
use crate::pipeline::{Outcome, PipelineError};
use crate::table::Column;
use crate::web::state::AppState;

// Question planning

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub simplified_question: String,
    pub sql: Option<String>,
    pub verified_sql: Option<String>,
    pub estimated_bytes: Option<i64>,
    /// Human-readable scan estimate, "N/A" when unavailable.
    pub estimated_cost: String,
}

// Approved execution

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub question: String,
    /// The verified SQL the caller was shown and approved.
    pub sql: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: String, // "ok" or "no_data"
    pub columns: Vec<Column>,
    pub rows: Vec<Value>,
    pub row_count: usize,
    pub insight: Option<String>,
    /// Plotly-shaped figure, absent when no chart could be produced.
    pub chart: Option<Value>,
}

// One-shot question answering (no approval gate)

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub question: String,
    pub simplified_question: String,
    pub sql: Option<String>,
    pub verified_sql: Option<String>,
    pub estimated_bytes: Option<i64>,
    pub estimated_cost: String,
    /// "ok", "no_data", or "no_query" when SQL generation came up empty.
    pub status: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Value>,
    pub row_count: usize,
    pub insight: Option<String>,
    pub chart: Option<Value>,
}

// Export

#[derive(Debug, Deserialize)]
pub struct ExportChartRequest {
    pub title: Option<String>,
    pub figure: Value,
}

#[derive(Debug, Deserialize)]
pub struct ExportCsvRequest {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
}

// System status

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub dataset: String,
    pub warehouse_backend: String,
    pub llm_backend: String,
}

fn pipeline_error_response(e: PipelineError) -> (StatusCode, String) {
    match e {
        PipelineError::Verification(_) => {
            error!("Verification contract violated: {}", e);
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        PipelineError::Execution(_) => {
            error!("Query execution failed: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        PipelineError::Warehouse(_) => {
            error!("Warehouse error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// API Implementations

/// Plans a question: simplification, SQL generation, verification and the
/// dry-run cost estimate. Nothing is executed; the caller decides whether
/// to proceed based on the estimate.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, String)> {
    if payload.question.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Please enter a question before submitting.".to_string(),
        ));
    }

    info!("Planning NL question: {}", payload.question);

    let plan = state
        .pipeline
        .plan(payload.question.trim())
        .await
        .map_err(pipeline_error_response)?;

    Ok(Json(AskResponse {
        estimated_cost: bytes_to_human_readable(plan.estimated_bytes),
        question: plan.question,
        simplified_question: plan.simplified_question,
        sql: plan.sql,
        verified_sql: plan.verified_sql,
        estimated_bytes: plan.estimated_bytes,
    }))
}

/// Executes an approved query and produces the insight and chart.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunResponse>, (StatusCode, String)> {
    if payload.sql.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "No verified query to run.".to_string(),
        ));
    }

    info!("Executing approved query");

    let outcome = state
        .pipeline
        .answer(&payload.question, payload.sql.trim())
        .await
        .map_err(pipeline_error_response)?;

    let response = match outcome {
        Outcome::NoData => RunResponse {
            status: "no_data".to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            insight: None,
            chart: None,
        },
        Outcome::Answer(answer) => RunResponse {
            status: "ok".to_string(),
            columns: answer.table.columns.clone(),
            rows: answer.table.to_json_records(),
            row_count: answer.table.row_count(),
            insight: answer.insight,
            chart: answer.chart.map(|figure| figure.to_plotly_value()),
        },
    };

    Ok(Json(response))
}

/// Runs the whole pipeline for one question with the cost gate
/// auto-approved. For programmatic callers with no approval UI.
pub async fn question(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<QuestionResponse>, (StatusCode, String)> {
    if payload.question.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Please enter a question before submitting.".to_string(),
        ));
    }

    info!("Answering NL question end to end: {}", payload.question);

    let run = state
        .pipeline
        .run(payload.question.trim())
        .await
        .map_err(pipeline_error_response)?;

    let mut response = QuestionResponse {
        estimated_cost: bytes_to_human_readable(run.plan.estimated_bytes),
        question: run.plan.question,
        simplified_question: run.plan.simplified_question,
        sql: run.plan.sql,
        verified_sql: run.plan.verified_sql,
        estimated_bytes: run.plan.estimated_bytes,
        status: "no_query".to_string(),
        columns: Vec::new(),
        rows: Vec::new(),
        row_count: 0,
        insight: None,
        chart: None,
    };

    match run.outcome {
        None => {}
        Some(Outcome::NoData) => response.status = "no_data".to_string(),
        Some(Outcome::Answer(answer)) => {
            response.status = "ok".to_string();
            response.columns = answer.table.columns.clone();
            response.rows = answer.table.to_json_records();
            response.row_count = answer.table.row_count();
            response.insight = answer.insight;
            response.chart = answer.chart.map(|figure| figure.to_plotly_value());
        }
    }

    Ok(Json(response))
}

/// Renders a figure into a standalone HTML document for download.
pub async fn export_chart(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExportChartRequest>,
) -> Result<Response, (StatusCode, String)> {
    let title = payload.title.as_deref().unwrap_or("Generated Chart");
    let html = crate::pipeline::chart::figure::document(&state.template_env, title, &payload.figure)
        .map_err(|e| {
            error!("Chart template render error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"interactive_chart.html\""),
    );

    Ok((headers, html).into_response())
}

/// Serializes previously returned rows as a CSV attachment.
pub async fn export_csv(
    Json(payload): Json<ExportCsvRequest>,
) -> Result<Response, (StatusCode, String)> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(&payload.columns)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    for row in &payload.rows {
        let record: Vec<String> = payload
            .columns
            .iter()
            .map(|column| match row.get(column) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();

        writer
            .write_record(&record)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"query_result.csv\""),
    );

    Ok((headers, bytes).into_response())
}

/// Schema text for the fixed table, as the prompts see it.
pub async fn get_schema(
    State(state): State<Arc<AppState>>,
) -> Result<String, (StatusCode, String)> {
    state
        .pipeline
        .schema_text()
        .await
        .map_err(pipeline_error_response)
}

pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let uptime = chrono::Utc::now() - state.startup_time;

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds(),
        dataset: state.pipeline.profile().qualified_table(),
        warehouse_backend: state.config.warehouse.backend.clone(),
        llm_backend: state.config.llm.backend.clone(),
    })
}
