use crate::config::WarehouseConfig;
use crate::table::{CellValue, Column, ColumnKind, ResultTable};
use crate::warehouse::{ColumnInfo, TableRef, TableSchema, Warehouse, WarehouseError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const DEFAULT_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// BigQuery REST v2 backend. Queries run as synchronous query jobs against
/// the billing project; table metadata comes from `tables.get`.
pub struct BigQueryWarehouse {
    client: reqwest::Client,
    api_base: String,
    project_id: String,
    access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    use_legacy_sql: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    dry_run: Option<bool>,
    use_query_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: Option<bool>,
    job_reference: Option<JobReference>,
    schema: Option<SchemaField>,
    #[serde(default)]
    rows: Vec<RowField>,
    page_token: Option<String>,
    total_bytes_processed: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
}

#[derive(Deserialize)]
struct SchemaField {
    fields: Vec<FieldInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldInfo {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Deserialize)]
struct RowField {
    f: Vec<CellField>,
}

#[derive(Deserialize)]
struct CellField {
    #[serde(default)]
    v: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableGetResponse {
    schema: SchemaField,
}

impl BigQueryWarehouse {
    pub fn new(config: &WarehouseConfig) -> Result<Self, WarehouseError> {
        let access_token = config.access_token.clone().ok_or_else(|| {
            WarehouseError::ConfigError(
                "Access token is required for the BigQuery backend".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| WarehouseError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            project_id: config.project_id.clone(),
            access_token,
        })
    }

    async fn post_query(&self, request: &QueryRequest) -> Result<QueryResponse, WarehouseError> {
        let url = format!("{}/projects/{}/queries", self.api_base, self.project_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| WarehouseError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WarehouseError::QueryError(format!(
                "BigQuery responded with status code: {} - {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| WarehouseError::QueryError(e.to_string()))
    }

    async fn get_query_results(
        &self,
        job_id: &str,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, WarehouseError> {
        let mut url = format!(
            "{}/projects/{}/queries/{}",
            self.api_base, self.project_id, job_id
        );
        if let Some(token) = page_token {
            url.push_str(&format!("?pageToken={}", token));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| WarehouseError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WarehouseError::QueryError(format!(
                "BigQuery responded with status code: {} - {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| WarehouseError::QueryError(e.to_string()))
    }
}

/// Decodes one wire cell into a typed value, guided by the schema field type.
/// BigQuery serializes every scalar as a JSON string.
fn decode_cell(raw: &Value, field_type: &str) -> CellValue {
    let text = match raw {
        Value::Null => return CellValue::Null,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    match field_type.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT64" => text
            .parse::<i64>()
            .map(CellValue::Int)
            .unwrap_or(CellValue::Text(text)),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => text
            .parse::<f64>()
            .map(CellValue::Float)
            .unwrap_or(CellValue::Text(text)),
        "BOOLEAN" | "BOOL" => match text.as_str() {
            "true" => CellValue::Bool(true),
            "false" => CellValue::Bool(false),
            _ => CellValue::Text(text),
        },
        _ => CellValue::Text(text),
    }
}

fn decode_rows(fields: &[FieldInfo], rows: &[RowField]) -> Vec<Vec<CellValue>> {
    rows.iter()
        .map(|row| {
            row.f
                .iter()
                .zip(fields.iter())
                .map(|(cell, field)| decode_cell(&cell.v, &field.field_type))
                .collect()
        })
        .collect()
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn fetch_table_schema(&self, table: &TableRef) -> Result<TableSchema, WarehouseError> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}",
            self.api_base, table.project, table.dataset, table.table
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| WarehouseError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WarehouseError::QueryError(format!(
                "BigQuery responded with status code: {}",
                response.status()
            )));
        }

        let table_response: TableGetResponse = response
            .json()
            .await
            .map_err(|e| WarehouseError::QueryError(e.to_string()))?;

        Ok(TableSchema {
            table: table.table.clone(),
            columns: table_response
                .schema
                .fields
                .into_iter()
                .map(|f| ColumnInfo {
                    name: f.name,
                    field_type: f.field_type,
                })
                .collect(),
        })
    }

    async fn dry_run_cost(&self, sql: &str) -> Result<i64, WarehouseError> {
        let request = QueryRequest {
            query: sql.to_string(),
            use_legacy_sql: false,
            dry_run: Some(true),
            // The estimate must reflect a full scan, never a cache hit.
            use_query_cache: false,
            timeout_ms: None,
        };

        let response = self.post_query(&request).await?;

        let bytes = response
            .total_bytes_processed
            .ok_or_else(|| {
                WarehouseError::QueryError("Dry run returned no totalBytesProcessed".to_string())
            })?
            .parse::<i64>()
            .map_err(|e| WarehouseError::QueryError(e.to_string()))?;

        debug!("Dry run estimated {} bytes processed", bytes);
        Ok(bytes)
    }

    async fn execute(&self, sql: &str) -> Result<ResultTable, WarehouseError> {
        let request = QueryRequest {
            query: sql.to_string(),
            use_legacy_sql: false,
            dry_run: None,
            use_query_cache: true,
            timeout_ms: Some(60_000),
        };

        let mut response = self.post_query(&request).await?;

        let job_id = response
            .job_reference
            .as_ref()
            .map(|job| job.job_id.clone());

        // An incomplete job has produced no schema or rows yet; poll it.
        while response.job_complete == Some(false) {
            let job_id = job_id.as_deref().ok_or_else(|| {
                WarehouseError::QueryError("Incomplete job without a job reference".to_string())
            })?;
            response = self.get_query_results(job_id, None).await?;
        }

        let schema = response.schema.ok_or_else(|| {
            WarehouseError::QueryError("Query response carried no schema".to_string())
        })?;

        let mut rows = decode_rows(&schema.fields, &response.rows);

        // Follow result pages until the token runs out.
        let mut page_token = response.page_token;
        while let Some(token) = page_token {
            let job_id = job_id.as_deref().ok_or_else(|| {
                WarehouseError::QueryError("Paged results without a job reference".to_string())
            })?;
            let page = self.get_query_results(job_id, Some(&token)).await?;
            rows.extend(decode_rows(&schema.fields, &page.rows));
            page_token = page.page_token;
        }

        let columns = schema
            .fields
            .iter()
            .map(|f| Column {
                name: f.name.clone(),
                kind: ColumnKind::from_field_type(&f.field_type),
            })
            .collect();

        Ok(ResultTable::new(columns, rows))
    }
}
