pub mod bigquery;
pub mod duckdb;

use crate::config::WarehouseConfig;
use crate::table::ResultTable;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum WarehouseError {
    ConnectionError(String),
    QueryError(String),
    ConfigError(String),
    /// The backend has no implementation of the requested facility
    /// (e.g. DuckDB has no bytes-scanned dry run).
    Unsupported(String),
}

impl fmt::Display for WarehouseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarehouseError::ConnectionError(msg) => {
                write!(f, "warehouse connection error: {}", msg)
            }
            WarehouseError::QueryError(msg) => write!(f, "warehouse query error: {}", msg),
            WarehouseError::ConfigError(msg) => write!(f, "warehouse configuration error: {}", msg),
            WarehouseError::Unsupported(msg) => write!(f, "warehouse facility unsupported: {}", msg),
        }
    }
}

impl Error for WarehouseError {}

/// Fully qualified reference to the fixed table.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn qualified(&self) -> String {
        format!("{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub field_type: String,
}

/// Column names and types for the fixed table, as reported by the warehouse.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// Renders the schema in the text form the prompts consume.
    pub fn schema_text(&self) -> String {
        let mut text = format!("Table: {}\n", self.table);
        for column in &self.columns {
            text.push_str(&format!("    - {} ({})\n", column.name, column.field_type));
        }
        text
    }
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Fetches column names/types for a table from warehouse metadata.
    async fn fetch_table_schema(&self, table: &TableRef) -> Result<TableSchema, WarehouseError>;

    /// No-execution scan-cost estimate for a query, in bytes. Must never
    /// execute the query and must bypass any result cache.
    async fn dry_run_cost(&self, sql: &str) -> Result<i64, WarehouseError>;

    /// Runs a query and materializes the full result.
    async fn execute(&self, sql: &str) -> Result<ResultTable, WarehouseError>;
}

pub struct WarehouseManager {
    backend: Box<dyn Warehouse + Send + Sync>,
}

impl WarehouseManager {
    pub fn new(config: &WarehouseConfig) -> Result<Self, WarehouseError> {
        let backend: Box<dyn Warehouse + Send + Sync> = match config.backend.as_str() {
            "bigquery" => Box::new(bigquery::BigQueryWarehouse::new(config)?),
            "duckdb" => Box::new(duckdb::DuckDbWarehouse::new(config)?),
            _ => {
                return Err(WarehouseError::ConfigError(format!(
                    "Unsupported warehouse backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { backend })
    }

    /// Wraps an already-built backend. Lets tests drive the pipeline with a
    /// scripted warehouse.
    pub fn from_backend(backend: Box<dyn Warehouse + Send + Sync>) -> Self {
        Self { backend }
    }

    pub async fn fetch_table_schema(&self, table: &TableRef) -> Result<TableSchema, WarehouseError> {
        self.backend.fetch_table_schema(table).await
    }

    pub async fn dry_run_cost(&self, sql: &str) -> Result<i64, WarehouseError> {
        self.backend.dry_run_cost(sql).await
    }

    pub async fn execute(&self, sql: &str) -> Result<ResultTable, WarehouseError> {
        self.backend.execute(sql).await
    }
}
