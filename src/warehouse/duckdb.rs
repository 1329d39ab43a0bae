use crate::config::WarehouseConfig;
use crate::table::{CellValue, Column, ColumnKind, ResultTable};
use crate::warehouse::{ColumnInfo, TableRef, TableSchema, Warehouse, WarehouseError};
use async_trait::async_trait;
use chrono::DateTime;
use duckdb::types::ValueRef;
use duckdb::Connection;
use r2d2::{ManageConnection, Pool};
use regex::Regex;
use tracing::debug;

pub struct DuckDbConnectionManager {
    connection_string: String,
}

impl DuckDbConnectionManager {
    pub fn new(connection_string: String) -> Self {
        Self { connection_string }
    }
}

impl ManageConnection for DuckDbConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        Connection::open(&self.connection_string)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Local development backend: the fixed table loaded into a DuckDB file.
/// Scan-cost dry runs are a hosted-warehouse facility and are reported as
/// unsupported here, which the cost stage surfaces as "estimate unavailable".
pub struct DuckDbWarehouse {
    pool: Pool<DuckDbConnectionManager>,
}

impl DuckDbWarehouse {
    pub fn new(config: &WarehouseConfig) -> Result<Self, WarehouseError> {
        let connection_string = config.connection_string.clone().ok_or_else(|| {
            WarehouseError::ConfigError(
                "connection_string is required for the DuckDB backend".to_string(),
            )
        })?;

        let manager = DuckDbConnectionManager::new(connection_string);
        let pool = Pool::builder()
            .max_size(config.pool_size as u32)
            .build(manager)
            .map_err(|e| WarehouseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool })
    }
}

/// Generated SQL references the warehouse-qualified `project.dataset.table`;
/// against the local file only the bare table name resolves.
fn localize_table_refs(sql: &str) -> String {
    let sql = sql.replace('`', "");
    let re = Regex::new(r#"["']?[A-Za-z0-9_\-]+["']?\.["']?[A-Za-z0-9_]+["']?\.["']?([A-Za-z0-9_]+)["']?"#)
        .expect("valid regex");
    re.replace_all(&sql, "\"$1\"").to_string()
}

fn decode_value_ref(value: ValueRef<'_>) -> (CellValue, Option<ColumnKind>) {
    match value {
        ValueRef::Null => (CellValue::Null, None),
        ValueRef::Boolean(b) => (CellValue::Bool(b), Some(ColumnKind::Categorical)),
        ValueRef::TinyInt(v) => (CellValue::Int(v as i64), Some(ColumnKind::Numeric)),
        ValueRef::SmallInt(v) => (CellValue::Int(v as i64), Some(ColumnKind::Numeric)),
        ValueRef::Int(v) => (CellValue::Int(v as i64), Some(ColumnKind::Numeric)),
        ValueRef::BigInt(v) => (CellValue::Int(v), Some(ColumnKind::Numeric)),
        ValueRef::HugeInt(v) => (CellValue::Int(v as i64), Some(ColumnKind::Numeric)),
        ValueRef::UTinyInt(v) => (CellValue::Int(v as i64), Some(ColumnKind::Numeric)),
        ValueRef::USmallInt(v) => (CellValue::Int(v as i64), Some(ColumnKind::Numeric)),
        ValueRef::UInt(v) => (CellValue::Int(v as i64), Some(ColumnKind::Numeric)),
        ValueRef::UBigInt(v) => (CellValue::Int(v as i64), Some(ColumnKind::Numeric)),
        ValueRef::Float(v) => (CellValue::Float(v as f64), Some(ColumnKind::Numeric)),
        ValueRef::Double(v) => (CellValue::Float(v), Some(ColumnKind::Numeric)),
        ValueRef::Timestamp(unit, raw) => {
            let micros = match unit {
                duckdb::types::TimeUnit::Second => raw.saturating_mul(1_000_000),
                duckdb::types::TimeUnit::Millisecond => raw.saturating_mul(1_000),
                duckdb::types::TimeUnit::Microsecond => raw,
                duckdb::types::TimeUnit::Nanosecond => raw / 1_000,
            };
            let text = DateTime::from_timestamp_micros(micros)
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| raw.to_string());
            (CellValue::Text(text), Some(ColumnKind::Temporal))
        }
        ValueRef::Date32(days) => {
            let text = DateTime::from_timestamp(days as i64 * 86_400, 0)
                .map(|ts| ts.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| days.to_string());
            (CellValue::Text(text), Some(ColumnKind::Temporal))
        }
        ValueRef::Text(bytes) => (
            CellValue::Text(String::from_utf8_lossy(bytes).to_string()),
            Some(ColumnKind::Categorical),
        ),
        other => (
            CellValue::Text(format!("{:?}", other)),
            Some(ColumnKind::Categorical),
        ),
    }
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    async fn fetch_table_schema(&self, table: &TableRef) -> Result<TableSchema, WarehouseError> {
        let pool = self.pool.clone();
        let table_name = table.table.clone();

        let columns = tokio::task::spawn_blocking(move || -> Result<Vec<ColumnInfo>, WarehouseError> {
            let conn = pool
                .get()
                .map_err(|e| WarehouseError::ConnectionError(e.to_string()))?;

            let mut stmt = conn
                .prepare(&format!("PRAGMA table_info(\"{}\")", table_name))
                .map_err(|e| WarehouseError::QueryError(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(ColumnInfo {
                        name: row.get::<_, String>(1)?,
                        field_type: row.get::<_, String>(2)?,
                    })
                })
                .map_err(|e| WarehouseError::QueryError(e.to_string()))?;

            Ok(rows.filter_map(Result::ok).collect())
        })
        .await
        .map_err(|e| WarehouseError::QueryError(e.to_string()))??;

        if columns.is_empty() {
            return Err(WarehouseError::QueryError(format!(
                "Table '{}' not found in the local database",
                table.table
            )));
        }

        Ok(TableSchema {
            table: table.table.clone(),
            columns,
        })
    }

    async fn dry_run_cost(&self, _sql: &str) -> Result<i64, WarehouseError> {
        Err(WarehouseError::Unsupported(
            "DuckDB has no bytes-scanned dry run".to_string(),
        ))
    }

    async fn execute(&self, sql: &str) -> Result<ResultTable, WarehouseError> {
        let pool = self.pool.clone();
        let local_sql = localize_table_refs(sql);
        debug!("Localized SQL: {}", local_sql);

        let table = tokio::task::spawn_blocking(move || -> Result<ResultTable, WarehouseError> {
            let conn = pool
                .get()
                .map_err(|e| WarehouseError::ConnectionError(e.to_string()))?;

            let mut stmt = conn
                .prepare(&local_sql)
                .map_err(|e| WarehouseError::QueryError(e.to_string()))?;

            let column_count = stmt.column_count();
            let mut names: Vec<String> = Vec::with_capacity(column_count);
            for i in 0..column_count {
                match stmt.column_name(i) {
                    Ok(name) => names.push(name.to_string()),
                    Err(_) => names.push(format!("column_{}", i)),
                }
            }

            let mut rows = stmt
                .query([])
                .map_err(|e| WarehouseError::QueryError(e.to_string()))?;

            let mut kinds: Vec<Option<ColumnKind>> = vec![None; names.len()];
            let mut cells: Vec<Vec<CellValue>> = Vec::new();

            while let Some(row) = rows
                .next()
                .map_err(|e| WarehouseError::QueryError(e.to_string()))?
            {
                let mut decoded = Vec::with_capacity(names.len());
                for i in 0..names.len() {
                    let value = row
                        .get_ref(i)
                        .map_err(|e| WarehouseError::QueryError(e.to_string()))?;
                    let (cell, kind) = decode_value_ref(value);
                    if kinds[i].is_none() {
                        kinds[i] = kind;
                    }
                    decoded.push(cell);
                }
                cells.push(decoded);
            }

            let columns = names
                .into_iter()
                .zip(kinds)
                .map(|(name, kind)| Column {
                    name,
                    kind: kind.unwrap_or(ColumnKind::Categorical),
                })
                .collect();

            Ok(ResultTable::new(columns, cells))
        })
        .await
        .map_err(|e| WarehouseError::QueryError(e.to_string()))??;

        Ok(table)
    }
}
