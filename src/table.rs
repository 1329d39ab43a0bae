use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Broad column classification used by the chart stages.
///
/// Derived once from the warehouse schema when a result table is
/// materialized, so downstream code never has to sniff raw type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Categorical,
    Numeric,
    Temporal,
}

impl ColumnKind {
    /// Maps a warehouse type string (BigQuery or DuckDB spelling) to a kind.
    pub fn from_field_type(field_type: &str) -> Self {
        match field_type.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT64" | "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" | "TINYINT"
            | "SMALLINT" | "INT" | "BIGINT" | "HUGEINT" | "UTINYINT" | "USMALLINT" | "UINTEGER"
            | "UBIGINT" | "REAL" | "DOUBLE" | "DECIMAL" => ColumnKind::Numeric,
            "TIMESTAMP" | "DATE" | "DATETIME" | "TIME" | "TIMESTAMP WITH TIME ZONE"
            | "TIMESTAMPTZ" => ColumnKind::Temporal,
            _ => ColumnKind::Categorical,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Categorical => write!(f, "categorical"),
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Temporal => write!(f, "temporal"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// A single cell of a result table.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => json!(b),
            CellValue::Int(i) => json!(i),
            CellValue::Float(f) => json!(f),
            CellValue::Text(s) => json!(s),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Rectangular query result: named, kinded columns and row-major cells.
#[derive(Debug, Clone)]
pub struct ResultTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultTable {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Names of all columns of the given kind, in table order.
    pub fn columns_of_kind(&self, kind: ColumnKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Drops every row that contains at least one null cell.
    ///
    /// Partial rows are unusable for both insight text and charting, so the
    /// executor discards them wholesale before anything downstream sees the
    /// table. Lossy, and intentionally so.
    pub fn drop_null_rows(mut self) -> Self {
        self.rows.retain(|row| !row.iter().any(CellValue::is_null));
        self
    }

    /// Drops rows that are null in any of the named columns. Unknown column
    /// names are ignored.
    pub fn drop_rows_null_in(&self, columns: &[&str]) -> Vec<Vec<CellValue>> {
        let indexes: Vec<usize> = columns
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();

        self.rows
            .iter()
            .filter(|row| indexes.iter().all(|&i| !row[i].is_null()))
            .cloned()
            .collect()
    }

    /// First `n` rows as JSON objects keyed by column name, for LLM prompts.
    pub fn head_records(&self, n: usize) -> Vec<Value> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (col, cell) in self.columns.iter().zip(row.iter()) {
                    obj.insert(col.name.clone(), cell.to_json());
                }
                Value::Object(obj)
            })
            .collect()
    }

    /// First `n` rows rendered as an aligned text block, the shape the chart
    /// selector prompt expects.
    pub fn head_text(&self, n: usize) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.name.len()).collect();
        let shown: Vec<&Vec<CellValue>> = self.rows.iter().take(n).collect();

        for row in &shown {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.to_string().len());
            }
        }

        let mut out = String::new();
        for (i, col) in self.columns.iter().enumerate() {
            out.push_str(&format!("{:<width$}  ", col.name, width = widths[i]));
        }
        out.push('\n');

        for row in shown {
            for (i, cell) in row.iter().enumerate() {
                out.push_str(&format!("{:<width$}  ", cell.to_string(), width = widths[i]));
            }
            out.push('\n');
        }
        out
    }

    /// One `name: kind` line per column, the dtype description the chart
    /// selector prompt expects.
    pub fn kinds_text(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{}: {}", c.name, c.kind))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All rows as JSON objects, for the HTTP response body.
    pub fn to_json_records(&self) -> Vec<Value> {
        self.head_records(self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ResultTable {
        ResultTable::new(
            vec![
                Column {
                    name: "neighborhood".to_string(),
                    kind: ColumnKind::Categorical,
                },
                Column {
                    name: "requests".to_string(),
                    kind: ColumnKind::Numeric,
                },
            ],
            vec![
                vec![CellValue::Text("Mission".to_string()), CellValue::Int(1200)],
                vec![CellValue::Null, CellValue::Int(900)],
                vec![CellValue::Text("Sunset".to_string()), CellValue::Null],
                vec![CellValue::Text("Bayview".to_string()), CellValue::Int(640)],
            ],
        )
    }

    #[test]
    fn drop_null_rows_removes_partial_rows() {
        let table = sample_table().drop_null_rows();
        assert_eq!(table.row_count(), 2);
        for row in &table.rows {
            assert!(row.iter().all(|cell| !cell.is_null()));
        }
    }

    #[test]
    fn drop_null_rows_can_empty_a_table() {
        let table = ResultTable::new(
            vec![Column {
                name: "value".to_string(),
                kind: ColumnKind::Numeric,
            }],
            vec![vec![CellValue::Null], vec![CellValue::Null]],
        );
        assert!(table.drop_null_rows().is_empty());
    }

    #[test]
    fn column_kind_mapping_covers_both_backends() {
        assert_eq!(ColumnKind::from_field_type("STRING"), ColumnKind::Categorical);
        assert_eq!(ColumnKind::from_field_type("VARCHAR"), ColumnKind::Categorical);
        assert_eq!(ColumnKind::from_field_type("INT64"), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_field_type("double"), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_field_type("TIMESTAMP"), ColumnKind::Temporal);
        assert_eq!(ColumnKind::from_field_type("GEOGRAPHY"), ColumnKind::Categorical);
    }

    #[test]
    fn head_records_are_keyed_by_column() {
        let table = sample_table();
        let records = table.head_records(1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["neighborhood"], "Mission");
        assert_eq!(records[0]["requests"], 1200);
    }

    #[test]
    fn head_text_contains_header_and_rows() {
        let table = sample_table();
        let text = table.head_text(2);
        assert!(text.contains("neighborhood"));
        assert!(text.contains("Mission"));
        assert!(!text.contains("Bayview"));
    }
}
