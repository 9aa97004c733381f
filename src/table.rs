//! In-memory tables as exported by the CRIM analysis toolkit.
//!
//! Wide tables (n-grams, durations) arrive as pandas `orient="split"` JSON.
//! Relationship and observation exports arrive as arrays of nested objects,
//! which we flatten into dotted column names (`model_observation.ema`).

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing required column `{0}`")]
    MissingColumn(String),
    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("Index has {index} entries but data has {rows} rows")]
    IndexLength { index: usize, rows: usize },
    #[error("Non-numeric index value at row {0}")]
    NonNumericIndex(usize),
    #[error("Expected a JSON array of records")]
    NotRecords,
}

pub type Result<T> = std::result::Result<T, SchemaError>;

/// Read a whole file, tagging I/O failures with the path.
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Conversion from a JSON cell to a typed cell. `None` means missing.
pub trait CellValue: Sized {
    fn from_json(value: &Value) -> Option<Self>;
}

impl CellValue for String {
    fn from_json(value: &Value) -> Option<Self> {
        scalar_to_string(value)
    }
}

impl CellValue for f64 {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }
}

/// Render a scalar cell as text the way a string-typed column would hold it.
/// Null, arrays and objects are treated as missing.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// pandas `orient="split"` layout, before validation.
#[derive(Debug, Deserialize)]
struct SplitFrame {
    columns: Vec<Value>,
    index: Vec<Value>,
    data: Vec<Vec<Value>>,
}

/// A table whose rows are indexed by a numeric offset and whose columns are
/// voice names.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable<T> {
    index: Vec<f64>,
    columns: Vec<String>,
    data: Vec<Vec<Option<T>>>,
}

/// Per-voice pattern strings, one row per offset.
pub type NgramTable = WideTable<String>;

/// Per-voice n-gram durations, same shape as the matching [`NgramTable`].
pub type DurationTable = WideTable<f64>;

impl<T> WideTable<T> {
    pub fn new(index: Vec<f64>, columns: Vec<String>, data: Vec<Vec<Option<T>>>) -> Result<Self> {
        if index.len() != data.len() {
            return Err(SchemaError::IndexLength {
                index: index.len(),
                rows: data.len(),
            });
        }
        for (row, cells) in data.iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(SchemaError::RaggedRow {
                    row,
                    found: cells.len(),
                    expected: columns.len(),
                });
            }
        }
        Ok(Self {
            index,
            columns,
            data,
        })
    }

    pub fn index(&self) -> &[f64] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count(), self.column_count())
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&T> {
        self.data.get(row)?.get(column)?.as_ref()
    }

    /// Non-missing cells in row-major order (the order pandas `stack()` uses).
    pub fn stacked(&self) -> impl Iterator<Item = &T> {
        self.data.iter().flat_map(|row| row.iter().flatten())
    }
}

impl<T: CellValue> WideTable<T> {
    /// Parse a pandas `orient="split"` JSON document.
    pub fn from_split_json(json: &str) -> Result<Self> {
        let frame: SplitFrame = serde_json::from_str(json)?;

        let columns = frame
            .columns
            .iter()
            .map(|c| scalar_to_string(c).unwrap_or_default())
            .collect();

        let index = frame
            .index
            .iter()
            .enumerate()
            .map(|(row, v)| f64::from_json(v).ok_or(SchemaError::NonNumericIndex(row)))
            .collect::<Result<Vec<f64>>>()?;

        let data = frame
            .data
            .iter()
            .map(|row| row.iter().map(T::from_json).collect())
            .collect();

        Self::new(index, columns, data)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_split_json(&read_file(path)?)
    }
}

/// One flattened record: dotted column name → cell value.
pub type Record = BTreeMap<String, Value>;

/// A flat, column-addressed table of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    rows: Vec<Record>,
}

impl RecordTable {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    /// Parse a JSON array of objects, flattening nested objects into dotted
    /// column names.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Array(items) = value else {
            return Err(SchemaError::NotRecords);
        };

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let Value::Object(map) = item else {
                return Err(SchemaError::NotRecords);
            };
            let mut record = Record::new();
            flatten_into(&mut record, "", map);
            rows.push(record);
        }
        Ok(Self { rows })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_json(&read_file(path)?)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.rows.iter().any(|r| r.contains_key(column))
    }

    /// Fail with the first missing column. An empty table has nothing to
    /// traverse and passes.
    pub fn require(&self, columns: &[&str]) -> Result<()> {
        if self.rows.is_empty() {
            return Ok(());
        }
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(SchemaError::MissingColumn(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Text value of a cell, or `None` if absent or null.
    pub fn text(&self, row: usize, column: &str) -> Option<String> {
        self.rows.get(row)?.get(column).and_then(scalar_to_string)
    }
}

fn flatten_into(record: &mut Record, prefix: &str, map: Map<String, Value>) {
    for (key, value) in map {
        let column = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => flatten_into(record, &column, inner),
            other => {
                record.insert(column, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_json_ngrams() {
        let json = r#"{
            "columns": ["Superius", "Tenor"],
            "index": [0.0, 4.0],
            "data": [["7, 2", null], ["-3, 2", "7, 2"]]
        }"#;
        let t = NgramTable::from_split_json(json).unwrap();
        assert_eq!(t.shape(), (2, 2));
        assert_eq!(t.columns(), &["Superius".to_string(), "Tenor".to_string()]);
        assert_eq!(t.index(), &[0.0, 4.0]);
        assert_eq!(t.cell(0, 0).map(String::as_str), Some("7, 2"));
        assert_eq!(t.cell(0, 1), None);
        let stacked: Vec<&String> = t.stacked().collect();
        assert_eq!(stacked, vec!["7, 2", "-3, 2", "7, 2"]);
    }

    #[test]
    fn test_split_json_durations_accept_numeric_strings() {
        let json = r#"{"columns": ["A"], "index": ["10"], "data": [["2.5"]]}"#;
        let t = DurationTable::from_split_json(json).unwrap();
        assert_eq!(t.index(), &[10.0]);
        assert_eq!(t.cell(0, 0), Some(&2.5));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let json = r#"{"columns": ["A", "B"], "index": [0], "data": [["x"]]}"#;
        let err = NgramTable::from_split_json(json).unwrap_err();
        assert!(matches!(err, SchemaError::RaggedRow { row: 0, found: 1, expected: 2 }));
    }

    #[test]
    fn test_non_numeric_index_rejected() {
        let json = r#"{"columns": ["A"], "index": ["m1"], "data": [["x"]]}"#;
        let err = NgramTable::from_split_json(json).unwrap_err();
        assert!(matches!(err, SchemaError::NonNumericIndex(0)));
    }

    #[test]
    fn test_records_flatten_to_dotted_columns() {
        let json = r#"[{
            "id": 12,
            "relationship_type": "Quotation",
            "model_observation": {"ema": "1-4/1,2", "piece": {"piece_id": "CRIM_Model_0001"}}
        }]"#;
        let t = RecordTable::from_json(json).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.text(0, "model_observation.ema").as_deref(), Some("1-4/1,2"));
        assert_eq!(
            t.text(0, "model_observation.piece.piece_id").as_deref(),
            Some("CRIM_Model_0001")
        );
        assert_eq!(t.text(0, "id").as_deref(), Some("12"));
        assert!(t.has_column("relationship_type"));
        assert!(!t.has_column("model_observation"));
    }

    #[test]
    fn test_require_reports_missing_column() {
        let t = RecordTable::from_json(r#"[{"url": "x"}]"#).unwrap();
        assert!(t.require(&["url"]).is_ok());
        match t.require(&["url", "id"]) {
            Err(SchemaError::MissingColumn(c)) => assert_eq!(c, "id"),
            other => panic!("expected missing column, got {other:?}"),
        }
        assert!(RecordTable::default().require(&["id"]).is_ok());
    }

    #[test]
    fn test_records_reject_non_array() {
        assert!(matches!(
            RecordTable::from_json(r#"{"id": 1}"#),
            Err(SchemaError::NotRecords)
        ));
    }
}
