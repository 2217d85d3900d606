/// Row Set Module
///
/// An in-memory tabular result: column names plus rows of owned values.
/// Values stay typed (not pre-formatted) because row mapping and scalar
/// returns need to coerce them.
pub use rusqlite::types::Value;

/// Result of a query or procedure call.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Rows of data, one value per column
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        RowSet { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name, if the result contains it.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at (row, column name), if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// Formats a value for display and logging.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(t) => t.clone(),
        Value::Blob(b) => format!("<BLOB: {} bytes>", b.len()),
    }
}
