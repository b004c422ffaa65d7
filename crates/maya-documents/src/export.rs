//! Per-session spreadsheet export — one flattened persona row per ended chat.
//!
//! The xlsx writer cannot re-open workbooks, so accumulated rows live in a
//! sidecar JSON log and the workbook is rebuilt from it on every export.

use std::path::PathBuf;

use rust_xlsxwriter::Workbook;
use serde_json::{Map, Value};
use tracing::{debug, info};

use maya_core::error::{MayaError, Result};

/// Flatten nested JSON into a single level. Nested keys are joined with the
/// separator; lists are JSON-encoded as strings.
pub fn flatten_json(value: &Value, parent_key: &str, separator: &str) -> Map<String, Value> {
    let mut items = Map::new();
    let Some(map) = value.as_object() else {
        return items;
    };

    for (key, value) in map {
        let new_key = if parent_key.is_empty() {
            key.clone()
        } else {
            format!("{parent_key}{separator}{key}")
        };

        match value {
            Value::Object(_) => {
                items.extend(flatten_json(value, &new_key, separator));
            }
            Value::Array(list) => {
                items.insert(new_key, Value::String(Value::Array(list.clone()).to_string()));
            }
            other => {
                items.insert(new_key, other.clone());
            }
        }
    }
    items
}

pub struct SheetExporter {
    sheet_path: PathBuf,
    rows_path: PathBuf,
}

impl SheetExporter {
    pub fn new(sheet_path: impl Into<PathBuf>, rows_path: impl Into<PathBuf>) -> Self {
        Self {
            sheet_path: sheet_path.into(),
            rows_path: rows_path.into(),
        }
    }

    /// Append one flattened document row and rewrite the workbook.
    /// Blocking file I/O; call from a blocking context.
    pub fn append(&self, doc: &Value) -> Result<()> {
        let mut rows = self.load_rows()?;
        rows.push(flatten_json(doc, "", "_"));

        let data = serde_json::to_string(&rows)?;
        std::fs::write(&self.rows_path, data)?;

        self.write_workbook(&rows)?;
        info!(
            rows = rows.len(),
            sheet = %self.sheet_path.display(),
            "Session row exported"
        );
        Ok(())
    }

    fn load_rows(&self) -> Result<Vec<Map<String, Value>>> {
        if !self.rows_path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.rows_path)?;
        let rows: Vec<Map<String, Value>> = serde_json::from_str(&data)?;
        Ok(rows)
    }

    fn write_workbook(&self, rows: &[Map<String, Value>]) -> Result<()> {
        // Union of columns across all rows, stable order.
        let mut columns: Vec<String> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, name) in columns.iter().enumerate() {
            worksheet
                .write_string(0, col as u16, name)
                .map_err(|e| MayaError::Document(e.to_string()))?;
        }

        for (i, row) in rows.iter().enumerate() {
            for (col, name) in columns.iter().enumerate() {
                let text = match row.get(name) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                if !text.is_empty() {
                    worksheet
                        .write_string((i + 1) as u32, col as u16, &text)
                        .map_err(|e| MayaError::Document(e.to_string()))?;
                }
            }
        }

        workbook
            .save(&self.sheet_path)
            .map_err(|e| MayaError::Document(e.to_string()))?;
        debug!(columns = columns.len(), "Workbook rebuilt");
        Ok(())
    }
}
