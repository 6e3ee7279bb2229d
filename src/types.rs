use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{JOINED_SUFFIX, NA_MARKERS};
use crate::error::JoinerError;

/// One uploaded file contributing rows to the join
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Lower-cased extension of the file name, if any
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// A single table value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Missing,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Types a raw field: NA markers are missing, then integer, then float, then text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if NA_MARKERS.contains(&trimmed) {
            return Cell::Missing;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            // f64 parsing accepts any spelling of nan
            if f.is_nan() {
                return Cell::Missing;
            }
            return Cell::Float(f);
        }
        Cell::Text(raw.to_string())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Whole-valued finite float that fits in an i64
    pub fn as_whole_int(&self) -> Option<i64> {
        match self {
            Cell::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
                if *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// One joined row; `index` is the row number it carried when read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub index: usize,
    pub cells: Vec<Cell>,
}

/// Rows of all input files under one aligned header
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl JoinedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r.cells[idx]).collect())
    }

    pub fn has_missing(&self) -> bool {
        self.rows.iter().any(|r| r.cells.iter().any(Cell::is_missing))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            OutputFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    /// `{stub}_joined.{ext}`, with path separators in the stub replaced
    pub fn file_name(&self, stub: &str) -> String {
        let safe: String = stub
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        format!("{safe}{JOINED_SUFFIX}.{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = JoinerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(OutputFormat::Xlsx),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(JoinerError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Downloadable result of a join
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub file_name: String,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

impl OutputArtifact {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}
