use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

use super::reader::{read_file, FileTable, ReadOptions};
use crate::error::Result;
use crate::metrics;
use crate::types::{Cell, InputFile, JoinedTable, Row};

/// Reads every file and concatenates their rows in upload order.
///
/// Any unreadable file fails the whole merge.
#[instrument(skip(files, options), fields(files = files.len()))]
pub fn merge(files: &[InputFile], options: &ReadOptions) -> Result<JoinedTable> {
    let mut tables = Vec::with_capacity(files.len());
    for file in files {
        let table = read_file(file, options)?;
        metrics::file_read(file.content.len());
        tables.push(table);
    }
    let joined = concat(tables);
    metrics::rows_joined(joined.row_count());
    info!(
        rows = joined.row_count(),
        columns = joined.columns.len(),
        "merged input files"
    );
    Ok(joined)
}

/// Aligns columns by name (first-seen order) and stacks the rows.
/// A column missing from one file is filled with missing cells for its rows.
pub fn concat(tables: Vec<FileTable>) -> JoinedTable {
    let mut columns: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for table in &tables {
        for column in &table.columns {
            if !positions.contains_key(column) {
                positions.insert(column.clone(), columns.len());
                columns.push(column.clone());
            }
        }
    }

    let width = columns.len();
    let mut rows = Vec::with_capacity(tables.iter().map(|t| t.rows.len()).sum());
    for table in tables {
        if table.columns.len() != width {
            warn!(
                file = %table.name,
                "file has {} of {} joined columns",
                table.columns.len(),
                width
            );
        }
        let targets: Vec<usize> = table.columns.iter().map(|c| positions[c]).collect();
        debug!(file = %table.name, rows = table.rows.len(), "appending rows");
        for (index, cells) in table.rows.into_iter().enumerate() {
            let mut aligned = vec![Cell::Missing; width];
            for (cell, &target) in cells.into_iter().zip(&targets) {
                aligned[target] = cell;
            }
            rows.push(Row {
                index,
                cells: aligned,
            });
        }
    }

    JoinedTable { columns, rows }
}
