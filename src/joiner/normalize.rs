//! Cleaning pass over a joined table.
//!
//! Rules, applied in order:
//! 1. missing cells become the integer `0`
//! 2. the drop column (`#` by default) is removed; when it is absent the
//!    tolerant policy does nothing and the strict policy fails
//! 3. row indices are optionally renumbered `0..n`
//! 4. a float holding a whole number within `i64` range becomes that integer;
//!    every other cell is left as it is

use tracing::{debug, warn};

use crate::config::{DropPolicy, NormalizeConfig};
use crate::constants::MISSING_FILL;
use crate::error::{JoinerError, Result};
use crate::types::{Cell, JoinedTable};

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub drop_column: String,
    pub drop_policy: DropPolicy,
    pub reset_index: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeConfig::default().into()
    }
}

impl From<NormalizeConfig> for NormalizeOptions {
    fn from(config: NormalizeConfig) -> Self {
        Self {
            drop_column: config.drop_column,
            drop_policy: config.drop_policy,
            reset_index: config.reset_index,
        }
    }
}

pub fn normalize(mut table: JoinedTable, options: &NormalizeOptions) -> Result<JoinedTable> {
    fill_missing(&mut table);
    drop_column(&mut table, &options.drop_column, options.drop_policy)?;
    if options.reset_index {
        reset_index(&mut table);
    }
    let converted = integerize(&mut table);
    debug!(converted, "whole floats converted to integers");
    Ok(table)
}

fn fill_missing(table: &mut JoinedTable) {
    for cell in table.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
        if cell.is_missing() {
            *cell = Cell::Int(MISSING_FILL);
        }
    }
}

fn drop_column(table: &mut JoinedTable, column: &str, policy: DropPolicy) -> Result<()> {
    match table.column_index(column) {
        Some(idx) => {
            table.columns.remove(idx);
            for row in &mut table.rows {
                row.cells.remove(idx);
            }
            Ok(())
        }
        None => match policy {
            DropPolicy::Tolerant => {
                warn!(column, "drop column not present, leaving table as is");
                Ok(())
            }
            DropPolicy::Strict => Err(JoinerError::MissingColumn {
                column: column.to_string(),
            }),
        },
    }
}

fn reset_index(table: &mut JoinedTable) {
    for (i, row) in table.rows.iter_mut().enumerate() {
        row.index = i;
    }
}

fn integerize(table: &mut JoinedTable) -> usize {
    let mut converted = 0;
    for cell in table.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
        if let Some(i) = cell.as_whole_int() {
            *cell = Cell::Int(i);
            converted += 1;
        }
    }
    converted
}
