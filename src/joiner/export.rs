//! Serializes a joined table to a downloadable artifact.
//!
//! The spreadsheet has one worksheet with a bold header row and no index
//! column; cells of the first column carry the plain `0` number format.

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::info;

use crate::constants::{DEFAULT_CSV_DELIMITER, DEFAULT_SHEET_NAME, FIRST_COLUMN_NUM_FORMAT};
use crate::error::Result;
use crate::metrics;
use crate::types::{Cell, JoinedTable, OutputArtifact, OutputFormat};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub sheet_name: String,
    pub csv_delimiter: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            csv_delimiter: DEFAULT_CSV_DELIMITER as u8,
        }
    }
}

pub fn export(
    table: &JoinedTable,
    stub: &str,
    format: OutputFormat,
    options: &ExportOptions,
) -> Result<OutputArtifact> {
    let bytes = match format {
        OutputFormat::Xlsx => to_xlsx(table, &options.sheet_name)?,
        OutputFormat::Csv => to_csv(table, options.csv_delimiter)?,
    };
    let file_name = format.file_name(stub);
    metrics::artifact_exported(format.extension(), bytes.len());
    info!(file_name = %file_name, bytes = bytes.len(), "exported joined table");
    Ok(OutputArtifact {
        file_name,
        format,
        bytes,
    })
}

pub fn to_xlsx(table: &JoinedTable, sheet_name: &str) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let first_column_format = Format::new().set_num_format(FIRST_COLUMN_NUM_FORMAT);

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name)?;
        write_headers(sheet, &table.columns, &header_format)?;

        for (i, row) in table.rows.iter().enumerate() {
            for (c, cell) in row.cells.iter().enumerate() {
                let (r, col) = cell_position(i + 1, c)?;
                let format = (col == 0).then_some(&first_column_format);
                write_cell(sheet, r, col, cell, format)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Worksheet coordinates for a table position; out-of-range indices are an
/// error rather than a wrapped cast.
fn cell_position(row: usize, col: usize) -> std::result::Result<(u32, u16), XlsxError> {
    let row = u32::try_from(row).map_err(|_| XlsxError::RowColumnLimitError)?;
    let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
    Ok((row, col))
}

fn write_headers(sheet: &mut Worksheet, headers: &[String], format: &Format) -> std::result::Result<(), XlsxError> {
    for (c, header) in headers.iter().enumerate() {
        let (row, col) = cell_position(0, c)?;
        sheet.write_string_with_format(row, col, header, format)?;
    }
    Ok(())
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    format: Option<&Format>,
) -> std::result::Result<(), XlsxError> {
    match (cell, format) {
        (Cell::Missing, _) => {}
        (Cell::Int(i), Some(f)) => {
            sheet.write_number_with_format(row, col, *i as f64, f)?;
        }
        (Cell::Int(i), None) => {
            sheet.write_number(row, col, *i as f64)?;
        }
        (Cell::Float(v), Some(f)) if v.is_finite() => {
            sheet.write_number_with_format(row, col, *v, f)?;
        }
        (Cell::Float(v), None) if v.is_finite() => {
            sheet.write_number(row, col, *v)?;
        }
        // Excel has no representation for NaN or infinities
        (Cell::Float(v), _) => {
            sheet.write_string(row, col, v.to_string())?;
        }
        (Cell::Text(s), Some(f)) => {
            sheet.write_string_with_format(row, col, s, f)?;
        }
        (Cell::Text(s), None) => {
            sheet.write_string(row, col, s)?;
        }
    }
    Ok(())
}

pub fn to_csv(table: &JoinedTable, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.cells.iter().map(|c| c.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| crate::error::JoinerError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joiner::reader::parse_text;
    use crate::types::Row;
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
    use std::io::Cursor;

    fn table() -> JoinedTable {
        JoinedTable {
            columns: vec!["Id".into(), "Name".into(), "Price".into()],
            rows: vec![
                Row {
                    index: 0,
                    cells: vec![
                        Cell::Int(1001),
                        Cell::Text("bolt, zinc".into()),
                        Cell::Float(2.5),
                    ],
                },
                Row {
                    index: 1,
                    cells: vec![Cell::Int(1002), Cell::Text("nut".into()), Cell::Int(3)],
                },
            ],
        }
    }

    #[test]
    fn artifact_is_named_after_stub() {
        let artifact = export(&table(), "A", OutputFormat::Xlsx, &ExportOptions::default()).unwrap();
        assert_eq!(artifact.file_name, "A_joined.xlsx");
        assert_eq!(
            artifact.content_type(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );

        let artifact = export(&table(), "A", OutputFormat::Csv, &ExportOptions::default()).unwrap();
        assert_eq!(artifact.file_name, "A_joined.csv");
    }

    #[test]
    fn workbook_has_single_sheet_with_rows() {
        let bytes = to_xlsx(&table(), "Sheet1").unwrap();
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Sheet1".to_string()]);

        let range = workbook.worksheet_range("Sheet1").unwrap();
        let rows: Vec<&[Data]> = range.rows().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], Data::String("Id".into()));
        assert_eq!(rows[0][2], Data::String("Price".into()));
        assert_eq!(rows[1][1], Data::String("bolt, zinc".into()));
        assert_eq!(rows[1][2], Data::Float(2.5));
        assert_eq!(rows[2][2], Data::Float(3.0));
    }

    #[test]
    fn csv_has_header_and_no_index() {
        let bytes = to_csv(&table(), b',').unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "Id,Name,Price\n1001,\"bolt, zinc\",2.5\n1002,nut,3\n");
    }

    #[test]
    fn csv_reparses_to_same_table() {
        let original = table();
        let bytes = to_csv(&original, b',').unwrap();
        let reparsed = parse_text("out.csv", &String::from_utf8(bytes).unwrap(), b',').unwrap();
        assert_eq!(reparsed.columns, original.columns);
        let cells: Vec<Vec<Cell>> = original.rows.into_iter().map(|r| r.cells).collect();
        assert_eq!(reparsed.rows, cells);
    }

    fn xlsx_part(bytes: &[u8], name: &str) -> String {
        use std::io::Read;

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut xml = String::new();
        part.read_to_string(&mut xml).unwrap();
        xml
    }

    /// Value of `attr` on the element starting at `start`
    fn attr<'a>(xml: &'a str, start: usize, attr: &str) -> Option<&'a str> {
        let tag = &xml[start..start + xml[start..].find('>')?];
        let key = format!(" {attr}=\"");
        let from = tag.find(&key)? + key.len();
        Some(&tag[from..from + tag[from..].find('"')?])
    }

    /// numFmtId of the cell style applied to cell `r`, if any
    fn cell_num_fmt<'a>(sheet: &str, styles: &'a str, r: &str) -> Option<&'a str> {
        let cell = sheet.find(&format!("<c r=\"{r}\""))?;
        let style: usize = attr(sheet, cell, "s")?.parse().ok()?;
        let xfs_start = styles.find("<cellXfs")?;
        let xfs = &styles[xfs_start..xfs_start + styles[xfs_start..].find("</cellXfs>")?];
        let offset = xfs.match_indices("<xf ").nth(style)?.0;
        attr(styles, xfs_start + offset, "numFmtId")
    }

    #[test]
    fn only_first_column_cells_use_plain_number_format() {
        let bytes = to_xlsx(&table(), "Sheet1").unwrap();
        let styles = xlsx_part(&bytes, "xl/styles.xml");
        let sheet = xlsx_part(&bytes, "xl/worksheets/sheet1.xml");

        let fmt_start = styles.find("formatCode=\"0\"").expect("format 0 registered");
        let fmt_tag = styles[..fmt_start].rfind("<numFmt ").unwrap();
        let fmt_id = attr(&styles, fmt_tag, "numFmtId").unwrap();

        for r in ["A2", "A3"] {
            assert_eq!(cell_num_fmt(&sheet, &styles, r), Some(fmt_id), "{r}");
        }
        for r in ["A1", "B1", "B2", "C2", "B3", "C3"] {
            assert_ne!(cell_num_fmt(&sheet, &styles, r), Some(fmt_id), "{r}");
        }
    }

    #[test]
    fn positions_past_sheet_limits_are_errors() {
        assert_eq!(cell_position(3, 2).unwrap(), (3, 2));
        assert!(matches!(
            cell_position(0, 70_000),
            Err(XlsxError::RowColumnLimitError)
        ));
        assert!(cell_position(0, u16::MAX as usize + 1).is_err());
    }

    #[test]
    fn too_many_columns_fail_instead_of_wrapping() {
        let columns: Vec<String> = (0..70_000).map(|c| format!("c{c}")).collect();
        let table = JoinedTable {
            rows: vec![Row {
                index: 0,
                cells: vec![Cell::Int(1); columns.len()],
            }],
            columns,
        };
        let err = to_xlsx(&table, "Sheet1").unwrap_err();
        assert!(matches!(err, crate::error::JoinerError::Xlsx(_)));
    }
}
