use csv::ReaderBuilder;
use encoding_rs::Encoding;
use std::collections::HashMap;
use tracing::debug;

use crate::config::InputConfig;
use crate::error::{JoinerError, Result};
use crate::types::{Cell, InputFile};

/// How input bytes are turned into a table
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub encoding: &'static Encoding,
    pub delimiter: u8,
}

impl ReadOptions {
    pub fn from_config(config: &InputConfig) -> Result<Self> {
        let encoding = Encoding::for_label(config.encoding.as_bytes()).ok_or_else(|| {
            JoinerError::Config(format!("Unknown input encoding '{}'", config.encoding))
        })?;
        let delimiter = u8::try_from(config.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                JoinerError::Config("Input delimiter must be a single ASCII character".into())
            })?;
        Ok(Self {
            encoding,
            delimiter,
        })
    }

    pub fn utf8_csv() -> Self {
        Self {
            encoding: encoding_rs::UTF_8,
            delimiter: b',',
        }
    }
}

impl Default for ReadOptions {
    /// UTF-16 (BOM-sniffed, little-endian otherwise), tab separated
    fn default() -> Self {
        Self {
            encoding: encoding_rs::UTF_16LE,
            delimiter: b'\t',
        }
    }
}

/// One decoded and parsed input file
#[derive(Debug, Clone, PartialEq)]
pub struct FileTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Decodes `file.content`, failing on any malformed byte sequence.
///
/// A BOM overrides the configured encoding, the same way it would for a
/// browser or a spreadsheet application.
pub fn decode(file: &InputFile, encoding: &'static Encoding) -> Result<String> {
    let (text, used, had_errors) = encoding.decode(&file.content);
    if had_errors {
        return Err(JoinerError::Decode {
            file: file.name.clone(),
            encoding: used.name().to_string(),
        });
    }
    debug!(file = %file.name, encoding = used.name(), "decoded input");
    Ok(text.into_owned())
}

/// Reads one file into a header and typed rows.
///
/// Rows shorter than the header are padded with missing cells; longer rows
/// are a parse error. Blank lines are skipped.
pub fn read_file(file: &InputFile, options: &ReadOptions) -> Result<FileTable> {
    let text = decode(file, options.encoding)?;
    parse_text(&file.name, &text, options.delimiter)
}

pub fn parse_text(name: &str, text: &str, delimiter: u8) -> Result<FileTable> {
    let parse_err = |e: csv::Error| JoinerError::Parse {
        file: name.to_string(),
        message: e.to_string(),
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(parse_err)?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(JoinerError::EmptyInput {
            file: name.to_string(),
        });
    }
    let columns = dedupe_headers(headers.iter());
    let width = columns.len();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(parse_err)?;
        if record.len() > width {
            return Err(JoinerError::Parse {
                file: name.to_string(),
                message: format!(
                    "row {} has {} fields, header has {}",
                    i + 1,
                    record.len(),
                    width
                ),
            });
        }
        let mut cells: Vec<Cell> = record.iter().map(Cell::parse).collect();
        cells.resize(width, Cell::Missing);
        rows.push(cells);
    }

    debug!(file = %name, columns = width, rows = rows.len(), "parsed input");
    Ok(FileTable {
        name: name.to_string(),
        columns,
        rows,
    })
}

/// Renames repeated header names to `name.1`, `name.2`, ...
fn dedupe_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<String> = Vec::new();
    for header in headers {
        let mut name = header.to_string();
        while let Some(count) = seen.get_mut(&name) {
            *count += 1;
            name = format!("{header}.{count}");
        }
        seen.insert(name.clone(), 0);
        out.push(name);
    }
    out
}
