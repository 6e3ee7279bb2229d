//! The join itself: naming check, merge, normalization and export.
//!
//! Everything here is synchronous and works on in-memory inputs; callers
//! (the CLI and the upload server) own reading and delivering bytes.

pub mod export;
pub mod merge;
pub mod naming;
pub mod normalize;
pub mod reader;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::{JoinerError, Result};
use crate::metrics;
use crate::types::{InputFile, JoinedTable, OutputArtifact, OutputFormat};

pub use export::{export, ExportOptions};
pub use merge::merge;
pub use naming::{common_prefix, naming_report, validate_naming, CommonPrefix, NamingReport};
pub use normalize::{normalize, NormalizeOptions};
pub use reader::ReadOptions;

/// One join request: the uploaded files plus what the user chose
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub files: Vec<InputFile>,
    /// Overrides the suggested stub when set and non-blank
    pub stub: Option<String>,
    /// Overrides the configured output format when set
    pub format: Option<OutputFormat>,
}

/// Result of a join run
#[derive(Debug, Serialize)]
pub struct JoinSummary {
    pub prefix: String,
    pub stub: String,
    pub file_count: usize,
    pub matching_count: usize,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub file_name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct JoinOutcome {
    pub table: JoinedTable,
    pub artifact: OutputArtifact,
    pub summary: JoinSummary,
}

pub struct Joiner {
    read: ReadOptions,
    normalize: NormalizeOptions,
    export: ExportOptions,
    extensions: Vec<String>,
    default_format: OutputFormat,
}

impl Default for Joiner {
    fn default() -> Self {
        Self {
            read: ReadOptions::default(),
            normalize: NormalizeOptions::default(),
            export: ExportOptions::default(),
            extensions: crate::constants::DEFAULT_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            default_format: OutputFormat::Xlsx,
        }
    }
}

impl Joiner {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            read: ReadOptions::from_config(&config.input)?,
            normalize: config.normalize.clone().into(),
            export: ExportOptions {
                sheet_name: config.output.sheet_name.clone(),
                csv_delimiter: config.output.csv_delimiter as u8,
            },
            extensions: config
                .input
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            default_format: config.output.format,
        })
    }

    pub fn with_normalize_options(mut self, options: NormalizeOptions) -> Self {
        self.normalize = options;
        self
    }

    pub fn normalize_options(&self) -> &NormalizeOptions {
        &self.normalize
    }

    /// Rejects files whose extension is not in the allowed list
    pub fn check_extensions(&self, files: &[InputFile]) -> Result<()> {
        for file in files {
            let allowed = file
                .extension()
                .map(|ext| self.extensions.contains(&ext))
                .unwrap_or(false);
            if !allowed {
                return Err(JoinerError::UnsupportedExtension {
                    file: file.name.clone(),
                    allowed: self.extensions.join(", "),
                });
            }
        }
        Ok(())
    }

    /// Naming check only, used to pre-fill the stub before joining
    pub fn inspect(&self, files: &[InputFile], stub: Option<&str>) -> Result<NamingReport> {
        self.check_extensions(files)?;
        naming_report(files, stub)
    }

    /// Runs naming check, merge, normalization and export to completion.
    #[instrument(skip(self, request), fields(files = request.files.len()))]
    pub fn run(&self, request: JoinRequest) -> Result<JoinOutcome> {
        let started = Instant::now();
        let outcome = self.run_inner(request);
        match &outcome {
            Ok(o) => {
                metrics::join_duration(started.elapsed().as_secs_f64());
                info!(
                    file_name = %o.summary.file_name,
                    rows = o.summary.row_count,
                    "join finished"
                );
            }
            Err(e) => {
                metrics::join_failed(failure_reason(e));
                warn!("join rejected: {}", e);
            }
        }
        outcome
    }

    fn run_inner(&self, request: JoinRequest) -> Result<JoinOutcome> {
        let JoinRequest {
            files,
            stub,
            format,
        } = request;

        // Step 1: naming convention
        let common = validate_naming(&files)?;
        self.check_extensions(&files)?;
        let stub = stub
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| common.stub.clone());
        let matching_count = files.iter().filter(|f| f.name.starts_with(&stub)).count();
        if matching_count != files.len() {
            warn!(
                stub = %stub,
                "{} of {} files start with the chosen stub",
                matching_count,
                files.len()
            );
        }
        info!(prefix = %common.prefix, stub = %stub, "naming check passed");

        // Step 2: merge
        let joined = merge(&files, &self.read)?;

        // Step 3: normalize
        let table = normalize(joined, &self.normalize)?;

        // Step 4: export
        let format = format.unwrap_or(self.default_format);
        let artifact = export(&table, &stub, format, &self.export)?;

        let summary = JoinSummary {
            prefix: common.prefix,
            stub,
            file_count: files.len(),
            matching_count,
            row_count: table.row_count(),
            columns: table.columns.clone(),
            file_name: artifact.file_name.clone(),
            joined_at: Utc::now(),
        };

        Ok(JoinOutcome {
            table,
            artifact,
            summary,
        })
    }
}

fn failure_reason(error: &JoinerError) -> &'static str {
    match error {
        JoinerError::TooFewFiles { .. } => "too_few_files",
        JoinerError::NoCommonPrefix => "no_common_prefix",
        JoinerError::UnsupportedExtension { .. } => "unsupported_extension",
        JoinerError::Decode { .. } => "decode",
        JoinerError::Parse { .. } | JoinerError::EmptyInput { .. } => "parse",
        JoinerError::MissingColumn { .. } => "missing_column",
        _ => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DropPolicy;
    use crate::joiner::reader::tests::utf16le;
    use crate::types::Cell;

    fn request(files: Vec<InputFile>) -> JoinRequest {
        JoinRequest {
            files,
            stub: None,
            format: None,
        }
    }

    fn sample_files() -> Vec<InputFile> {
        vec![
            InputFile::new("A.tsv", utf16le("#\tSKU\tQty\n1\t1001\t4\n2\t1002\t\n")),
            InputFile::new(
                "A.extra.tsv",
                utf16le("#\tSKU\tQty\n1\t1003\t1.0\n2\t1004\t2.5\n3\t1005\t7\n"),
            ),
        ]
    }

    #[test]
    fn joins_two_files_into_workbook() {
        let outcome = Joiner::default().run(request(sample_files())).unwrap();
        assert_eq!(outcome.summary.prefix, "A.");
        assert_eq!(outcome.summary.stub, "A");
        assert_eq!(outcome.summary.row_count, 5);
        assert_eq!(outcome.artifact.file_name, "A_joined.xlsx");
        assert_eq!(outcome.table.columns, vec!["SKU", "Qty"]);
        assert!(!outcome.table.has_missing());

        let qty = outcome.table.column("Qty").unwrap();
        assert_eq!(
            qty,
            vec![
                &Cell::Int(4),
                &Cell::Int(0),
                &Cell::Int(1),
                &Cell::Float(2.5),
                &Cell::Int(7)
            ]
        );
        let indices: Vec<usize> = outcome.table.rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn user_stub_and_format_win() {
        let mut req = request(sample_files());
        req.stub = Some("  inventory ".into());
        req.format = Some(OutputFormat::Csv);
        let outcome = Joiner::default().run(req).unwrap();
        assert_eq!(outcome.artifact.file_name, "inventory_joined.csv");
        assert_eq!(outcome.summary.matching_count, 0);
    }

    #[test]
    fn blank_stub_falls_back_to_suggestion() {
        let mut req = request(sample_files());
        req.stub = Some("   ".into());
        let outcome = Joiner::default().run(req).unwrap();
        assert_eq!(outcome.summary.stub, "A");
    }

    #[test]
    fn single_file_is_rejected() {
        let files = vec![InputFile::new("A.tsv", utf16le("x\n1\n"))];
        let err = Joiner::default().run(request(files)).unwrap_err();
        assert!(matches!(err, JoinerError::TooFewFiles { count: 1 }));
    }

    #[test]
    fn unrelated_names_are_rejected() {
        let files = vec![
            InputFile::new("foo.tsv", utf16le("x\n1\n")),
            InputFile::new("bar.tsv", utf16le("x\n2\n")),
        ];
        let err = Joiner::default().run(request(files)).unwrap_err();
        assert!(matches!(err, JoinerError::NoCommonPrefix));
    }

    #[test]
    fn other_extensions_are_rejected() {
        let files = vec![
            InputFile::new("A.tsv", utf16le("x\n1\n")),
            InputFile::new("A.xlsx", utf16le("x\n2\n")),
        ];
        let err = Joiner::default().run(request(files)).unwrap_err();
        assert!(matches!(err, JoinerError::UnsupportedExtension { ref file, .. } if file == "A.xlsx"));
    }

    #[test]
    fn strict_drop_policy_from_config() {
        let mut config = Config::default();
        config.normalize.drop_policy = DropPolicy::Strict;
        let joiner = Joiner::from_config(&config).unwrap();
        let files = vec![
            InputFile::new("A.tsv", utf16le("x\n1\n")),
            InputFile::new("A.b.tsv", utf16le("x\n2\n")),
        ];
        let err = joiner.run(request(files)).unwrap_err();
        assert!(matches!(err, JoinerError::MissingColumn { .. }));
    }

    #[test]
    fn inspect_reports_counts() {
        let report = Joiner::default().inspect(&sample_files(), None).unwrap();
        assert_eq!(report.prefix, "A.");
        assert_eq!(report.suggested_stub, "A");
        assert_eq!(report.file_count, 2);
        assert_eq!(report.matching_count, 2);
    }
}
