//! Defaults shared by the config layer, the core and the callers.

// Input
pub const DEFAULT_ENCODING: &str = "utf-16";
pub const DEFAULT_DELIMITER: char = '\t';
pub const DEFAULT_EXTENSIONS: [&str; 2] = ["csv", "tsv"];

/// Cell texts read as missing values
pub const NA_MARKERS: [&str; 19] = [
    "", "NA", "N/A", "n/a", "#NA", "#N/A", "#N/A N/A", "<NA>", "NaN", "-NaN", "nan", "-nan",
    "1.#QNAN", "-1.#QNAN", "1.#IND", "-1.#IND", "null", "NULL", "None",
];

// Normalization
pub const DEFAULT_DROP_COLUMN: &str = "#";
pub const MISSING_FILL: i64 = 0;

// Output
pub const JOINED_SUFFIX: &str = "_joined";
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
pub const DEFAULT_CSV_DELIMITER: char = ',';
pub const DEFAULT_OUTPUT_DIR: &str = "output";
/// Excel number format applied to the first column
pub const FIRST_COLUMN_NUM_FORMAT: &str = "0";

// Server
pub const DEFAULT_PORT: u16 = 8501;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_METRICS_PORT: u16 = 9898;

// Logging
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const LOG_FILE_NAME: &str = "file_joiner.log";

// Environment
pub const CONFIG_ENV_VAR: &str = "JOINER_CONFIG";
pub const METRICS_PORT_ENV_VAR: &str = "JOINER_METRICS_PORT";
pub const DEFAULT_CONFIG_FILE: &str = "joiner.toml";

/// Characters trimmed from the end of a common prefix when suggesting a stub
pub const STUB_TRIM_CHARS: [char; 4] = ['.', '_', '-', ' '];
