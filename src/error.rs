use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JoinerError {
    #[error("At least 2 files are required, got {count}")]
    TooFewFiles { count: usize },

    #[error("The file names do not share a common prefix")]
    NoCommonPrefix,

    #[error("Unsupported file extension for '{file}' (allowed: {allowed})")]
    UnsupportedExtension { file: String, allowed: String },

    #[error("Could not decode '{file}' as {encoding}")]
    Decode { file: String, encoding: String },

    #[error("Could not parse '{file}': {message}")]
    Parse { file: String, message: String },

    #[error("'{file}' has no header row")]
    EmptyInput { file: String },

    #[error("Column '{column}' is not present in the joined table")]
    MissingColumn { column: String },

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JoinerError>;

/// What a user sees when a join is rejected or fails.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
}

impl JoinerError {
    /// True when the failure comes from the uploaded files or the request,
    /// not from the machine doing the join.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            JoinerError::TooFewFiles { .. }
                | JoinerError::NoCommonPrefix
                | JoinerError::UnsupportedExtension { .. }
                | JoinerError::Decode { .. }
                | JoinerError::Parse { .. }
                | JoinerError::EmptyInput { .. }
                | JoinerError::MissingColumn { .. }
                | JoinerError::UnknownFormat(_)
        )
    }

    pub fn to_presentation(&self) -> ErrorPresentation {
        let (title, message) = match self {
            JoinerError::TooFewFiles { .. } => (
                "Not Enough Files",
                "Please upload more than one file to perform the join.".to_string(),
            ),
            JoinerError::NoCommonPrefix => (
                "No Common Prefix",
                "The files do not have the same prefix. Please upload files with the same prefix."
                    .to_string(),
            ),
            JoinerError::UnsupportedExtension { .. } => ("Unsupported File", self.to_string()),
            JoinerError::Decode { .. } => ("Invalid File Encoding", self.to_string()),
            JoinerError::Parse { .. } | JoinerError::EmptyInput { .. } => {
                ("Invalid File", self.to_string())
            }
            JoinerError::MissingColumn { .. } => ("Missing Column", self.to_string()),
            JoinerError::UnknownFormat(_) => ("Unknown Format", self.to_string()),
            _ => (
                "Unexpected Error",
                "Something went wrong while joining the files. Please try again.".to_string(),
            ),
        };
        ErrorPresentation {
            title: title.to_string(),
            message,
        }
    }
}
