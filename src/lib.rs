pub mod config;
pub mod constants;
pub mod error;
pub mod files;
pub mod joiner;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod types;

pub use error::{JoinerError, Result};
pub use joiner::{JoinOutcome, JoinRequest, Joiner};
pub use types::{Cell, InputFile, JoinedTable, OutputArtifact, OutputFormat};
