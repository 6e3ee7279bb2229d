use serde::Serialize;

use crate::constants::STUB_TRIM_CHARS;
use crate::error::{JoinerError, Result};
use crate::types::InputFile;

/// Longest leading substring shared by all file names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonPrefix {
    pub prefix: String,
    /// Prefix without trailing separators, used to name the output
    pub stub: String,
}

impl CommonPrefix {
    fn new(prefix: String) -> Self {
        let trimmed = prefix.trim_end_matches(STUB_TRIM_CHARS.as_slice());
        let stub = if trimmed.is_empty() {
            prefix.clone()
        } else {
            trimmed.to_string()
        };
        Self { prefix, stub }
    }
}

/// Naming summary shown before a join is started
#[derive(Debug, Clone, Serialize)]
pub struct NamingReport {
    pub prefix: String,
    pub suggested_stub: String,
    pub file_count: usize,
    /// Files whose name starts with the stub being checked
    pub matching_count: usize,
}

/// Character-wise longest common prefix of `names`.
pub fn common_prefix<S: AsRef<str>>(names: &[S]) -> String {
    let Some((first, rest)) = names.split_first() else {
        return String::new();
    };
    let first = first.as_ref();
    let mut end = first.len();
    for name in rest {
        let common: usize = first
            .char_indices()
            .zip(name.as_ref().chars())
            .take_while(|((_, a), b)| a == b)
            .map(|((_, a), _)| a.len_utf8())
            .sum();
        end = end.min(common);
    }
    first[..end].to_string()
}

/// Requires at least two files sharing a non-empty name prefix.
pub fn validate_naming(files: &[InputFile]) -> Result<CommonPrefix> {
    if files.len() < 2 {
        return Err(JoinerError::TooFewFiles { count: files.len() });
    }
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    let prefix = common_prefix(&names);
    if prefix.is_empty() {
        return Err(JoinerError::NoCommonPrefix);
    }
    Ok(CommonPrefix::new(prefix))
}

/// Validates naming and counts how many names start with `stub`
/// (the suggested stub when `None`).
pub fn naming_report(files: &[InputFile], stub: Option<&str>) -> Result<NamingReport> {
    let common = validate_naming(files)?;
    let checked = stub.unwrap_or(&common.stub);
    let matching_count = files.iter().filter(|f| f.name.starts_with(checked)).count();
    Ok(NamingReport {
        prefix: common.prefix,
        suggested_stub: common.stub,
        file_count: files.len(),
        matching_count,
    })
}
