//! Disk side of the CLI: loading inputs and writing the artifact.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{JoinerError, Result};
use crate::types::{InputFile, OutputArtifact};

const PART_SUFFIX: &str = ".part";

/// Reads each path fully; the file name (not the path) becomes the input name.
pub fn load_inputs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<InputFile>> {
    paths
        .iter()
        .map(|p| -> Result<InputFile> {
            let path = p.as_ref();
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    JoinerError::Config(format!("'{}' is not a file path", path.display()))
                })?
                .to_string();
            let content = fs::read(path)?;
            debug!(file = %name, bytes = content.len(), "loaded input");
            Ok(InputFile::new(name, content))
        })
        .collect()
}

/// Writes the artifact into `dir` through a `.part` file renamed into place,
/// so a failed write never leaves a truncated artifact behind.
pub fn write_artifact(dir: &Path, artifact: &OutputArtifact) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let final_path = dir.join(&artifact.file_name);
    let part_path = dir.join(format!("{}{}", artifact.file_name, PART_SUFFIX));

    if let Err(e) = fs::write(&part_path, &artifact.bytes) {
        let _ = fs::remove_file(&part_path);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&part_path, &final_path) {
        let _ = fs::remove_file(&part_path);
        return Err(e.into());
    }
    info!(path = %final_path.display(), "wrote artifact");
    Ok(final_path)
}
