//! Writing outputs so that a failed run never leaves a partial file behind.
//!
//! Bytes go to a temporary file next to the destination, which is renamed
//! into place only on commit. Dropping a staged output deletes it.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Output written to a temporary file, not yet visible at its destination.
#[derive(Debug)]
pub struct StagedOutput {
    file: NamedTempFile,
    path: PathBuf,
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write `bytes` to a temporary file in the destination's directory.
///
/// A destination that is a directory is refused here, before anything
/// gets committed.
pub fn stage(path: &Path, bytes: &[u8]) -> Result<StagedOutput> {
    if path.is_dir() {
        return Err(Error::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "destination is a directory"),
        ));
    }
    let mut file = NamedTempFile::new_in(parent_dir(path)).map_err(|e| Error::io(path, e))?;
    file.write_all(bytes).map_err(|e| Error::io(path, e))?;
    file.flush().map_err(|e| Error::io(path, e))?;
    debug!("staged {} bytes for {}", bytes.len(), path.display());
    Ok(StagedOutput {
        file,
        path: path.to_path_buf(),
    })
}

impl StagedOutput {
    /// Move the staged file to its destination.
    pub fn commit(self) -> Result<PathBuf> {
        let path = self.path;
        self.file
            .persist(&path)
            .map_err(|e| Error::io(&path, e.error))?;
        Ok(path)
    }
}

/// Commit several staged outputs as a unit.
///
/// If any commit fails, the outputs already moved into place are removed
/// again, so either all destinations are written or none are.
pub fn commit_all(staged: Vec<StagedOutput>) -> Result<Vec<PathBuf>> {
    let mut committed: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for output in staged {
        match output.commit() {
            Ok(path) => committed.push(path),
            Err(e) => {
                for path in &committed {
                    if let Err(remove_err) = std::fs::remove_file(path) {
                        warn!("could not remove {}: {}", path.display(), remove_err);
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(committed)
}

/// Stage and commit in one step.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    stage(path, bytes)?.commit()
}
