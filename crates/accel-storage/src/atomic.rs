//! Staging and sealing helpers shared by both writers.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use accel_core::naming::tmp_path_for;
use tracing::debug;

use crate::error::{PersistenceError, Result};

/// First final path in `dir` not already taken by a sealed file.
///
/// `name` maps a collision sequence (0 = none) to a file name.
pub(crate) fn available_path(dir: &Path, name: impl Fn(u32) -> String) -> PathBuf {
    let mut sequence = 0;
    loop {
        let candidate = dir.join(name(sequence));
        if !candidate.exists() {
            return candidate;
        }
        debug!(path = %candidate.display(), "Final name taken, adding sequence suffix");
        sequence += 1;
    }
}

/// Create the staging file for `final_path`.
pub(crate) fn create_staging(final_path: &Path) -> Result<(PathBuf, BufWriter<File>)> {
    let tmp_path = tmp_path_for(final_path);
    let file = File::create(&tmp_path).map_err(|source| PersistenceError::Create {
        path: tmp_path.clone(),
        source,
    })?;
    Ok((tmp_path, BufWriter::new(file)))
}

/// Flush, sync, close, then rename `tmp_path` to `final_path`.
pub(crate) fn seal(mut writer: BufWriter<File>, tmp_path: &Path, final_path: &Path) -> Result<()> {
    writer.flush().map_err(|source| PersistenceError::Flush {
        path: tmp_path.to_path_buf(),
        source,
    })?;
    let file = writer
        .into_inner()
        .map_err(|e| PersistenceError::Flush {
            path: tmp_path.to_path_buf(),
            source: e.into_error(),
        })?;
    file.sync_all().map_err(|source| PersistenceError::Sync {
        path: tmp_path.to_path_buf(),
        source,
    })?;
    drop(file);

    fs::rename(tmp_path, final_path).map_err(|source| PersistenceError::Rename {
        from: tmp_path.to_path_buf(),
        to: final_path.to_path_buf(),
        source,
    })
}

/// Best-effort removal of an abandoned staging file.
pub(crate) fn discard(tmp_path: &Path) {
    if let Err(e) = fs::remove_file(tmp_path) {
        debug!(path = %tmp_path.display(), error = %e, "Could not remove abandoned staging file");
    }
}
