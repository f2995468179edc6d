//! File system utilities.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

use regex::Regex;

use crate::error::Result;

/// Ensure a directory exists
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Create each file (and its parent directories) if it does not exist yet.
/// Existing files are left untouched.
pub fn ensure_files<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<()> {
    for path in paths {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
    }
    Ok(())
}

/// Read a file, treating a missing file as empty.
pub fn read_or_empty(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Replace a file's content (write to temp, then rename).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Delete regular files in `dir` last modified more than `max_age_days` ago.
///
/// With a `pattern`, only files whose name matches are considered. Returns
/// the number of files removed.
pub fn prune_old_files(dir: &Path, max_age_days: u64, pattern: Option<&Regex>) -> Result<usize> {
    let max_age = Duration::from_secs(max_age_days * 24 * 3600);
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() || meta.modified()? >= cutoff {
            continue;
        }
        let name = entry.file_name();
        if let Some(re) = pattern {
            if !re.is_match(&name.to_string_lossy()) {
                continue;
            }
        }
        log::debug!("Removing old file {}", entry.path().display());
        fs::remove_file(entry.path())?;
        removed += 1;
    }
    Ok(removed)
}
