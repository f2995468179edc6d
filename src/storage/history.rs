//! History archive of reported links.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;

/// Append-only text file with one timestamped block per reporting run.
#[derive(Debug, Clone)]
pub struct HistoryArchive {
    path: PathBuf,
}

impl HistoryArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, links: &[String]) -> Result<()> {
        self.append_at(links, Local::now())
    }

    /// Append `YYYY-MM-DD HH:MM:SS`, then `\n– <link>` per link, then a blank line.
    pub fn append_at(&self, links: &[String], now: DateTime<Local>) -> Result<()> {
        let mut block = now.format("%Y-%m-%d %H:%M:%S").to_string();
        for link in links {
            block.push_str("\n– ");
            block.push_str(link);
        }
        block.push_str("\n\n");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())?;
        log::debug!("Archived {} link(s) to {}", links.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn appends_blocks() {
        let tmp = TempDir::new().unwrap();
        let archive = HistoryArchive::new(tmp.path().join("history.txt"));
        let t1 = Local.with_ymd_and_hms(2026, 3, 1, 9, 5, 7).unwrap();
        let t2 = Local.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();

        archive
            .append_at(&["https://a/1".into(), "https://a/2".into()], t1)
            .unwrap();
        archive.append_at(&["https://a/3".into()], t2).unwrap();

        assert_eq!(
            fs::read_to_string(archive.path()).unwrap(),
            "2026-03-01 09:05:07\n– https://a/1\n– https://a/2\n\n\
             2026-03-02 10:00:00\n– https://a/3\n\n"
        );
    }
}
