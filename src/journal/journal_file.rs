use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::common::Result;

use super::LogEntry;

/// The transaction journal: an in-memory staging list in front of an
/// append-only file. Staged entries reach the file in generation order and
/// only through `flush` (commit, rollback) or `append_durable`
/// (checkpoint), so the file is always a prefix of the entries the engine
/// decided to make durable.
pub struct Journal {
    path: PathBuf,
    staged: Vec<LogEntry>,
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            File::create(path)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            staged: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stages an entry; it reaches the file on the next `flush`.
    pub fn append(&mut self, entry: LogEntry) {
        self.staged.push(entry);
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Appends every staged entry to the journal file, in order, then
    /// clears the staging list.
    pub fn flush(&mut self) -> Result<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        for entry in &self.staged {
            writeln!(file, "{}", entry.serialize())?;
        }
        file.sync_all()?;
        self.staged.clear();
        Ok(())
    }

    /// Writes one entry straight to the file, bypassing the staging list.
    /// Used for checkpoints, which must be durable immediately.
    pub fn append_durable(&mut self, entry: &LogEntry) -> Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        writeln!(file, "{}", entry.serialize())?;
        file.sync_all()?;
        Ok(())
    }

    /// Drops staged entries that never reached the file. This is what a
    /// crash does to them.
    pub fn discard_staged(&mut self) {
        self.staged.clear();
    }

    /// Reads and parses every entry in the journal file. Blank lines are
    /// skipped; malformed lines are errors.
    pub fn read_entries(&self) -> Result<Vec<LogEntry>> {
        let file = File::open(&self.path)?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(LogEntry::deserialize(&line)?);
        }
        Ok(entries)
    }

    /// Truncates the journal file. Test hook; the engine itself never
    /// rewrites the journal.
    pub fn clear(&mut self) -> Result<()> {
        File::create(&self.path)?;
        Ok(())
    }
}
