use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::{PageID, Result, StoreError, PAGE_DATA_SIZE, RECORDS_PER_PAGE, RECORD_SIZE};

/// The heap data file: a raw concatenation of fixed-size record slots,
/// with no headers, directory, or checksums. The file is opened fresh for
/// every read and write, so a simulated crash leaves no descriptor state
/// behind.
pub struct HeapFile {
    path: PathBuf,
    record_count: u64,
}

impl HeapFile {
    /// Opens the data file, creating it empty if missing. The byte length
    /// must be a multiple of the record size; anything else means the file
    /// was damaged outside the engine.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let size = file.metadata()?.len();
        if size % RECORD_SIZE as u64 != 0 {
            return Err(StoreError::CorruptedFile(format!(
                "size {} is not a multiple of the record size {}",
                size, RECORD_SIZE
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            record_count: size / RECORD_SIZE as u64,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live records. May exceed the persisted count while dirty
    /// pages have not been flushed.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn set_record_count(&mut self, count: u64) {
        self.record_count = count;
    }

    pub fn increment_record_count(&mut self) {
        self.record_count += 1;
    }

    /// Re-derives the record count from the file size on disk. Used after
    /// a crash, when the in-memory count is gone.
    pub fn refresh_record_count(&mut self) -> Result<u64> {
        let size = std::fs::metadata(&self.path)?.len();
        self.record_count = size / RECORD_SIZE as u64;
        Ok(self.record_count)
    }

    /// Reads one page worth of records. Pages past the end of the file, or
    /// short tails, read as zeros.
    pub fn read_page(&self, page_id: PageID) -> Result<Vec<u8>> {
        let mut data = vec![0u8; PAGE_DATA_SIZE];
        let offset = page_id.0 * PAGE_DATA_SIZE as u64;
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if offset >= len {
            return Ok(data);
        }
        file.seek(SeekFrom::Start(offset))?;
        let available = (len - offset).min(PAGE_DATA_SIZE as u64) as usize;
        file.read_exact(&mut data[..available])?;
        Ok(data)
    }

    /// Writes a page back, bounded by the record count: only slots below
    /// `record_count` reach the disk. A tail page never writes its unused
    /// slots and a page wholly past the count writes nothing, so the file
    /// size always stays a multiple of the record size.
    pub fn write_page(&self, page_id: PageID, data: &[u8]) -> Result<()> {
        let start_record = page_id.0 * RECORDS_PER_PAGE as u64;
        if start_record >= self.record_count {
            return Ok(());
        }
        let records_on_page =
            (self.record_count - start_record).min(RECORDS_PER_PAGE as u64) as usize;
        let bytes = records_on_page * RECORD_SIZE;
        let mut file = OpenOptions::new().write(true).create(true).open(&self.path)?;
        file.seek(SeekFrom::Start(start_record * RECORD_SIZE as u64))?;
        file.write_all(&data[..bytes])?;
        Ok(())
    }
}
