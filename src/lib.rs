pub mod buffer;
pub mod common;
pub mod heap;
pub mod journal;
pub mod recovery;
pub mod transaction;

pub use buffer::{BufferManager, PageFrame};
pub use common::{
    PageID, RecordID, RecordImage, Result, StoreError, TransactionID, PAGE_DATA_SIZE, PAGE_SIZE,
    RECORDS_PER_PAGE, RECORD_SIZE,
};
pub use heap::HeapFile;
pub use journal::{Journal, LogEntry};
pub use recovery::RecoveryManager;
pub use transaction::TransactionManager;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::info;

use crate::common::{decode_record, encode_payload};
use crate::heap::{page_of, record_offset};

/// A single-file storage engine for fixed-size records: a paged heap file,
/// a pinned buffer pool, record-level locking with before-image reads, a
/// write-ahead journal, and UNDO/REDO crash recovery with checkpoints.
///
/// The journal file lives next to the data file, at the data path with
/// `.log` appended. All operations are serialized; at most one transaction
/// is open at a time.
pub struct Database {
    buffer: Arc<Mutex<BufferManager>>,
    journal: Arc<Mutex<Journal>>,
    transactions: TransactionManager,
    recovery: RecoveryManager,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data_path = path.as_ref();
        let mut journal_path = OsString::from(data_path.as_os_str());
        journal_path.push(".log");
        let journal_path = PathBuf::from(journal_path);

        let heap = HeapFile::open(data_path)?;
        let buffer = Arc::new(Mutex::new(BufferManager::new(heap)));
        let journal = Arc::new(Mutex::new(Journal::open(&journal_path)?));
        let transactions = TransactionManager::new(Arc::clone(&buffer), Arc::clone(&journal));
        let recovery = RecoveryManager::new(Arc::clone(&buffer), Arc::clone(&journal));

        Ok(Self {
            buffer,
            journal,
            transactions,
            recovery,
        })
    }

    pub fn buffer_manager(&self) -> Arc<Mutex<BufferManager>> {
        Arc::clone(&self.buffer)
    }

    pub fn journal(&self) -> Arc<Mutex<Journal>> {
        Arc::clone(&self.journal)
    }

    /// Appends a record, assigning it the next record id. The page is only
    /// modified in memory; durability comes from a later force, checkpoint,
    /// or committed journal entry.
    pub fn insert_record(&mut self, data: &str) -> Result<RecordID> {
        self.insert_internal(data, false)
    }

    /// Appends a record and forces its page to disk, unless the page is
    /// transactional and a transaction is open.
    pub fn insert_record_sync(&mut self, data: &str) -> Result<RecordID> {
        self.insert_internal(data, true)
    }

    fn insert_internal(&mut self, data: &str, sync: bool) -> Result<RecordID> {
        let record = encode_payload(data)?;
        let in_tx = self.transactions.in_transaction();

        let mut buffer = self.buffer.lock().unwrap();
        let record_id = RecordID(buffer.heap().record_count());
        let page_id = page_of(record_id);
        let offset = record_offset(record_id);

        let frame = buffer.fix(page_id)?;
        let modified = (|| {
            frame.lock().unwrap().data_mut()[offset..offset + RECORD_SIZE]
                .copy_from_slice(&record);
            buffer.use_page(page_id, in_tx)
        })();
        buffer.unfix(page_id)?;
        modified?;

        if let Some(tx_id) = self.transactions.current_tx_id() {
            self.journal.lock().unwrap().append(LogEntry::Insert {
                tx_id,
                record_id,
                after: record,
                count_snapshot: record_id.0,
            });
        }
        buffer.heap_mut().increment_record_count();
        if sync {
            buffer.force(page_id, in_tx)?;
        }
        Ok(record_id)
    }

    /// Reads a record. Inside a transaction, a record this transaction has
    /// updated reads back as its pre-transaction value from the snapshot;
    /// everything else reads the live page.
    pub fn read_record(&mut self, record_id: RecordID) -> Result<String> {
        let mut buffer = self.buffer.lock().unwrap();
        if record_id.0 >= buffer.heap().record_count() {
            return Err(StoreError::OutOfBounds(record_id.0));
        }
        let page_id = page_of(record_id);
        let offset = record_offset(record_id);

        if self.transactions.in_transaction() && self.transactions.is_locked(record_id) {
            if let Some(snapshot) = self.transactions.before_image(page_id) {
                return Ok(decode_record(snapshot, offset));
            }
        }

        let frame = buffer.fix(page_id)?;
        let value = decode_record(frame.lock().unwrap().data(), offset);
        buffer.unfix(page_id)?;
        Ok(value)
    }

    /// Overwrites an existing record in place. Inside a transaction this
    /// snapshots the page on first touch, locks the record, and stages an
    /// UPDATE journal entry carrying both images. Updating a record this
    /// transaction already locked is refused.
    pub fn update_record(&mut self, record_id: RecordID, data: &str) -> Result<()> {
        let mut buffer = self.buffer.lock().unwrap();
        if record_id.0 >= buffer.heap().record_count() {
            return Err(StoreError::OutOfBounds(record_id.0));
        }
        let record = encode_payload(data)?;
        if self.transactions.is_locked(record_id) {
            return Err(StoreError::RecordLocked(record_id.0));
        }
        let in_tx = self.transactions.in_transaction();
        let page_id = page_of(record_id);
        let offset = record_offset(record_id);

        let frame = buffer.fix(page_id)?;
        let modified = (|| {
            let mut before = [0u8; RECORD_SIZE];
            {
                let mut frame = frame.lock().unwrap();
                before.copy_from_slice(&frame.data()[offset..offset + RECORD_SIZE]);
                if in_tx {
                    self.transactions.snapshot_page(page_id, frame.data());
                    self.transactions.lock_record(record_id);
                }
                frame.data_mut()[offset..offset + RECORD_SIZE].copy_from_slice(&record);
            }
            buffer.use_page(page_id, in_tx)?;
            if let Some(tx_id) = self.transactions.current_tx_id() {
                self.journal.lock().unwrap().append(LogEntry::Update {
                    tx_id,
                    record_id,
                    before,
                    after: record,
                });
            }
            Ok(())
        })();
        buffer.unfix(page_id)?;
        modified
    }

    pub fn is_locked(&self, record_id: RecordID) -> bool {
        self.transactions.is_locked(record_id)
    }

    /// Decoded records actually stored on a page; empty past the end.
    pub fn get_page(&mut self, page_id: PageID) -> Result<Vec<String>> {
        let mut buffer = self.buffer.lock().unwrap();
        let record_count = buffer.heap().record_count();
        let start_record = page_id.0 * RECORDS_PER_PAGE as u64;
        if start_record >= record_count {
            return Ok(Vec::new());
        }
        let records_on_page = (record_count - start_record).min(RECORDS_PER_PAGE as u64) as usize;

        let frame = buffer.fix(page_id)?;
        let records = {
            let frame = frame.lock().unwrap();
            (0..records_on_page)
                .map(|slot| decode_record(frame.data(), slot * RECORD_SIZE))
                .collect()
        };
        buffer.unfix(page_id)?;
        Ok(records)
    }

    pub fn get_record_count(&self) -> u64 {
        self.buffer.lock().unwrap().heap().record_count()
    }

    pub fn fix(&mut self, page_id: PageID) -> Result<Arc<Mutex<PageFrame>>> {
        self.buffer.lock().unwrap().fix(page_id)
    }

    pub fn unfix(&mut self, page_id: PageID) -> Result<()> {
        self.buffer.lock().unwrap().unfix(page_id)
    }

    pub fn use_page(&mut self, page_id: PageID) -> Result<()> {
        let in_tx = self.transactions.in_transaction();
        self.buffer.lock().unwrap().use_page(page_id, in_tx)
    }

    pub fn force(&mut self, page_id: PageID) -> Result<()> {
        let in_tx = self.transactions.in_transaction();
        self.buffer.lock().unwrap().force(page_id, in_tx)
    }

    pub fn begin(&mut self) -> Result<()> {
        self.transactions.begin()
    }

    pub fn commit(&mut self) -> Result<()> {
        self.transactions.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.transactions.rollback()
    }

    pub fn in_transaction(&self) -> bool {
        self.transactions.in_transaction()
    }

    pub fn checkpoint(&mut self) -> Result<()> {
        self.recovery.checkpoint()
    }

    /// Simulates a crash: buffer pool, before-images, locks, staged journal
    /// entries, and the transaction state are all lost. Only the two files
    /// survive.
    pub fn crash(&mut self) {
        self.recovery.crash();
        self.transactions.reset();
    }

    pub fn recover(&mut self) -> Result<()> {
        self.recovery.recover()
    }

    /// Logs every journal entry through the `log` facade.
    pub fn print_journal(&self) -> Result<()> {
        let entries = self.journal.lock().unwrap().read_entries()?;
        info!("journal contains {} entries", entries.len());
        for entry in &entries {
            info!("  {entry}");
        }
        Ok(())
    }

    /// Truncates the journal file. Test hook.
    pub fn clear_journal(&mut self) -> Result<()> {
        self.journal.lock().unwrap().clear()
    }
}
