use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::buffer::BufferManager;
use crate::common::{PageID, RecordID, Result, TransactionID};
use crate::journal::{Journal, LogEntry};

/// Book-keeping for the one open transaction: its id, the record count at
/// begin time (restored on rollback to discard speculative inserts), full
/// page snapshots taken before the first in-transaction change, and the
/// set of records this transaction has locked by updating them.
struct CurrentTransaction {
    id: TransactionID,
    start_record_count: u64,
    before_images: HashMap<PageID, Vec<u8>>,
    locks: HashSet<RecordID>,
}

/// The begin/commit/rollback state machine. At most one transaction is
/// open at a time; the lock set models a multi-user world without
/// enforcing one.
pub struct TransactionManager {
    buffer: Arc<Mutex<BufferManager>>,
    journal: Arc<Mutex<Journal>>,
    next_tx_id: u64,
    current: Option<CurrentTransaction>,
}

impl TransactionManager {
    pub fn new(buffer: Arc<Mutex<BufferManager>>, journal: Arc<Mutex<Journal>>) -> Self {
        Self {
            buffer,
            journal,
            next_tx_id: 1,
            current: None,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_tx_id(&self) -> Option<TransactionID> {
        self.current.as_ref().map(|tx| tx.id)
    }

    pub fn is_locked(&self, record_id: RecordID) -> bool {
        self.current
            .as_ref()
            .is_some_and(|tx| tx.locks.contains(&record_id))
    }

    /// Starts a transaction. A transaction that is still open is committed
    /// first, so prior work is never lost.
    pub fn begin(&mut self) -> Result<()> {
        if self.current.is_some() {
            self.commit()?;
        }
        let id = TransactionID(self.next_tx_id);
        self.next_tx_id += 1;
        let start_record_count = self.buffer.lock().unwrap().heap().record_count();
        self.journal
            .lock()
            .unwrap()
            .append(LogEntry::Begin { tx_id: id });
        self.current = Some(CurrentTransaction {
            id,
            start_record_count,
            before_images: HashMap::new(),
            locks: HashSet::new(),
        });
        Ok(())
    }

    /// Commits the open transaction. The journal becomes durable; the data
    /// pages do not. They stay dirty (no longer transactional) until the
    /// next checkpoint, and recovery replays them from the journal if the
    /// process dies first. A no-op when idle.
    pub fn commit(&mut self) -> Result<()> {
        let Some(tx) = self.current.as_ref() else {
            return Ok(());
        };
        {
            let mut journal = self.journal.lock().unwrap();
            journal.append(LogEntry::Commit { tx_id: tx.id });
            journal.flush()?;
        }
        self.buffer.lock().unwrap().clear_transactional_flags();
        self.current = None;
        Ok(())
    }

    /// Rolls the open transaction back: the record count returns to its
    /// begin-time value, snapshotted pages are restored in memory, and
    /// frames that exist only because of the transaction are discarded.
    /// A no-op when idle. On failure the transaction stays open.
    pub fn rollback(&mut self) -> Result<()> {
        let Some(tx) = self.current.as_mut() else {
            return Ok(());
        };
        let tx_id = tx.id;
        {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.heap_mut().set_record_count(tx.start_record_count);
            for (page_id, snapshot) in &tx.before_images {
                buffer.restore_frame(*page_id, snapshot);
            }
            tx.before_images.clear();
            tx.locks.clear();
            buffer.drop_transactional_frames()?;
        }
        {
            let mut journal = self.journal.lock().unwrap();
            journal.append(LogEntry::Rollback { tx_id });
            journal.flush()?;
        }
        self.current = None;
        Ok(())
    }

    /// Snapshots the page as it was before the first in-transaction change
    /// touching it. Later changes to the same page keep the first
    /// snapshot.
    pub fn snapshot_page(&mut self, page_id: PageID, data: &[u8]) {
        if let Some(tx) = self.current.as_mut() {
            tx.before_images
                .entry(page_id)
                .or_insert_with(|| data.to_vec());
        }
    }

    pub fn lock_record(&mut self, record_id: RecordID) {
        if let Some(tx) = self.current.as_mut() {
            tx.locks.insert(record_id);
        }
    }

    /// The pre-transaction snapshot of a page, if this transaction took
    /// one. Reads of locked records resolve against this.
    pub fn before_image(&self, page_id: PageID) -> Option<&[u8]> {
        self.current
            .as_ref()
            .and_then(|tx| tx.before_images.get(&page_id))
            .map(Vec::as_slice)
    }

    /// Crash simulation: forget the open transaction without logging
    /// anything.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
