use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::info;

use crate::buffer::BufferManager;
use crate::common::{RecordID, RecordImage, Result, TransactionID, RECORD_SIZE};
use crate::heap::{page_of, record_offset};
use crate::journal::{Journal, LogEntry};

/// Checkpointing, crash simulation, and the recovery algorithm: find the
/// last checkpoint, classify the transactions logged after it, replay the
/// after-images of the committed ones (REDO), then walk backwards
/// restoring the before-images of the ones that never finished (UNDO).
pub struct RecoveryManager {
    buffer: Arc<Mutex<BufferManager>>,
    journal: Arc<Mutex<Journal>>,
}

impl RecoveryManager {
    pub fn new(buffer: Arc<Mutex<BufferManager>>, journal: Arc<Mutex<Journal>>) -> Self {
        Self { buffer, journal }
    }

    /// Writes every dirty page to disk and appends a durable CHECKPOINT
    /// marker, bounding the journal region later recoveries must replay.
    /// The marker bypasses the staging list.
    pub fn checkpoint(&self) -> Result<()> {
        self.buffer.lock().unwrap().flush_dirty_pages()?;
        self.journal
            .lock()
            .unwrap()
            .append_durable(&LogEntry::Checkpoint)?;
        info!("checkpoint written");
        Ok(())
    }

    /// Simulates a crash: every in-memory structure is dropped without
    /// touching the disk. Only the data file and the journal file survive.
    pub fn crash(&self) {
        info!("simulating crash, dropping all buffered state");
        self.buffer.lock().unwrap().clear();
        self.journal.lock().unwrap().discard_staged();
    }

    pub fn recover(&self) -> Result<()> {
        let entries = self.journal.lock().unwrap().read_entries()?;
        if entries.is_empty() {
            info!("recovery: journal is empty, nothing to do");
            return Ok(());
        }

        let last_checkpoint = entries
            .iter()
            .rposition(|entry| matches!(entry, LogEntry::Checkpoint));
        let start = last_checkpoint.map_or(0, |index| index + 1);
        match last_checkpoint {
            Some(index) => info!("recovery: last checkpoint at entry {index}"),
            None => info!("recovery: no checkpoint, replaying the whole journal"),
        }

        // Analysis: classify the transactions seen after the checkpoint.
        // Everything at or before it is already on disk.
        let mut active: HashSet<TransactionID> = HashSet::new();
        let mut committed: HashSet<TransactionID> = HashSet::new();
        for entry in &entries[start..] {
            match entry {
                LogEntry::Begin { tx_id } => {
                    active.insert(*tx_id);
                }
                LogEntry::Commit { tx_id } => {
                    active.remove(tx_id);
                    committed.insert(*tx_id);
                }
                LogEntry::Rollback { tx_id } => {
                    active.remove(tx_id);
                }
                _ => {}
            }
        }
        info!(
            "recovery: {} committed, {} to undo",
            committed.len(),
            active.len()
        );

        let mut buffer = self.buffer.lock().unwrap();
        buffer.heap_mut().refresh_record_count()?;

        // REDO: replay committed work forward. After-images are absolute,
        // so replaying twice lands on the same bytes.
        for entry in &entries[start..] {
            match entry {
                LogEntry::Insert {
                    tx_id,
                    record_id,
                    after,
                    count_snapshot,
                } if committed.contains(tx_id) => {
                    if *count_snapshot >= buffer.heap().record_count() {
                        buffer.heap_mut().set_record_count(count_snapshot + 1);
                    }
                    Self::apply_image(&mut buffer, *record_id, after)?;
                    info!("redo: insert record {}", record_id.0);
                }
                LogEntry::Update {
                    tx_id,
                    record_id,
                    after,
                    ..
                } if committed.contains(tx_id) => {
                    if record_id.0 < buffer.heap().record_count() {
                        Self::apply_image(&mut buffer, *record_id, after)?;
                        info!("redo: update record {}", record_id.0);
                    }
                }
                _ => {}
            }
        }

        // UNDO: walk backwards restoring before-images of transactions
        // that were still open at the crash.
        for entry in entries[start..].iter().rev() {
            match entry {
                LogEntry::Update {
                    tx_id,
                    record_id,
                    before,
                    ..
                } if active.contains(tx_id) => {
                    if record_id.0 < buffer.heap().record_count() {
                        Self::apply_image(&mut buffer, *record_id, before)?;
                        info!("undo: update record {} restored", record_id.0);
                    }
                }
                LogEntry::Insert {
                    tx_id, record_id, ..
                } if active.contains(tx_id) => {
                    // The record count was re-derived from the file, so the
                    // slot is already outside it; nothing to write back.
                    info!("undo: insert record {} discarded", record_id.0);
                }
                _ => {}
            }
        }

        // The pool was only a scratchpad for replay; disk is now the
        // truth.
        buffer.clear();
        info!("recovery complete");
        Ok(())
    }

    /// Copies an image into its record slot and writes the page through to
    /// disk immediately.
    fn apply_image(
        buffer: &mut BufferManager,
        record_id: RecordID,
        image: &RecordImage,
    ) -> Result<()> {
        let page_id = page_of(record_id);
        let offset = record_offset(record_id);
        let frame = buffer.fix(page_id)?;
        let result = (|| {
            frame.lock().unwrap().data_mut()[offset..offset + RECORD_SIZE].copy_from_slice(image);
            buffer.write_through(page_id)
        })();
        buffer.unfix(page_id)?;
        result
    }
}
