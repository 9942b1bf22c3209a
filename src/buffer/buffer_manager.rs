use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::common::{PageID, Result, StoreError};
use crate::heap::HeapFile;

/// One in-memory page residence.
///
/// `dirty` means the frame diverged from disk since the last flush;
/// `transactional` means the divergence happened inside the currently open
/// transaction and must not reach disk before that transaction commits.
pub struct PageFrame {
    data: Vec<u8>,
    pin_count: u32,
    dirty: bool,
    transactional: bool,
}

impl PageFrame {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pin_count: 0,
            dirty: false,
            transactional: false,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }
}

/// The buffer pool. Frames are keyed by page id; at most one frame per
/// page exists, and frames stay resident until a crash, a recovery, or a
/// rollback that discards purely transactional pages. There is no
/// eviction.
pub struct BufferManager {
    frames: HashMap<PageID, Arc<Mutex<PageFrame>>>,
    heap: HeapFile,
}

impl BufferManager {
    pub fn new(heap: HeapFile) -> Self {
        Self {
            frames: HashMap::new(),
            heap,
        }
    }

    pub fn heap(&self) -> &HeapFile {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut HeapFile {
        &mut self.heap
    }

    /// Pins a page into the pool, reading it from disk on first touch.
    pub fn fix(&mut self, page_id: PageID) -> Result<Arc<Mutex<PageFrame>>> {
        if !self.frames.contains_key(&page_id) {
            let data = self.heap.read_page(page_id)?;
            self.frames
                .insert(page_id, Arc::new(Mutex::new(PageFrame::new(data))));
        }
        let frame = Arc::clone(&self.frames[&page_id]);
        frame.lock().unwrap().pin_count += 1;
        Ok(frame)
    }

    pub fn unfix(&mut self, page_id: PageID) -> Result<()> {
        let Some(frame) = self.frames.get(&page_id) else {
            return Err(StoreError::IllegalState(format!(
                "page {} is not fixed",
                page_id.0
            )));
        };
        let mut frame = frame.lock().unwrap();
        if frame.pin_count == 0 {
            return Err(StoreError::IllegalState(format!(
                "page {} is not fixed",
                page_id.0
            )));
        }
        frame.pin_count -= 1;
        Ok(())
    }

    /// Marks a resident frame as modified, and as transactional when the
    /// modification happens inside an open transaction.
    pub fn use_page(&mut self, page_id: PageID, transactional: bool) -> Result<()> {
        let Some(frame) = self.frames.get(&page_id) else {
            return Err(StoreError::IllegalState(format!(
                "page {} is not in the buffer",
                page_id.0
            )));
        };
        let mut frame = frame.lock().unwrap();
        frame.dirty = true;
        if transactional {
            frame.transactional = true;
        }
        Ok(())
    }

    /// Conditionally writes a frame back to disk. A frame that is absent or
    /// clean is a no-op, as is a transactional frame while its transaction
    /// is still open: those bytes may only become durable through the
    /// journal.
    pub fn force(&mut self, page_id: PageID, in_transaction: bool) -> Result<()> {
        let Some(frame) = self.frames.get(&page_id) else {
            return Ok(());
        };
        let mut frame = frame.lock().unwrap();
        if !frame.dirty {
            return Ok(());
        }
        if frame.transactional && in_transaction {
            return Ok(());
        }
        self.heap.write_page(page_id, &frame.data)?;
        frame.dirty = false;
        frame.transactional = false;
        Ok(())
    }

    /// Checkpoint path: write every dirty frame and clear its dirty flag.
    /// Transactional flags are left alone so an open transaction can still
    /// roll back.
    pub fn flush_dirty_pages(&mut self) -> Result<()> {
        for (&page_id, frame) in &self.frames {
            let mut frame = frame.lock().unwrap();
            if frame.dirty {
                self.heap.write_page(page_id, &frame.data)?;
                frame.dirty = false;
            }
        }
        Ok(())
    }

    /// Recovery path: unconditional write-through of a resident frame.
    pub fn write_through(&mut self, page_id: PageID) -> Result<()> {
        let Some(frame) = self.frames.get(&page_id) else {
            return Err(StoreError::IllegalState(format!(
                "page {} is not in the buffer",
                page_id.0
            )));
        };
        let frame = frame.lock().unwrap();
        self.heap.write_page(page_id, &frame.data)
    }

    /// Rollback path: copy a before-image snapshot over the live frame and
    /// drop both modification flags.
    pub fn restore_frame(&mut self, page_id: PageID, snapshot: &[u8]) {
        if let Some(frame) = self.frames.get(&page_id) {
            let mut frame = frame.lock().unwrap();
            frame.data[..snapshot.len()].copy_from_slice(snapshot);
            frame.dirty = false;
            frame.transactional = false;
        }
    }

    /// Rollback path: discard frames created inside the failed transaction
    /// (new pages from inserts, which have no before-image to restore).
    /// A pinned frame here is a leaked fix.
    pub fn drop_transactional_frames(&mut self) -> Result<()> {
        for (page_id, frame) in &self.frames {
            let frame = frame.lock().unwrap();
            if frame.transactional && frame.pin_count > 0 {
                return Err(StoreError::IllegalState(format!(
                    "cannot roll back while page {} is still pinned",
                    page_id.0
                )));
            }
        }
        self.frames
            .retain(|_, frame| !frame.lock().unwrap().transactional);
        Ok(())
    }

    /// Commit path: committed bytes are no longer transaction-private, but
    /// the frames stay dirty until the next checkpoint.
    pub fn clear_transactional_flags(&mut self) {
        for frame in self.frames.values() {
            frame.lock().unwrap().transactional = false;
        }
    }

    /// Crash simulation and recovery finalization: drop every frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn frame(&self, page_id: PageID) -> Option<Arc<Mutex<PageFrame>>> {
        self.frames.get(&page_id).map(Arc::clone)
    }

    pub fn resident_pages(&self) -> Vec<PageID> {
        self.frames.keys().copied().collect()
    }
}
