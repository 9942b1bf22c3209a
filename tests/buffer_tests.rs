use ministore::{
    BufferManager, HeapFile, PageID, Result, StoreError, RECORD_SIZE,
};

use tempfile::{tempdir, TempDir};

fn manager(dir: &TempDir) -> Result<BufferManager> {
    let heap = HeapFile::open(&dir.path().join("data.db"))?;
    Ok(BufferManager::new(heap))
}

#[test]
fn fix_reads_through_and_pins() -> Result<()> {
    let dir = tempdir()?;
    let mut buffer = manager(&dir)?;

    let frame = buffer.fix(PageID(0))?;
    assert_eq!(frame.lock().unwrap().pin_count(), 1);
    assert!(frame.lock().unwrap().data().iter().all(|&b| b == 0));

    // A second fix reuses the same frame.
    let again = buffer.fix(PageID(0))?;
    assert_eq!(again.lock().unwrap().pin_count(), 2);

    buffer.unfix(PageID(0))?;
    buffer.unfix(PageID(0))?;
    assert_eq!(frame.lock().unwrap().pin_count(), 0);
    Ok(())
}

#[test]
fn unfix_of_an_unfixed_page_is_an_error() -> Result<()> {
    let dir = tempdir()?;
    let mut buffer = manager(&dir)?;

    assert!(matches!(
        buffer.unfix(PageID(0)),
        Err(StoreError::IllegalState(_))
    ));

    buffer.fix(PageID(0))?;
    buffer.unfix(PageID(0))?;
    assert!(matches!(
        buffer.unfix(PageID(0)),
        Err(StoreError::IllegalState(_))
    ));
    Ok(())
}

#[test]
fn use_page_requires_a_resident_frame() -> Result<()> {
    let dir = tempdir()?;
    let mut buffer = manager(&dir)?;
    assert!(matches!(
        buffer.use_page(PageID(3), false),
        Err(StoreError::IllegalState(_))
    ));
    Ok(())
}

#[test]
fn force_writes_dirty_frames_bounded_by_the_count() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("data.db");
    let heap = HeapFile::open(&path)?;
    let mut buffer = BufferManager::new(heap);
    buffer.heap_mut().set_record_count(1);

    let frame = buffer.fix(PageID(0))?;
    frame.lock().unwrap().data_mut()[..5].copy_from_slice(b"hello");
    buffer.use_page(PageID(0), false)?;
    buffer.unfix(PageID(0))?;

    buffer.force(PageID(0), false)?;
    assert_eq!(std::fs::metadata(&path)?.len(), RECORD_SIZE as u64);
    assert!(!frame.lock().unwrap().is_dirty());

    // A clean frame forces as a no-op.
    buffer.force(PageID(0), false)?;
    Ok(())
}

#[test]
fn force_skips_transactional_frames_while_the_transaction_is_open() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("data.db");
    let heap = HeapFile::open(&path)?;
    let mut buffer = BufferManager::new(heap);
    buffer.heap_mut().set_record_count(1);

    let frame = buffer.fix(PageID(0))?;
    frame.lock().unwrap().data_mut()[0] = b'A';
    buffer.use_page(PageID(0), true)?;
    buffer.unfix(PageID(0))?;

    buffer.force(PageID(0), true)?;
    assert_eq!(std::fs::metadata(&path)?.len(), 0);
    assert!(frame.lock().unwrap().is_dirty());

    // Once no transaction is open the same frame does write.
    buffer.force(PageID(0), false)?;
    assert_eq!(std::fs::metadata(&path)?.len(), RECORD_SIZE as u64);
    assert!(!frame.lock().unwrap().is_transactional());
    Ok(())
}

#[test]
fn dropping_transactional_frames_refuses_pinned_pages() -> Result<()> {
    let dir = tempdir()?;
    let mut buffer = manager(&dir)?;

    buffer.fix(PageID(0))?;
    buffer.use_page(PageID(0), true)?;

    assert!(matches!(
        buffer.drop_transactional_frames(),
        Err(StoreError::IllegalState(_))
    ));

    buffer.unfix(PageID(0))?;
    buffer.drop_transactional_frames()?;
    assert!(buffer.frame(PageID(0)).is_none());
    Ok(())
}

#[test]
fn commit_path_clears_only_the_transactional_flag() -> Result<()> {
    let dir = tempdir()?;
    let mut buffer = manager(&dir)?;

    let frame = buffer.fix(PageID(0))?;
    buffer.use_page(PageID(0), true)?;
    buffer.unfix(PageID(0))?;

    buffer.clear_transactional_flags();
    let frame = frame.lock().unwrap();
    assert!(!frame.is_transactional());
    assert!(frame.is_dirty());
    Ok(())
}
