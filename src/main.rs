use log::{info, LevelFilter};

use env_logger::Builder;

use ministore::{Database, PageID, RecordID, RECORDS_PER_PAGE};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::new().filter_level(LevelFilter::Info).init();

    let data_path = std::path::Path::new("students.db");
    let journal_path = std::path::Path::new("students.db.log");
    let _ = std::fs::remove_file(data_path);
    let _ = std::fs::remove_file(journal_path);

    let mut db = Database::open(data_path)?;

    info!("-- basic inserts and paged reads --");
    for i in 1..=105 {
        if i % 10 == 0 {
            db.insert_record_sync(&format!("Student {i}"))?;
        } else {
            db.insert_record(&format!("Student {i}"))?;
        }
    }
    let page_count = db.get_record_count().div_ceil(RECORDS_PER_PAGE as u64);
    for page_id in 0..page_count {
        db.force(PageID(page_id))?;
    }
    info!("record 41: {}", db.read_record(RecordID(41))?);
    for page_id in 0..page_count {
        let page = db.get_page(PageID(page_id))?;
        info!("page {page_id} holds {} records", page.len());
    }

    info!("-- insert rollback and commit --");
    db.begin()?;
    db.insert_record("Student 200")?;
    db.insert_record("Student 201")?;
    db.rollback()?;
    info!("count after rollback (expect 105): {}", db.get_record_count());

    db.begin()?;
    db.insert_record("Student 202")?;
    db.insert_record("Student 203")?;
    db.commit()?;
    info!("count after commit (expect 107): {}", db.get_record_count());

    info!("-- update rollback, commit, and locked reads --");
    info!("record 0 before: {}", db.read_record(RecordID(0))?);
    db.begin()?;
    db.update_record(RecordID(0), "Student REWRITTEN")?;
    info!(
        "record 0 inside transaction (reads the old value): {}",
        db.read_record(RecordID(0))?
    );
    info!("record 0 locked: {}", db.is_locked(RecordID(0)));
    db.rollback()?;
    info!("record 0 after rollback: {}", db.read_record(RecordID(0))?);

    db.begin()?;
    db.update_record(RecordID(1), "Student 2 PERMANENT")?;
    db.commit()?;
    info!("record 1 after commit: {}", db.read_record(RecordID(1))?);

    db.begin()?;
    db.update_record(RecordID(20), "first update")?;
    match db.update_record(RecordID(20), "second update") {
        Err(err) => info!("double update refused as expected: {err}"),
        Ok(()) => info!("ERROR: double update should have been refused"),
    }
    db.rollback()?;

    info!("-- journaling, checkpoint, and recovery --");
    db.checkpoint()?;

    db.begin()?;
    db.update_record(RecordID(2), "COMMITTED CHANGE")?;
    db.commit()?;
    db.crash();
    db.recover()?;
    info!(
        "record 2 after commit, crash, recover (redo): {}",
        db.read_record(RecordID(2))?
    );

    db.checkpoint()?;
    db.begin()?;
    db.update_record(RecordID(3), "UNCOMMITTED CHANGE")?;
    db.crash();
    db.recover()?;
    info!(
        "record 3 after crash without commit (undo): {}",
        db.read_record(RecordID(3))?
    );

    db.checkpoint()?;
    db.begin()?;
    db.update_record(RecordID(4), "TX1")?;
    db.commit()?;
    db.begin()?;
    db.update_record(RecordID(5), "TX2")?;
    db.commit()?;
    db.begin()?;
    db.update_record(RecordID(6), "TX3 never committed")?;
    db.crash();
    db.recover()?;
    info!("record 4 (expect TX1): {}", db.read_record(RecordID(4))?);
    info!("record 5 (expect TX2): {}", db.read_record(RecordID(5))?);
    info!(
        "record 6 (expect the original): {}",
        db.read_record(RecordID(6))?
    );

    db.print_journal()?;

    Ok(())
}
