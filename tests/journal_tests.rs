use ministore::common::encode_payload;
use ministore::{
    Journal, LogEntry, RecordID, Result, StoreError, TransactionID, RECORD_SIZE,
};

use std::io::Write;

use tempfile::tempdir;

fn image(text: &str) -> [u8; RECORD_SIZE] {
    encode_payload(text).unwrap()
}

#[test]
fn every_entry_kind_round_trips() -> Result<()> {
    let entries = vec![
        LogEntry::Begin {
            tx_id: TransactionID(1),
        },
        LogEntry::Commit {
            tx_id: TransactionID(1),
        },
        LogEntry::Rollback {
            tx_id: TransactionID(2),
        },
        LogEntry::Update {
            tx_id: TransactionID(3),
            record_id: RecordID(41),
            before: image("old value"),
            after: image("new value"),
        },
        LogEntry::Update {
            tx_id: TransactionID(3),
            record_id: RecordID(0),
            before: [0u8; RECORD_SIZE],
            after: [0xAB; RECORD_SIZE],
        },
        LogEntry::Insert {
            tx_id: TransactionID(4),
            record_id: RecordID(105),
            after: image("appended"),
            count_snapshot: 105,
        },
        LogEntry::Delete {
            tx_id: TransactionID(5),
            record_id: RecordID(7),
            before: image("gone"),
        },
        LogEntry::Checkpoint,
    ];

    for entry in entries {
        let line = entry.serialize();
        assert_eq!(LogEntry::deserialize(&line)?, entry, "line was {line}");
    }
    Ok(())
}

#[test]
fn serialized_layout_is_the_fixed_pipe_format() {
    let begin = LogEntry::Begin {
        tx_id: TransactionID(7),
    };
    assert_eq!(begin.serialize(), "7|-1|NULL|NULL|BEGIN|-1");
    assert_eq!(LogEntry::Checkpoint.serialize(), "-1|-1|NULL|NULL|CHECKPOINT|-1");

    let insert = LogEntry::Insert {
        tx_id: TransactionID(2),
        record_id: RecordID(10),
        after: image("x"),
        count_snapshot: 10,
    };
    let line = insert.serialize();
    let parts: Vec<&str> = line.split('|').collect();
    assert_eq!(parts.len(), 6);
    assert_eq!(parts[0], "2");
    assert_eq!(parts[1], "10");
    assert_eq!(parts[2], "NULL");
    assert_eq!(parts[4], "INSERT");
    assert_eq!(parts[5], "10");
}

#[test]
fn staged_entries_reach_the_file_only_on_flush() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("journal.log");
    let mut journal = Journal::open(&path)?;

    journal.append(LogEntry::Begin {
        tx_id: TransactionID(1),
    });
    assert_eq!(journal.staged_len(), 1);
    assert!(journal.read_entries()?.is_empty());

    journal.flush()?;
    assert_eq!(journal.staged_len(), 0);
    assert_eq!(journal.read_entries()?.len(), 1);

    journal.append(LogEntry::Commit {
        tx_id: TransactionID(1),
    });
    journal.discard_staged();
    journal.flush()?;
    assert_eq!(journal.read_entries()?.len(), 1);
    Ok(())
}

#[test]
fn durable_append_bypasses_staging() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("journal.log");
    let mut journal = Journal::open(&path)?;

    journal.append(LogEntry::Begin {
        tx_id: TransactionID(1),
    });
    journal.append_durable(&LogEntry::Checkpoint)?;

    assert_eq!(journal.read_entries()?, vec![LogEntry::Checkpoint]);
    assert_eq!(journal.staged_len(), 1);
    Ok(())
}

#[test]
fn blank_lines_are_skipped_and_garbage_is_an_error() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("journal.log");
    let mut journal = Journal::open(&path)?;
    journal.append(LogEntry::Begin {
        tx_id: TransactionID(1),
    });
    journal.flush()?;

    let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
    writeln!(file)?;
    writeln!(file)?;
    assert_eq!(journal.read_entries()?.len(), 1);

    writeln!(file, "not a journal line")?;
    assert!(matches!(
        journal.read_entries(),
        Err(StoreError::CorruptedFile(_))
    ));
    Ok(())
}

#[test]
fn clear_truncates_the_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("journal.log");
    let mut journal = Journal::open(&path)?;
    journal.append_durable(&LogEntry::Checkpoint)?;
    assert_eq!(journal.read_entries()?.len(), 1);

    journal.clear()?;
    assert!(journal.read_entries()?.is_empty());
    Ok(())
}
