use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::common::{RecordID, RecordImage, Result, StoreError, TransactionID, RECORD_SIZE};

/// One journal record.
///
/// The wire format is one line per entry, six pipe-separated fields:
/// `tx_id|record_id|before|after|TYPE|count_snapshot`. Images are base64
/// of the raw record bytes or the literal `NULL`; absent ids and counts
/// serialize as `-1`. The format round-trips exactly; it is what recovery
/// parses back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Begin {
        tx_id: TransactionID,
    },
    Commit {
        tx_id: TransactionID,
    },
    Rollback {
        tx_id: TransactionID,
    },
    Update {
        tx_id: TransactionID,
        record_id: RecordID,
        before: RecordImage,
        after: RecordImage,
    },
    /// Carries the record count as it was before the insert, so recovery
    /// can grow the count when replaying.
    Insert {
        tx_id: TransactionID,
        record_id: RecordID,
        after: RecordImage,
        count_snapshot: u64,
    },
    /// Present for wire-format completeness; the engine never generates
    /// deletions.
    Delete {
        tx_id: TransactionID,
        record_id: RecordID,
        before: RecordImage,
    },
    Checkpoint,
}

impl LogEntry {
    pub fn tx_id(&self) -> Option<TransactionID> {
        match self {
            LogEntry::Begin { tx_id }
            | LogEntry::Commit { tx_id }
            | LogEntry::Rollback { tx_id }
            | LogEntry::Update { tx_id, .. }
            | LogEntry::Insert { tx_id, .. }
            | LogEntry::Delete { tx_id, .. } => Some(*tx_id),
            LogEntry::Checkpoint => None,
        }
    }

    pub fn serialize(&self) -> String {
        let (tx, record, before, after, kind, count): (i64, i64, String, String, &str, i64) =
            match self {
                LogEntry::Begin { tx_id } => {
                    (tx_id.0 as i64, -1, null(), null(), "BEGIN", -1)
                }
                LogEntry::Commit { tx_id } => {
                    (tx_id.0 as i64, -1, null(), null(), "COMMIT", -1)
                }
                LogEntry::Rollback { tx_id } => {
                    (tx_id.0 as i64, -1, null(), null(), "ROLLBACK", -1)
                }
                LogEntry::Update {
                    tx_id,
                    record_id,
                    before,
                    after,
                } => (
                    tx_id.0 as i64,
                    record_id.0 as i64,
                    BASE64.encode(before),
                    BASE64.encode(after),
                    "UPDATE",
                    -1,
                ),
                LogEntry::Insert {
                    tx_id,
                    record_id,
                    after,
                    count_snapshot,
                } => (
                    tx_id.0 as i64,
                    record_id.0 as i64,
                    null(),
                    BASE64.encode(after),
                    "INSERT",
                    *count_snapshot as i64,
                ),
                LogEntry::Delete {
                    tx_id,
                    record_id,
                    before,
                } => (
                    tx_id.0 as i64,
                    record_id.0 as i64,
                    BASE64.encode(before),
                    null(),
                    "DELETE",
                    -1,
                ),
                LogEntry::Checkpoint => (-1, -1, null(), null(), "CHECKPOINT", -1),
            };
        format!("{tx}|{record}|{before}|{after}|{kind}|{count}")
    }

    pub fn deserialize(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() != 6 {
            return Err(corrupted(line, "wrong field count"));
        }
        let tx = parse_i64(parts[0], line)?;
        let record = parse_i64(parts[1], line)?;
        let before = parse_image(parts[2], line)?;
        let after = parse_image(parts[3], line)?;
        let count = parse_i64(parts[5], line)?;

        let entry = match parts[4] {
            "BEGIN" => LogEntry::Begin {
                tx_id: parse_tx(tx, line)?,
            },
            "COMMIT" => LogEntry::Commit {
                tx_id: parse_tx(tx, line)?,
            },
            "ROLLBACK" => LogEntry::Rollback {
                tx_id: parse_tx(tx, line)?,
            },
            "UPDATE" => LogEntry::Update {
                tx_id: parse_tx(tx, line)?,
                record_id: parse_record(record, line)?,
                before: require_image(before, line)?,
                after: require_image(after, line)?,
            },
            "INSERT" => {
                if count < 0 {
                    return Err(corrupted(line, "negative count snapshot"));
                }
                LogEntry::Insert {
                    tx_id: parse_tx(tx, line)?,
                    record_id: parse_record(record, line)?,
                    after: require_image(after, line)?,
                    count_snapshot: count as u64,
                }
            }
            "DELETE" => LogEntry::Delete {
                tx_id: parse_tx(tx, line)?,
                record_id: parse_record(record, line)?,
                before: require_image(before, line)?,
            },
            "CHECKPOINT" => LogEntry::Checkpoint,
            other => {
                return Err(corrupted(line, &format!("unknown entry type {other:?}")));
            }
        };
        Ok(entry)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEntry::Begin { tx_id } => write!(f, "BEGIN tx={}", tx_id.0),
            LogEntry::Commit { tx_id } => write!(f, "COMMIT tx={}", tx_id.0),
            LogEntry::Rollback { tx_id } => write!(f, "ROLLBACK tx={}", tx_id.0),
            LogEntry::Update {
                tx_id, record_id, ..
            } => write!(f, "UPDATE tx={} record={}", tx_id.0, record_id.0),
            LogEntry::Insert {
                tx_id,
                record_id,
                count_snapshot,
                ..
            } => write!(
                f,
                "INSERT tx={} record={} count={}",
                tx_id.0, record_id.0, count_snapshot
            ),
            LogEntry::Delete {
                tx_id, record_id, ..
            } => write!(f, "DELETE tx={} record={}", tx_id.0, record_id.0),
            LogEntry::Checkpoint => write!(f, "CHECKPOINT"),
        }
    }
}

fn null() -> String {
    "NULL".to_string()
}

fn corrupted(line: &str, what: &str) -> StoreError {
    StoreError::CorruptedFile(format!("{what} in journal line {line:?}"))
}

fn parse_i64(field: &str, line: &str) -> Result<i64> {
    field
        .parse::<i64>()
        .map_err(|_| corrupted(line, "unparseable numeric field"))
}

fn parse_tx(tx: i64, line: &str) -> Result<TransactionID> {
    if tx < 0 {
        return Err(corrupted(line, "missing transaction id"));
    }
    Ok(TransactionID(tx as u64))
}

fn parse_record(record: i64, line: &str) -> Result<RecordID> {
    if record < 0 {
        return Err(corrupted(line, "missing record id"));
    }
    Ok(RecordID(record as u64))
}

fn parse_image(field: &str, line: &str) -> Result<Option<RecordImage>> {
    if field == "NULL" {
        return Ok(None);
    }
    let bytes = BASE64
        .decode(field)
        .map_err(|_| corrupted(line, "unparseable image"))?;
    let image: RecordImage = bytes
        .try_into()
        .map_err(|_| corrupted(line, &format!("image is not {RECORD_SIZE} bytes")))?;
    Ok(Some(image))
}

fn require_image(image: Option<RecordImage>, line: &str) -> Result<RecordImage> {
    image.ok_or_else(|| corrupted(line, "missing image"))
}
