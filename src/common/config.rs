//! On-disk format constants. These are part of the storage contract:
//! changing any of them produces a different, incompatible engine.

pub const PAGE_SIZE: usize = 4096;

/// Every record occupies exactly this many bytes on disk, padded with
/// trailing zeros.
pub const RECORD_SIZE: usize = 100;

pub const RECORDS_PER_PAGE: usize = PAGE_SIZE / RECORD_SIZE;

/// Usable bytes of a page. The remaining `PAGE_SIZE - PAGE_DATA_SIZE`
/// bytes are never stored.
pub const PAGE_DATA_SIZE: usize = RECORDS_PER_PAGE * RECORD_SIZE;

/// A raw record slot, exactly `RECORD_SIZE` bytes.
pub type RecordImage = [u8; RECORD_SIZE];
