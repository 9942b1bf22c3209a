use crate::common::{RecordImage, Result, StoreError, RECORD_SIZE};

/// Pads a payload to the fixed record size, rejecting overlong input.
pub fn encode_payload(data: &str) -> Result<RecordImage> {
    let bytes = data.as_bytes();
    if bytes.len() > RECORD_SIZE {
        return Err(StoreError::InvalidArgument(format!(
            "record payload of {} bytes exceeds the fixed size of {} bytes",
            bytes.len(),
            RECORD_SIZE
        )));
    }
    let mut record = [0u8; RECORD_SIZE];
    record[..bytes.len()].copy_from_slice(bytes);
    Ok(record)
}

/// Decodes the record slot at `offset`, stripping the zero-byte padding.
pub fn decode_record(page_data: &[u8], offset: usize) -> String {
    let slot = &page_data[offset..offset + RECORD_SIZE];
    let len = slot.iter().position(|&b| b == 0).unwrap_or(RECORD_SIZE);
    String::from_utf8_lossy(&slot[..len]).into_owned()
}
