//! Content fingerprint of a [`Frame`].

use sha2::{Digest, Sha256};

use crate::frame::{Frame, Value};

/// Rows folded into the digest unless configured otherwise.
pub const DEFAULT_DIGEST_ROWS: usize = 10_000;
/// Hex characters kept from the SHA-256.
pub const DIGEST_LEN: usize = 8;

const UNIT_SEP: u8 = 0x1f;
const RECORD_SEP: u8 = 0x1e;

/// Digest over the first [`DEFAULT_DIGEST_ROWS`] rows plus the frame shape.
pub fn compute_digest(frame: &Frame) -> String {
    compute_digest_with_limit(frame, DEFAULT_DIGEST_ROWS)
}

/// Digest over column names, the first `max_rows` rows and the full shape.
///
/// Rows past `max_rows` only contribute through `num_rows`.
pub fn compute_digest_with_limit(frame: &Frame, max_rows: usize) -> String {
    let mut hasher = Sha256::new();
    for name in frame.column_names() {
        hasher.update(name.as_bytes());
        hasher.update([UNIT_SEP]);
    }
    hasher.update([RECORD_SEP]);
    let rows = frame.num_rows().min(max_rows);
    for row in 0..rows {
        for column in frame.columns() {
            let cell = &column.cells[row];
            hasher.update([type_tag(cell)]);
            hasher.update(cell.to_string().as_bytes());
            hasher.update([UNIT_SEP]);
        }
        hasher.update([RECORD_SEP]);
    }
    hasher.update((frame.num_rows() as u64).to_le_bytes());
    hasher.update((frame.num_elements() as u64).to_le_bytes());
    let full = hex::encode(hasher.finalize());
    full[..DIGEST_LEN].to_string()
}

fn type_tag(cell: &Value) -> u8 {
    match cell {
        Value::Null => b'n',
        Value::Long(_) => b'l',
        Value::Double(_) => b'd',
        Value::Boolean(_) => b'b',
        Value::String(_) => b's',
    }
}
