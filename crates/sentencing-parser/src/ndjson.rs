//! Newline-delimited JSON splitting with per-line failure isolation.

use serde_json::Value;

use crate::errors::LineError;

#[derive(Debug, Default)]
pub struct NdjsonBatch {
    /// Successfully parsed, non-null records in file order.
    pub records: Vec<Value>,
    /// Lines that were not valid JSON.
    pub rejected: Vec<LineError>,
    /// Non-blank lines seen.
    pub non_blank_lines: usize,
}

/// Splits `content` on newlines and parses each line independently.
///
/// Blank lines and lines holding a bare `null` are skipped. A malformed line
/// never fails the batch; it is returned in `rejected` instead.
pub fn split_records(content: &str) -> NdjsonBatch {
    let mut batch = NdjsonBatch::default();

    for (index, line) in content.split('\n').enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        batch.non_blank_lines += 1;

        match serde_json::from_str::<Value>(line) {
            Ok(Value::Null) => {}
            Ok(value) => batch.records.push(value),
            Err(err) => batch.rejected.push(LineError::new(index + 1, err.to_string())),
        }
    }

    batch
}
