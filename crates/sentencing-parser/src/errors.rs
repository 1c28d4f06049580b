use std::fmt;

use thiserror::Error;

use crate::registry::FileType;

/// A single NDJSON line that could not be parsed as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based line number within the object.
    pub line_number: usize,
    pub message: String,
}

impl LineError {
    pub fn new(line_number: usize, message: impl Into<String>) -> Self {
        Self {
            line_number,
            message: message.into(),
        }
    }
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.message)
    }
}

/// A parsed record that failed its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    /// 0-based position within the parsed batch.
    pub index: usize,
    pub message: String,
}

impl RecordError {
    pub fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {}: {}", self.index, self.message)
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{file_type} batch rejected, {} of {total} records invalid: {}", errors.len(), join_errors(errors))]
    InvalidRecords {
        file_type: FileType,
        total: usize,
        errors: Vec<RecordError>,
    },
}

impl SchemaError {
    pub fn errors(&self) -> &[RecordError] {
        match self {
            SchemaError::InvalidRecords { errors, .. } => errors,
        }
    }
}

const MAX_REPORTED_ERRORS: usize = 10;

fn join_errors(errors: &[RecordError]) -> String {
    let mut joined = errors
        .iter()
        .take(MAX_REPORTED_ERRORS)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if errors.len() > MAX_REPORTED_ERRORS {
        joined.push_str(&format!("; ... {} more", errors.len() - MAX_REPORTED_ERRORS));
    }
    joined
}
