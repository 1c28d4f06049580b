use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{RecordError, SchemaError};
use crate::model::StateCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Cases,
    Staff,
    Clients,
    Opportunities,
    Insights,
    Offenses,
}

const FILE_NAMES: [(&str, FileType); 6] = [
    ("sentencing_case_record.json", FileType::Cases),
    ("sentencing_staff_record.json", FileType::Staff),
    ("sentencing_client_record.json", FileType::Clients),
    (
        "sentencing_community_opportunity_record.json",
        FileType::Opportunities,
    ),
    ("case_insights_record.json", FileType::Insights),
    ("sentencing_charge_record.json", FileType::Offenses),
];

impl FileType {
    /// Exact-match lookup against the well-known export file names.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        FILE_NAMES
            .iter()
            .find(|(name, _)| *name == file_name)
            .map(|(_, file_type)| *file_type)
    }

    pub fn file_name(&self) -> &'static str {
        FILE_NAMES
            .iter()
            .find(|(_, file_type)| file_type == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Cases => "cases",
            FileType::Staff => "staff",
            FileType::Clients => "clients",
            FileType::Opportunities => "opportunities",
            FileType::Insights => "insights",
            FileType::Offenses => "offenses",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed row of one export file.
pub trait ImportRecord: DeserializeOwned {
    const FILE_TYPE: FileType;

    /// Jurisdiction the record claims, when the export carries one.
    fn state_code(&self) -> Option<StateCode>;
}

/// Validates an entire parsed batch against `R`'s schema.
///
/// Every record is checked so the error lists all offenders, but a single
/// failure rejects the whole batch. Records filed under one jurisdiction must
/// not claim another.
pub fn validate_batch<R: ImportRecord>(
    jurisdiction: StateCode,
    values: Vec<Value>,
) -> Result<Vec<R>, SchemaError> {
    let total = values.len();
    let mut records = Vec::with_capacity(total);
    let mut errors = Vec::new();

    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<R>(value) {
            Ok(record) => match record.state_code() {
                Some(state_code) if state_code != jurisdiction => {
                    errors.push(RecordError::new(
                        index,
                        format!(
                            "state code {state_code} does not match jurisdiction {jurisdiction}"
                        ),
                    ));
                }
                _ => records.push(record),
            },
            Err(err) => errors.push(RecordError::new(index, err.to_string())),
        }
    }

    if errors.is_empty() {
        Ok(records)
    } else {
        Err(SchemaError::InvalidRecords {
            file_type: R::FILE_TYPE,
            total,
            errors,
        })
    }
}
