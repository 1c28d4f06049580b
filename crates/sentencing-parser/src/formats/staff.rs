use serde::Deserialize;

use super::common;
use crate::model::{FullName, StateCode};
use crate::registry::{FileType, ImportRecord};

/// One row of `sentencing_staff_record.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StaffRecord {
    pub external_id: String,
    pub pseudonymized_id: String,
    #[serde(deserialize_with = "common::json_string")]
    pub case_ids: Vec<String>,
    pub state_code: StateCode,
    #[serde(deserialize_with = "common::json_string")]
    pub full_name: FullName,
    pub email: String,
}

impl ImportRecord for StaffRecord {
    const FILE_TYPE: FileType = FileType::Staff;

    fn state_code(&self) -> Option<StateCode> {
        Some(self.state_code)
    }
}
