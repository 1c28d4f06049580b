use serde::Deserialize;

use crate::model::StateCode;
use crate::registry::{FileType, ImportRecord};

/// One row of `sentencing_charge_record.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OffenseRecord {
    pub state_code: StateCode,
    pub charge: String,
    #[serde(default)]
    pub is_sex_offense: Option<bool>,
    #[serde(default)]
    pub is_violent: Option<bool>,
}

impl ImportRecord for OffenseRecord {
    const FILE_TYPE: FileType = FileType::Offenses;

    fn state_code(&self) -> Option<StateCode> {
        Some(self.state_code)
    }
}
