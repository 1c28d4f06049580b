use chrono::NaiveDate;
use serde::Deserialize;

use super::common;
use crate::model::{FullName, Gender, StateCode};
use crate::registry::{FileType, ImportRecord};

/// One row of `sentencing_client_record.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientRecord {
    pub external_id: String,
    pub pseudonymized_id: String,
    #[serde(deserialize_with = "common::json_string")]
    pub case_ids: Vec<String>,
    pub state_code: StateCode,
    #[serde(deserialize_with = "common::json_string")]
    pub full_name: FullName,
    pub gender: Gender,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(deserialize_with = "common::date")]
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub district: Option<String>,
}

impl ImportRecord for ClientRecord {
    const FILE_TYPE: FileType = FileType::Clients;

    fn state_code(&self) -> Option<StateCode> {
        Some(self.state_code)
    }
}
