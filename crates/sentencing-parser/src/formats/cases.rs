use chrono::NaiveDate;
use serde::Deserialize;

use super::common;
use crate::model::{ExternalReportType, StateCode};
use crate::registry::{FileType, ImportRecord};

/// One row of `sentencing_case_record.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaseRecord {
    pub external_id: String,
    pub state_code: StateCode,
    pub staff_id: String,
    pub client_id: String,
    #[serde(default, deserialize_with = "common::optional_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "common::optional_date")]
    pub completion_date: Option<NaiveDate>,
    #[serde(deserialize_with = "common::date")]
    pub sentence_date: NaiveDate,
    #[serde(deserialize_with = "common::date")]
    pub assigned_date: NaiveDate,
    pub county: String,
    #[serde(default, deserialize_with = "common::optional_integer")]
    pub lsir_score: Option<i32>,
    #[serde(default)]
    pub lsir_level: Option<String>,
    #[serde(default)]
    pub report_type: Option<ExternalReportType>,
}

impl ImportRecord for CaseRecord {
    const FILE_TYPE: FileType = FileType::Cases;

    fn state_code(&self) -> Option<StateCode> {
        Some(self.state_code)
    }
}
