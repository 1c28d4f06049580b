use serde::Deserialize;

use super::common;
use crate::model::{Gender, StateCode};
use crate::registry::{FileType, ImportRecord};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecidivismDataPoint {
    pub cohort_months: i32,
    pub event_rate: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

/// The cohort an insight's recidivism figures were actually computed over,
/// which may be broader than the insight's own bucket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecidivismRollup {
    pub state_code: StateCode,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub assessment_score_bucket_start: Option<i32>,
    #[serde(default)]
    pub assessment_score_bucket_end: Option<i32>,
    #[serde(default)]
    pub most_severe_description: Option<String>,
    #[serde(default)]
    pub most_severe_ncic_category_uniform: Option<String>,
    #[serde(default)]
    pub combined_offense_category: Option<String>,
    #[serde(default)]
    pub violent_offense: Option<bool>,
}

/// One row of `case_insights_record.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InsightRecord {
    pub state_code: StateCode,
    pub gender: Gender,
    #[serde(deserialize_with = "common::integer")]
    pub assessment_score_bucket_start: i32,
    #[serde(deserialize_with = "common::integer")]
    pub assessment_score_bucket_end: i32,
    pub most_severe_description: String,
    #[serde(deserialize_with = "common::json_string")]
    pub recidivism_rollup: RecidivismRollup,
    #[serde(deserialize_with = "common::integer")]
    pub recidivism_num_records: i32,
    #[serde(default, deserialize_with = "common::optional_json_string")]
    pub recidivism_probation_series: Option<Vec<RecidivismDataPoint>>,
    #[serde(default, deserialize_with = "common::optional_json_string")]
    pub recidivism_rider_series: Option<Vec<RecidivismDataPoint>>,
    #[serde(default, deserialize_with = "common::optional_json_string")]
    pub recidivism_term_series: Option<Vec<RecidivismDataPoint>>,
    #[serde(deserialize_with = "common::integer")]
    pub disposition_num_records: i32,
    pub disposition_probation_pc: f64,
    pub disposition_rider_pc: f64,
    pub disposition_term_pc: f64,
}

impl ImportRecord for InsightRecord {
    const FILE_TYPE: FileType = FileType::Insights;

    fn state_code(&self) -> Option<StateCode> {
        Some(self.state_code)
    }
}
