//! Storage-shaped rows, one struct per loaded entity.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sentencing_parser::{
    AsamLevelOfCareRecommendationCriterion, DiagnosedMentalHealthDiagnosisCriterion,
    DiagnosedSubstanceUseDisorderCriterion, Gender, NeedToBeAddressed,
    PriorCriminalHistoryCriterion,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRow {
    pub external_id: String,
    pub pseudonymized_id: String,
    pub full_name: String,
    pub email: Option<String>,
    /// Cases to attach to this staff member if they are already loaded.
    pub case_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRow {
    pub external_id: String,
    pub pseudonymized_id: String,
    pub full_name: String,
    pub gender: Gender,
    pub is_gender_locked: bool,
    pub county: String,
    pub birth_date: NaiveDate,
    pub district: Option<String>,
    pub case_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "FullPSI")]
    FullPsi,
    FileReview,
    #[serde(rename = "FileReviewWithUpdatedLSIRScore")]
    FileReviewWithUpdatedLsirScore,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::FullPsi => "FullPSI",
            ReportType::FileReview => "FileReview",
            ReportType::FileReviewWithUpdatedLsirScore => "FileReviewWithUpdatedLSIRScore",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRow {
    pub external_id: String,
    /// Requested staff link; dropped at load time if the staff member is absent.
    pub staff_id: Option<String>,
    /// Requested client link; dropped at load time if the client is absent.
    pub client_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub sentence_date: NaiveDate,
    pub assigned_date: NaiveDate,
    pub county: Option<String>,
    pub lsir_score: Option<i32>,
    pub lsir_level: Option<String>,
    pub report_type: Option<ReportType>,
    pub is_lsir_score_locked: bool,
    pub is_report_type_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRow {
    pub opportunity_name: String,
    pub provider_name: String,
    pub description: Option<String>,
    pub provider_phone_number: Option<String>,
    pub provider_website: Option<String>,
    pub provider_address: Option<String>,
    pub capacity_total: Option<i32>,
    pub capacity_available: Option<i32>,
    pub needs_addressed: Vec<NeedToBeAddressed>,
    pub developmental_disability_diagnosis_criterion: bool,
    pub no_current_or_prior_sex_offense_criterion: bool,
    pub no_current_or_prior_violent_offense_criterion: bool,
    pub no_pending_felony_charges_in_another_county_or_state_criterion: bool,
    pub entry_of_guilty_plea_criterion: bool,
    pub veteran_status_criterion: bool,
    pub prior_criminal_history_criterion: Option<PriorCriminalHistoryCriterion>,
    pub diagnosed_mental_health_diagnosis_criterion: Vec<DiagnosedMentalHealthDiagnosisCriterion>,
    pub asam_level_of_care_recommendation_criterion: Option<AsamLevelOfCareRecommendationCriterion>,
    pub diagnosed_substance_use_disorder_criterion: Option<DiagnosedSubstanceUseDisorderCriterion>,
    pub min_lsir_score_criterion: Option<i32>,
    pub max_lsir_score_criterion: Option<i32>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub district: Option<String>,
    pub last_updated_date: NaiveDate,
    pub additional_notes: Option<String>,
    pub genders: Vec<Gender>,
    pub generic_description: Option<String>,
}

impl OpportunityRow {
    pub fn key(&self) -> (String, String) {
        (self.opportunity_name.clone(), self.provider_name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseRecommendation {
    Probation,
    Rider,
    Term,
}

impl CaseRecommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseRecommendation::Probation => "Probation",
            CaseRecommendation::Rider => "Rider",
            CaseRecommendation::Term => "Term",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPointRow {
    pub cohort_months: i32,
    pub event_rate: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecidivismSeriesRow {
    pub recommendation: CaseRecommendation,
    pub data_points: Vec<DataPointRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispositionRow {
    pub recommendation: CaseRecommendation,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupRow {
    pub gender: Option<Gender>,
    pub assessment_score_bucket_start: Option<i32>,
    pub assessment_score_bucket_end: Option<i32>,
    pub offense_name: Option<String>,
    pub ncic_category: Option<String>,
    pub combined_offense_category: Option<String>,
    pub violent_offense: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsightKey {
    pub gender: &'static str,
    pub assessment_score_bucket_start: i32,
    pub assessment_score_bucket_end: i32,
    pub offense_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRow {
    pub gender: Gender,
    pub assessment_score_bucket_start: i32,
    pub assessment_score_bucket_end: i32,
    pub offense_name: String,
    pub rollup: RollupRow,
    pub rollup_recidivism_num_records: i32,
    pub recidivism_series: Vec<RecidivismSeriesRow>,
    pub disposition_num_records: i32,
    pub dispositions: Vec<DispositionRow>,
}

impl InsightRow {
    pub fn key(&self) -> InsightKey {
        InsightKey {
            gender: self.gender.as_str(),
            assessment_score_bucket_start: self.assessment_score_bucket_start,
            assessment_score_bucket_end: self.assessment_score_bucket_end,
            offense_name: self.offense_name.clone(),
        }
    }

    /// Offense names this insight refers to, which must exist after load.
    pub fn offense_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.offense_name.as_str()).chain(self.rollup.offense_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffenseRow {
    pub name: String,
    pub is_sex_offense: Option<bool>,
    pub is_violent_offense: Option<bool>,
}
