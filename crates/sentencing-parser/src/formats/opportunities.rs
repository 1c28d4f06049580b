use chrono::NaiveDate;
use serde::Deserialize;

use super::common;
use crate::model::{
    AsamLevelOfCareRecommendationCriterion, DiagnosedMentalHealthDiagnosisCriterion,
    DiagnosedSubstanceUseDisorderCriterion, NeedToBeAddressed, OpportunityGender,
    PriorCriminalHistoryCriterion, StateCode,
};
use crate::registry::{FileType, ImportRecord};

/// One row of `sentencing_community_opportunity_record.json`.
///
/// The provider columns come from a spreadsheet export and keep its
/// PascalCase headers; the eligibility criteria are camelCase.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityRecord {
    #[serde(rename = "OpportunityName")]
    pub opportunity_name: String,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "ProviderName", default)]
    pub provider_name: Option<String>,
    #[serde(rename = "CleanedProviderPhoneNumber", default)]
    pub provider_phone_number: Option<String>,
    #[serde(rename = "ProviderWebsite", default)]
    pub provider_website: Option<String>,
    #[serde(rename = "ProviderAddress", default)]
    pub provider_address: Option<String>,
    #[serde(
        rename = "CapacityTotal",
        default,
        deserialize_with = "common::optional_integer"
    )]
    pub capacity_total: Option<i32>,
    #[serde(
        rename = "CapacityAvailable",
        default,
        deserialize_with = "common::optional_integer"
    )]
    pub capacity_available: Option<i32>,
    #[serde(rename = "NeedsAddressed")]
    pub needs_addressed: Vec<NeedToBeAddressed>,
    pub developmental_disability_diagnosis_criterion: bool,
    pub no_current_or_prior_sex_offense_criterion: bool,
    pub no_current_or_prior_violent_offense_criterion: bool,
    pub no_pending_felony_charges_in_another_county_or_state_criterion: bool,
    pub entry_of_guilty_plea_criterion: bool,
    pub veteran_status_criterion: bool,
    #[serde(default)]
    pub prior_criminal_history_criterion: Option<PriorCriminalHistoryCriterion>,
    pub diagnosed_mental_health_diagnosis_criterion: Vec<DiagnosedMentalHealthDiagnosisCriterion>,
    #[serde(default)]
    pub asam_level_of_care_recommendation_criterion: Option<AsamLevelOfCareRecommendationCriterion>,
    #[serde(default)]
    pub diagnosed_substance_use_disorder_criterion: Option<DiagnosedSubstanceUseDisorderCriterion>,
    #[serde(default, deserialize_with = "common::optional_integer")]
    pub min_lsir_score_criterion: Option<i32>,
    #[serde(default, deserialize_with = "common::optional_integer")]
    pub max_lsir_score_criterion: Option<i32>,
    #[serde(default, deserialize_with = "common::optional_integer")]
    pub min_age: Option<i32>,
    #[serde(default, deserialize_with = "common::optional_integer")]
    pub max_age: Option<i32>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(deserialize_with = "common::date")]
    pub last_updated_date: NaiveDate,
    #[serde(default)]
    pub additional_notes: Option<String>,
    #[serde(default)]
    pub genders: Option<Vec<OpportunityGender>>,
    #[serde(default)]
    pub generic_description: Option<String>,
}

impl ImportRecord for OpportunityRecord {
    const FILE_TYPE: FileType = FileType::Opportunities;

    /// Opportunity exports are per-jurisdiction files without a state column.
    fn state_code(&self) -> Option<StateCode> {
        None
    }
}
