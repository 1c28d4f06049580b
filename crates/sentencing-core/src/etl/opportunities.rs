use async_trait::async_trait;
use sentencing_parser::{Gender, OpportunityRecord, StateCode};
use sentencing_repository::{ImportRepository, OpportunityRow, ReconcileSummary, RepositoryError};

use super::EntityLoader;

const UNKNOWN_PROVIDER: &str = "Unknown";

pub struct OpportunityLoader;

#[async_trait]
impl EntityLoader for OpportunityLoader {
    type Record = OpportunityRecord;
    type Row = OpportunityRow;

    fn reshape(&self, record: OpportunityRecord) -> OpportunityRow {
        OpportunityRow {
            opportunity_name: record.opportunity_name,
            provider_name: record
                .provider_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string()),
            description: record.description,
            provider_phone_number: record.provider_phone_number,
            provider_website: record.provider_website,
            provider_address: record.provider_address,
            capacity_total: record.capacity_total,
            capacity_available: record.capacity_available,
            needs_addressed: record.needs_addressed,
            developmental_disability_diagnosis_criterion: record
                .developmental_disability_diagnosis_criterion,
            no_current_or_prior_sex_offense_criterion: record
                .no_current_or_prior_sex_offense_criterion,
            no_current_or_prior_violent_offense_criterion: record
                .no_current_or_prior_violent_offense_criterion,
            no_pending_felony_charges_in_another_county_or_state_criterion: record
                .no_pending_felony_charges_in_another_county_or_state_criterion,
            entry_of_guilty_plea_criterion: record.entry_of_guilty_plea_criterion,
            veteran_status_criterion: record.veteran_status_criterion,
            prior_criminal_history_criterion: record.prior_criminal_history_criterion,
            diagnosed_mental_health_diagnosis_criterion: record
                .diagnosed_mental_health_diagnosis_criterion,
            asam_level_of_care_recommendation_criterion: record
                .asam_level_of_care_recommendation_criterion,
            diagnosed_substance_use_disorder_criterion: record
                .diagnosed_substance_use_disorder_criterion,
            min_lsir_score_criterion: record.min_lsir_score_criterion,
            max_lsir_score_criterion: record.max_lsir_score_criterion,
            min_age: record.min_age,
            max_age: record.max_age,
            district: record.district,
            last_updated_date: record.last_updated_date,
            additional_notes: record.additional_notes,
            genders: record
                .genders
                .unwrap_or_default()
                .into_iter()
                .map(Gender::from)
                .collect(),
            generic_description: record.generic_description,
        }
    }

    async fn load(
        &self,
        repository: &dyn ImportRepository,
        state_code: StateCode,
        rows: &[OpportunityRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        repository.replace_opportunities(state_code, rows).await
    }
}
