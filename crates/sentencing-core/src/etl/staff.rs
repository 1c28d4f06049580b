use async_trait::async_trait;
use sentencing_parser::{StaffRecord, StateCode};
use sentencing_repository::{ImportRepository, ReconcileSummary, RepositoryError, StaffRow};

use super::EntityLoader;

pub struct StaffLoader;

#[async_trait]
impl EntityLoader for StaffLoader {
    type Record = StaffRecord;
    type Row = StaffRow;

    fn reshape(&self, record: StaffRecord) -> StaffRow {
        StaffRow {
            external_id: record.external_id,
            pseudonymized_id: record.pseudonymized_id,
            full_name: record.full_name.display_name(),
            email: Some(record.email).filter(|email| !email.trim().is_empty()),
            case_ids: record.case_ids,
        }
    }

    async fn load(
        &self,
        repository: &dyn ImportRepository,
        state_code: StateCode,
        rows: &[StaffRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        repository.replace_staff(state_code, rows).await
    }
}
