use async_trait::async_trait;
use sentencing_parser::{OffenseRecord, StateCode};
use sentencing_repository::{ImportRepository, OffenseRow, ReconcileSummary, RepositoryError};

use super::EntityLoader;

pub struct OffenseLoader;

#[async_trait]
impl EntityLoader for OffenseLoader {
    type Record = OffenseRecord;
    type Row = OffenseRow;

    fn reshape(&self, record: OffenseRecord) -> OffenseRow {
        OffenseRow {
            name: record.charge,
            is_sex_offense: record.is_sex_offense,
            is_violent_offense: record.is_violent,
        }
    }

    async fn load(
        &self,
        repository: &dyn ImportRepository,
        state_code: StateCode,
        rows: &[OffenseRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        repository.replace_offenses(state_code, rows).await
    }
}
