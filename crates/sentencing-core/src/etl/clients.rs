use async_trait::async_trait;
use sentencing_parser::{ClientRecord, StateCode};
use sentencing_repository::{ClientRow, ImportRepository, ReconcileSummary, RepositoryError};

use super::EntityLoader;

const UNKNOWN_COUNTY: &str = "UNKNOWN";

pub struct ClientLoader;

#[async_trait]
impl EntityLoader for ClientLoader {
    type Record = ClientRecord;
    type Row = ClientRow;

    fn reshape(&self, record: ClientRecord) -> ClientRow {
        ClientRow {
            external_id: record.external_id,
            pseudonymized_id: record.pseudonymized_id,
            full_name: record.full_name.display_name(),
            gender: record.gender,
            // Unknown genders never overwrite a stored one.
            is_gender_locked: record.gender.is_known(),
            county: record
                .county
                .filter(|county| !county.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_COUNTY.to_string()),
            birth_date: record.birth_date,
            district: record.district,
            case_ids: record.case_ids,
        }
    }

    async fn load(
        &self,
        repository: &dyn ImportRepository,
        state_code: StateCode,
        rows: &[ClientRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        repository.replace_clients(state_code, rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sentencing_parser::{FullName, Gender};

    fn record(gender: Gender, county: Option<&str>) -> ClientRecord {
        ClientRecord {
            external_id: "C1".into(),
            pseudonymized_id: "p-C1".into(),
            case_ids: Vec::new(),
            state_code: StateCode::UsNd,
            full_name: FullName {
                given_names: "Alan".into(),
                surname: "Turing".into(),
                ..FullName::default()
            },
            gender,
            county: county.map(str::to_string),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            district: None,
        }
    }

    #[test]
    fn county_defaults_to_unknown() {
        assert_eq!(ClientLoader.reshape(record(Gender::Male, None)).county, "UNKNOWN");
        assert_eq!(ClientLoader.reshape(record(Gender::Male, Some(""))).county, "UNKNOWN");
        assert_eq!(
            ClientLoader.reshape(record(Gender::Male, Some("Cass"))).county,
            "Cass"
        );
    }

    #[test]
    fn only_known_genders_are_locked() {
        assert!(ClientLoader.reshape(record(Gender::TransFemale, None)).is_gender_locked);
        assert!(!ClientLoader.reshape(record(Gender::ExternalUnknown, None)).is_gender_locked);
        assert!(!ClientLoader.reshape(record(Gender::InternalUnknown, None)).is_gender_locked);
    }
}
