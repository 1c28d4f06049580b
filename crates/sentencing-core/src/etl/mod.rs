//! Validate, reshape and load one parsed export.
//!
//! Each entity has an [`EntityLoader`] that turns its typed record into a
//! storage row and hands the whole batch to the repository, which upserts
//! and prunes it in one transaction. [`run_etl`] picks the loader for a file
//! type.

use async_trait::async_trait;
use sentencing_parser::{validate_batch, FileType, ImportRecord, StateCode};
use sentencing_repository::{ImportRepository, ReconcileSummary, RepositoryError};
use serde::Serialize;
use serde_json::Value;

use crate::error::ImportFailure;

mod cases;
mod clients;
mod insights;
mod offenses;
mod opportunities;
mod staff;

pub use cases::CaseLoader;
pub use clients::ClientLoader;
pub use insights::InsightLoader;
pub use offenses::OffenseLoader;
pub use opportunities::OpportunityLoader;
pub use staff::StaffLoader;

#[async_trait]
pub trait EntityLoader: Send + Sync {
    type Record: ImportRecord + Send;
    type Row: Send + Sync;

    /// Maps a validated record onto its storage row.
    fn reshape(&self, record: Self::Record) -> Self::Row;

    /// Replaces the jurisdiction's rows of this entity with `rows`.
    async fn load(
        &self,
        repository: &dyn ImportRepository,
        state_code: StateCode,
        rows: &[Self::Row],
    ) -> Result<ReconcileSummary, RepositoryError>;
}

/// What one ETL pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub records: usize,
    pub summary: ReconcileSummary,
}

pub async fn run_etl(
    file_type: FileType,
    repository: &dyn ImportRepository,
    jurisdiction: StateCode,
    values: Vec<Value>,
) -> Result<LoadReport, ImportFailure> {
    match file_type {
        FileType::Cases => run(&CaseLoader, repository, jurisdiction, values).await,
        FileType::Staff => run(&StaffLoader, repository, jurisdiction, values).await,
        FileType::Clients => run(&ClientLoader, repository, jurisdiction, values).await,
        FileType::Opportunities => {
            run(&OpportunityLoader, repository, jurisdiction, values).await
        }
        FileType::Insights => run(&InsightLoader, repository, jurisdiction, values).await,
        FileType::Offenses => run(&OffenseLoader, repository, jurisdiction, values).await,
    }
}

async fn run<L: EntityLoader>(
    loader: &L,
    repository: &dyn ImportRepository,
    jurisdiction: StateCode,
    values: Vec<Value>,
) -> Result<LoadReport, ImportFailure> {
    let file_type = L::Record::FILE_TYPE;
    let records = validate_batch::<L::Record>(jurisdiction, values)?;

    if records.is_empty() {
        // An empty export still replaces the snapshot.
        tracing::warn!(
            file_type = file_type.as_str(),
            jurisdiction = jurisdiction.as_str(),
            "empty batch; every stored row will be pruned"
        );
    }

    let rows: Vec<L::Row> = records
        .into_iter()
        .map(|record| loader.reshape(record))
        .collect();
    let summary = loader.load(repository, jurisdiction, &rows).await?;

    tracing::info!(
        file_type = file_type.as_str(),
        jurisdiction = jurisdiction.as_str(),
        records = rows.len(),
        inserted = summary.inserted,
        updated = summary.updated,
        deleted = summary.deleted,
        "batch loaded"
    );

    Ok(LoadReport {
        records: rows.len(),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentencing_repository::InMemoryRepository;
    use serde_json::json;

    fn staff(id: &str, case_ids: &[&str]) -> Value {
        json!({
            "external_id": id,
            "pseudonymized_id": format!("p-{id}"),
            "case_ids": serde_json::to_string(case_ids).unwrap(),
            "state_code": "US_ID",
            "full_name": r#"{"given_names": "Ada", "surname": "Lovelace"}"#,
            "email": format!("{id}@example.com"),
        })
    }

    fn case(id: &str, staff_id: &str) -> Value {
        json!({
            "external_id": id,
            "state_code": "US_ID",
            "staff_id": staff_id,
            "client_id": "client-1",
            "sentence_date": "2024-01-02",
            "assigned_date": "2024-01-03",
            "county": "Ada",
        })
    }

    fn staff_ids(repo: &InMemoryRepository) -> Vec<String> {
        repo.staff(StateCode::UsId)
            .into_iter()
            .map(|row| row.external_id)
            .collect()
    }

    #[tokio::test]
    async fn batches_replace_the_previous_snapshot() {
        let repo = InMemoryRepository::new();

        run_etl(
            FileType::Staff,
            &repo,
            StateCode::UsId,
            vec![staff("A", &[]), staff("B", &[]), staff("C", &[])],
        )
        .await
        .unwrap();
        let report = run_etl(
            FileType::Staff,
            &repo,
            StateCode::UsId,
            vec![staff("B", &[]), staff("D", &[])],
        )
        .await
        .unwrap();

        assert_eq!(staff_ids(&repo), vec!["B", "D"]);
        assert_eq!(report.records, 2);
        assert_eq!(report.summary.inserted, 1);
        assert_eq!(report.summary.updated, 1);
        assert_eq!(report.summary.deleted_keys, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn reloading_the_same_batch_changes_nothing() {
        let repo = InMemoryRepository::new();
        let batch = || vec![staff("A", &[]), staff("B", &[])];

        run_etl(FileType::Staff, &repo, StateCode::UsId, batch())
            .await
            .unwrap();
        let before = repo.staff(StateCode::UsId);
        let report = run_etl(FileType::Staff, &repo, StateCode::UsId, batch())
            .await
            .unwrap();

        assert_eq!(repo.staff(StateCode::UsId), before);
        assert_eq!(report.summary.inserted, 0);
        assert_eq!(report.summary.deleted, 0);
    }

    #[tokio::test]
    async fn staff_links_follow_load_order() {
        let repo = InMemoryRepository::new();

        // Case arrives before its staff member, so the link is dropped.
        run_etl(FileType::Cases, &repo, StateCode::UsId, vec![case("case-1", "1")])
            .await
            .unwrap();
        assert_eq!(repo.cases(StateCode::UsId)[0].staff_id, None);

        // Staff listing the case attaches it.
        run_etl(
            FileType::Staff,
            &repo,
            StateCode::UsId,
            vec![staff("1", &["case-1"])],
        )
        .await
        .unwrap();
        assert_eq!(repo.cases(StateCode::UsId)[0].staff_id.as_deref(), Some("1"));

        // Pruning the staff member clears it again.
        run_etl(FileType::Staff, &repo, StateCode::UsId, vec![staff("2", &[])])
            .await
            .unwrap();
        assert_eq!(repo.cases(StateCode::UsId)[0].staff_id, None);
    }

    #[tokio::test]
    async fn cases_link_to_staff_loaded_earlier() {
        let repo = InMemoryRepository::new();

        run_etl(FileType::Staff, &repo, StateCode::UsId, vec![staff("staff-1", &[])])
            .await
            .unwrap();
        run_etl(
            FileType::Cases,
            &repo,
            StateCode::UsId,
            vec![case("case-1", "staff-1")],
        )
        .await
        .unwrap();

        let cases = repo.cases(StateCode::UsId);
        assert_eq!(cases[0].staff_id.as_deref(), Some("staff-1"));
        // No client was loaded, so that link stays empty.
        assert_eq!(cases[0].client_id, None);
    }

    #[tokio::test]
    async fn invalid_record_leaves_storage_untouched() {
        let repo = InMemoryRepository::new();
        run_etl(FileType::Staff, &repo, StateCode::UsId, vec![staff("A", &[])])
            .await
            .unwrap();

        let mut broken = staff("B", &[]);
        broken["full_name"] = json!("not json");
        let err = run_etl(
            FileType::Staff,
            &repo,
            StateCode::UsId,
            vec![staff("C", &[]), broken],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ImportFailure::Schema(_)));
        assert_eq!(staff_ids(&repo), vec!["A"]);
    }

    #[tokio::test]
    async fn empty_batch_prunes_everything() {
        let repo = InMemoryRepository::new();
        run_etl(FileType::Staff, &repo, StateCode::UsId, vec![staff("A", &[])])
            .await
            .unwrap();

        let report = run_etl(FileType::Staff, &repo, StateCode::UsId, Vec::new())
            .await
            .unwrap();

        assert_eq!(report.records, 0);
        assert_eq!(report.summary.deleted, 1);
        assert!(repo.staff(StateCode::UsId).is_empty());
    }

    #[tokio::test]
    async fn jurisdictions_are_reconciled_independently() {
        let repo = InMemoryRepository::new();
        run_etl(FileType::Staff, &repo, StateCode::UsId, vec![staff("A", &[])])
            .await
            .unwrap();

        let mut north_dakota = staff("N", &[]);
        north_dakota["state_code"] = json!("US_ND");
        run_etl(FileType::Staff, &repo, StateCode::UsNd, vec![north_dakota])
            .await
            .unwrap();

        assert_eq!(staff_ids(&repo), vec!["A"]);
        assert_eq!(repo.staff(StateCode::UsNd).len(), 1);
    }
}
