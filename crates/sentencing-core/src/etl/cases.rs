use async_trait::async_trait;
use sentencing_parser::{CaseRecord, ExternalReportType, StateCode};
use sentencing_repository::{CaseRow, ImportRepository, ReconcileSummary, ReportType, RepositoryError};

use super::EntityLoader;

pub struct CaseLoader;

fn report_type(external: ExternalReportType) -> ReportType {
    match external {
        ExternalReportType::PsiAssignedFull => ReportType::FullPsi,
        ExternalReportType::PsiFileReviewAssigned => ReportType::FileReview,
        ExternalReportType::PsiFileReviewWithLsiAssigned => {
            ReportType::FileReviewWithUpdatedLsirScore
        }
    }
}

#[async_trait]
impl EntityLoader for CaseLoader {
    type Record = CaseRecord;
    type Row = CaseRow;

    fn reshape(&self, record: CaseRecord) -> CaseRow {
        CaseRow {
            external_id: record.external_id,
            staff_id: Some(record.staff_id),
            client_id: Some(record.client_id),
            due_date: record.due_date,
            completion_date: record.completion_date,
            sentence_date: record.sentence_date,
            assigned_date: record.assigned_date,
            county: Some(record.county),
            is_lsir_score_locked: record.lsir_score.is_some(),
            lsir_score: record.lsir_score,
            lsir_level: record.lsir_level,
            is_report_type_locked: record.report_type.is_some(),
            report_type: record.report_type.map(report_type),
        }
    }

    async fn load(
        &self,
        repository: &dyn ImportRepository,
        state_code: StateCode,
        rows: &[CaseRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        repository.replace_cases(state_code, rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record() -> CaseRecord {
        CaseRecord {
            external_id: "case-1".into(),
            state_code: StateCode::UsId,
            staff_id: "S1".into(),
            client_id: "C1".into(),
            due_date: None,
            completion_date: None,
            sentence_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            assigned_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            county: "Ada".into(),
            lsir_score: None,
            lsir_level: None,
            report_type: None,
        }
    }

    #[test]
    fn report_types_map_to_storage_labels() {
        assert_eq!(report_type(ExternalReportType::PsiAssignedFull).as_str(), "FullPSI");
        assert_eq!(
            report_type(ExternalReportType::PsiFileReviewAssigned).as_str(),
            "FileReview"
        );
        assert_eq!(
            report_type(ExternalReportType::PsiFileReviewWithLsiAssigned).as_str(),
            "FileReviewWithUpdatedLSIRScore"
        );
    }

    #[test]
    fn supplied_fields_are_locked() {
        let bare = CaseLoader.reshape(record());
        assert!(!bare.is_lsir_score_locked);
        assert!(!bare.is_report_type_locked);
        assert_eq!(bare.report_type, None);

        let mut full = record();
        full.lsir_score = Some(27);
        full.report_type = Some(ExternalReportType::PsiFileReviewAssigned);
        let row = CaseLoader.reshape(full);
        assert!(row.is_lsir_score_locked);
        assert!(row.is_report_type_locked);
        assert_eq!(row.lsir_score, Some(27));
        assert_eq!(row.report_type, Some(ReportType::FileReview));
        assert_eq!(row.staff_id.as_deref(), Some("S1"));
    }
}
