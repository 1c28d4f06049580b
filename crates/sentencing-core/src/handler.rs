//! Imports one export object: resolve, fetch, split, validate, load.

use std::sync::Arc;

use sentencing_bucket::BucketStore;
use sentencing_parser::{split_records, FileType};
use sentencing_repository::{ImportRepository, ReconcileSummary};
use serde::Serialize;

use crate::error::{ImportError, ImportFailure, Result};
use crate::etl::run_etl;
use crate::reporting::ExceptionReporter;
use crate::routing::ObjectLocation;

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub bucket_id: String,
    pub object_id: String,
    pub jurisdiction: String,
    pub file_type: String,
    /// Records validated and loaded.
    pub records: usize,
    /// Lines dropped because they were not valid JSON.
    pub dropped_lines: usize,
    pub summary: ReconcileSummary,
}

#[derive(Clone)]
pub struct ImportHandler {
    bucket: Arc<dyn BucketStore>,
    repository: Arc<dyn ImportRepository>,
    reporter: Arc<dyn ExceptionReporter>,
    import_bucket_id: String,
}

impl ImportHandler {
    pub fn new(
        bucket: Arc<dyn BucketStore>,
        repository: Arc<dyn ImportRepository>,
        reporter: Arc<dyn ExceptionReporter>,
        import_bucket_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket,
            repository,
            reporter,
            import_bucket_id: import_bucket_id.into(),
        }
    }

    /// Runs the whole import for `bucket_id/object_id`.
    ///
    /// Every error returned here has already been reported.
    #[tracing::instrument(skip(self), fields(jurisdiction, file_type))]
    pub async fn handle(&self, bucket_id: &str, object_id: &str) -> Result<ImportOutcome> {
        let location = ObjectLocation::resolve(bucket_id, object_id, &self.import_bucket_id)
            .map_err(|err| {
                self.reporter.report(&err.to_string());
                ImportError::from(err)
            })?;

        let span = tracing::Span::current();
        span.record("jurisdiction", location.jurisdiction.as_str());
        span.record("file_type", location.file_type.as_str());

        self.import(&location).await.map_err(|err| {
            self.reporter.report(&err.to_string());
            err
        })
    }

    async fn import(&self, location: &ObjectLocation) -> Result<ImportOutcome> {
        let failed = |source: ImportFailure| ImportError::failed(&location.bucket_id, &location.object_id, source);

        let bytes = self
            .bucket
            .get_object(&location.bucket_id, &location.object_id)
            .await
            .map_err(|e| failed(e.into()))?;
        let content = std::str::from_utf8(&bytes).map_err(|e| failed(e.into()))?;

        let batch = split_records(content);
        for line in &batch.rejected {
            self.reporter.report(&format!(
                "Error parsing line {} of object {}: {}",
                line.line_number, location.object_id, line.message
            ));
        }
        tracing::debug!(
            lines = batch.non_blank_lines,
            records = batch.records.len(),
            rejected = batch.rejected.len(),
            "object split"
        );

        let report = run_etl(
            location.file_type,
            self.repository.as_ref(),
            location.jurisdiction,
            batch.records,
        )
        .await
        .map_err(failed)?;

        self.report_pruned(location, &report.summary);

        Ok(ImportOutcome {
            bucket_id: location.bucket_id.clone(),
            object_id: location.object_id.clone(),
            jurisdiction: location.jurisdiction.to_string(),
            file_type: location.file_type.to_string(),
            records: report.records,
            dropped_lines: batch.rejected.len(),
            summary: report.summary,
        })
    }

    /// Cases and offenses are curated downstream, so losing one is flagged.
    fn report_pruned(&self, location: &ObjectLocation, summary: &ReconcileSummary) {
        if summary.deleted_keys.is_empty() {
            return;
        }
        match location.file_type {
            FileType::Cases => self.reporter.report(&format!(
                "Cases deleted from {} because they are missing from the data import: {}",
                location.jurisdiction,
                serde_json::to_string(&summary.deleted_keys).unwrap_or_default()
            )),
            FileType::Offenses => self.reporter.report(&format!(
                "Offenses deleted from {} because they are missing from the data import: {}",
                location.jurisdiction,
                summary.deleted_keys.join(", ")
            )),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::RecordingReporter;
    use sentencing_bucket::MemoryBucketStore;
    use sentencing_parser::StateCode;
    use sentencing_repository::InMemoryRepository;

    const BUCKET: &str = "test-bucket";

    struct Harness {
        bucket: Arc<MemoryBucketStore>,
        repository: Arc<InMemoryRepository>,
        reporter: Arc<RecordingReporter>,
        handler: ImportHandler,
    }

    fn harness() -> Harness {
        let bucket = Arc::new(MemoryBucketStore::new());
        let repository = Arc::new(InMemoryRepository::new());
        let reporter = Arc::new(RecordingReporter::new());
        let handler = ImportHandler::new(
            bucket.clone(),
            repository.clone(),
            reporter.clone(),
            BUCKET,
        );
        Harness {
            bucket,
            repository,
            reporter,
            handler,
        }
    }

    fn offense_line(charge: &str) -> String {
        format!(r#"{{"state_code": "US_ID", "charge": "{charge}", "is_violent": true}}"#)
    }

    #[tokio::test]
    async fn loads_valid_lines_and_reports_bad_ones() {
        let h = harness();
        let object = "US_ID/sentencing_charge_record.json";
        let content = format!(
            "{}\r\n{{not json\n\n{}\n",
            offense_line("Burglary"),
            offense_line("Arson")
        );
        h.bucket.insert(BUCKET, object, content);

        let outcome = h.handler.handle(BUCKET, object).await.unwrap();

        assert_eq!(outcome.records, 2);
        assert_eq!(outcome.dropped_lines, 1);
        assert_eq!(outcome.file_type, "offenses");
        assert_eq!(h.repository.offenses(StateCode::UsId).len(), 2);
        let reports = h.reporter.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with(
            "Error parsing line 2 of object US_ID/sentencing_charge_record.json:"
        ));
    }

    #[tokio::test]
    async fn unsupported_object_is_reported_and_not_fetched() {
        let h = harness();

        let err = h
            .handler
            .handle(BUCKET, "US_MO/sentencing_case_record.json")
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::Routing(_)));
        assert_eq!(
            h.reporter.reports(),
            vec!["Unsupported bucket + object pair: test-bucket/US_MO/sentencing_case_record.json"]
        );
    }

    #[tokio::test]
    async fn missing_object_fails_with_context() {
        let h = harness();

        let err = h
            .handler
            .handle(BUCKET, "US_ND/sentencing_staff_record.json")
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::Failed { .. }));
        let reports = h.reporter.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with(
            "Error importing object US_ND/sentencing_staff_record.json from bucket test-bucket: fetch failed"
        ));
    }

    #[tokio::test]
    async fn non_utf8_content_is_a_fetch_failure() {
        let h = harness();
        let object = "US_ID/sentencing_charge_record.json";
        h.bucket.insert(BUCKET, object, vec![0xff, 0xfe, 0x00]);

        let err = h.handler.handle(BUCKET, object).await.unwrap_err();

        assert!(matches!(
            err,
            ImportError::Failed {
                source: ImportFailure::Encoding(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn pruned_cases_are_reported() {
        let h = harness();
        let object = "US_ID/sentencing_case_record.json";
        let case = |id: &str| {
            format!(
                r#"{{"external_id": "{id}", "state_code": "US_ID", "staff_id": "S1", "client_id": "C1", "sentence_date": "2024-01-01", "assigned_date": "2024-01-02", "county": "Ada"}}"#
            )
        };

        h.bucket
            .insert(BUCKET, object, format!("{}\n{}\n", case("case-1"), case("case-2")));
        h.handler.handle(BUCKET, object).await.unwrap();
        assert!(h.reporter.reports().is_empty());

        h.bucket.insert(BUCKET, object, case("case-2"));
        let outcome = h.handler.handle(BUCKET, object).await.unwrap();

        assert_eq!(outcome.summary.deleted, 1);
        assert_eq!(
            h.reporter.reports(),
            vec![r#"Cases deleted from US_ID because they are missing from the data import: ["case-1"]"#]
        );
    }
}
