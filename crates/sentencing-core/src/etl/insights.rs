use async_trait::async_trait;
use sentencing_parser::{InsightRecord, RecidivismDataPoint, StateCode};
use sentencing_repository::{
    CaseRecommendation, DataPointRow, DispositionRow, ImportRepository, InsightRow,
    ReconcileSummary, RecidivismSeriesRow, RepositoryError, RollupRow,
};

use super::EntityLoader;

pub struct InsightLoader;

fn series(
    recommendation: CaseRecommendation,
    points: Option<Vec<RecidivismDataPoint>>,
) -> Option<RecidivismSeriesRow> {
    let points = points?;
    Some(RecidivismSeriesRow {
        recommendation,
        data_points: points
            .into_iter()
            .map(|point| DataPointRow {
                cohort_months: point.cohort_months,
                event_rate: point.event_rate,
                lower_ci: point.lower_ci,
                upper_ci: point.upper_ci,
            })
            .collect(),
    })
}

#[async_trait]
impl EntityLoader for InsightLoader {
    type Record = InsightRecord;
    type Row = InsightRow;

    fn reshape(&self, record: InsightRecord) -> InsightRow {
        let rollup = record.recidivism_rollup;

        let recidivism_series = [
            (CaseRecommendation::Probation, record.recidivism_probation_series),
            (CaseRecommendation::Rider, record.recidivism_rider_series),
            (CaseRecommendation::Term, record.recidivism_term_series),
        ]
        .into_iter()
        .filter_map(|(recommendation, points)| series(recommendation, points))
        .collect();

        let dispositions = vec![
            DispositionRow {
                recommendation: CaseRecommendation::Probation,
                percentage: record.disposition_probation_pc,
            },
            DispositionRow {
                recommendation: CaseRecommendation::Rider,
                percentage: record.disposition_rider_pc,
            },
            DispositionRow {
                recommendation: CaseRecommendation::Term,
                percentage: record.disposition_term_pc,
            },
        ];

        InsightRow {
            gender: record.gender,
            assessment_score_bucket_start: record.assessment_score_bucket_start,
            assessment_score_bucket_end: record.assessment_score_bucket_end,
            offense_name: record.most_severe_description,
            rollup: RollupRow {
                gender: rollup.gender,
                assessment_score_bucket_start: rollup.assessment_score_bucket_start,
                assessment_score_bucket_end: rollup.assessment_score_bucket_end,
                offense_name: rollup.most_severe_description,
                ncic_category: rollup.most_severe_ncic_category_uniform,
                combined_offense_category: rollup.combined_offense_category,
                violent_offense: rollup.violent_offense,
            },
            rollup_recidivism_num_records: record.recidivism_num_records,
            recidivism_series,
            disposition_num_records: record.disposition_num_records,
            dispositions,
        }
    }

    async fn load(
        &self,
        repository: &dyn ImportRepository,
        state_code: StateCode,
        rows: &[InsightRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        repository.replace_insights(state_code, rows).await
    }
}
