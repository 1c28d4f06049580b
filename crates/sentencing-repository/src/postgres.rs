use std::collections::HashSet;

use async_trait::async_trait;
use sentencing_parser::StateCode;
use sqlx::{Postgres, Transaction};

use crate::rows::{CaseRow, ClientRow, InsightRow, OffenseRow, OpportunityRow, StaffRow};
use crate::{ImportRepository, PostgresRepository, ReconcileSummary, RepositoryError};

fn as_strs<T>(values: &[T], as_str: impl Fn(&T) -> &'static str) -> Vec<String> {
    values.iter().map(|value| as_str(value).to_string()).collect()
}

async fn existing_ids(
    tx: &mut Transaction<'_, Postgres>,
    table_query: &str,
    state_code: StateCode,
) -> Result<HashSet<String>, RepositoryError> {
    let ids: Vec<String> = sqlx::query_scalar(table_query)
        .bind(state_code.as_str())
        .fetch_all(&mut **tx)
        .await?;
    Ok(ids.into_iter().collect())
}

async fn ensure_offense(
    tx: &mut Transaction<'_, Postgres>,
    state_code: StateCode,
    name: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO offense (state_code, name)
        VALUES ($1, $2)
        ON CONFLICT (state_code, name) DO NOTHING
        "#,
    )
    .bind(state_code.as_str())
    .bind(name)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl ImportRepository for PostgresRepository {
    async fn replace_staff(
        &self,
        state_code: StateCode,
        rows: &[StaffRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut summary = ReconcileSummary::default();

        for row in rows {
            let inserted: bool = sqlx::query_scalar(
                r#"
                INSERT INTO staff (state_code, external_id, pseudonymized_id, full_name, email)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (state_code, external_id) DO UPDATE SET
                    pseudonymized_id = EXCLUDED.pseudonymized_id,
                    full_name = EXCLUDED.full_name,
                    email = EXCLUDED.email,
                    imported_at = now()
                RETURNING (xmax = 0)
                "#,
            )
            .bind(state_code.as_str())
            .bind(&row.external_id)
            .bind(&row.pseudonymized_id)
            .bind(&row.full_name)
            .bind(&row.email)
            .fetch_one(&mut *tx)
            .await?;
            summary.record_upsert(inserted);

            if !row.case_ids.is_empty() {
                sqlx::query(
                    r#"
                    UPDATE sentencing_case
                    SET staff_id = $2
                    WHERE state_code = $1 AND external_id = ANY($3)
                    "#,
                )
                .bind(state_code.as_str())
                .bind(&row.external_id)
                .bind(&row.case_ids)
                .execute(&mut *tx)
                .await?;
            }
        }

        let keep: Vec<String> = rows.iter().map(|row| row.external_id.clone()).collect();
        let pruned: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM staff
            WHERE state_code = $1 AND NOT (external_id = ANY($2))
            RETURNING external_id
            "#,
        )
        .bind(state_code.as_str())
        .bind(&keep)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE sentencing_case
            SET staff_id = NULL
            WHERE state_code = $1 AND staff_id IS NOT NULL AND NOT (staff_id = ANY($2))
            "#,
        )
        .bind(state_code.as_str())
        .bind(&keep)
        .execute(&mut *tx)
        .await?;

        tracing::debug!(
            table = "staff",
            state_code = state_code.as_str(),
            upserted = summary.inserted + summary.updated,
            pruned = pruned.len(),
            "reconciled batch"
        );
        summary.record_pruned(pruned);
        tx.commit().await?;
        Ok(summary)
    }

    async fn replace_clients(
        &self,
        state_code: StateCode,
        rows: &[ClientRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut summary = ReconcileSummary::default();

        for row in rows {
            let inserted: bool = sqlx::query_scalar(
                r#"
                INSERT INTO client (
                    state_code,
                    external_id,
                    pseudonymized_id,
                    full_name,
                    gender,
                    is_gender_locked,
                    county,
                    birth_date,
                    district
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (state_code, external_id) DO UPDATE SET
                    pseudonymized_id = EXCLUDED.pseudonymized_id,
                    full_name = EXCLUDED.full_name,
                    gender = CASE
                        WHEN EXCLUDED.is_gender_locked THEN EXCLUDED.gender
                        ELSE client.gender
                    END,
                    is_gender_locked = EXCLUDED.is_gender_locked,
                    county = EXCLUDED.county,
                    birth_date = EXCLUDED.birth_date,
                    district = EXCLUDED.district,
                    imported_at = now()
                RETURNING (xmax = 0)
                "#,
            )
            .bind(state_code.as_str())
            .bind(&row.external_id)
            .bind(&row.pseudonymized_id)
            .bind(&row.full_name)
            .bind(row.gender.as_str())
            .bind(row.is_gender_locked)
            .bind(&row.county)
            .bind(row.birth_date)
            .bind(&row.district)
            .fetch_one(&mut *tx)
            .await?;
            summary.record_upsert(inserted);

            if !row.case_ids.is_empty() {
                sqlx::query(
                    r#"
                    UPDATE sentencing_case
                    SET client_id = $2
                    WHERE state_code = $1 AND external_id = ANY($3)
                    "#,
                )
                .bind(state_code.as_str())
                .bind(&row.external_id)
                .bind(&row.case_ids)
                .execute(&mut *tx)
                .await?;
            }
        }

        let keep: Vec<String> = rows.iter().map(|row| row.external_id.clone()).collect();
        let pruned: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM client
            WHERE state_code = $1 AND NOT (external_id = ANY($2))
            RETURNING external_id
            "#,
        )
        .bind(state_code.as_str())
        .bind(&keep)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE sentencing_case
            SET client_id = NULL
            WHERE state_code = $1 AND client_id IS NOT NULL AND NOT (client_id = ANY($2))
            "#,
        )
        .bind(state_code.as_str())
        .bind(&keep)
        .execute(&mut *tx)
        .await?;

        tracing::debug!(
            table = "client",
            state_code = state_code.as_str(),
            upserted = summary.inserted + summary.updated,
            pruned = pruned.len(),
            "reconciled batch"
        );
        summary.record_pruned(pruned);
        tx.commit().await?;
        Ok(summary)
    }

    async fn replace_cases(
        &self,
        state_code: StateCode,
        rows: &[CaseRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut summary = ReconcileSummary::default();

        let staff_ids = existing_ids(
            &mut tx,
            "SELECT external_id FROM staff WHERE state_code = $1",
            state_code,
        )
        .await?;
        let client_ids = existing_ids(
            &mut tx,
            "SELECT external_id FROM client WHERE state_code = $1",
            state_code,
        )
        .await?;

        for row in rows {
            let staff_id = row.staff_id.as_ref().filter(|id| staff_ids.contains(*id));
            let client_id = row.client_id.as_ref().filter(|id| client_ids.contains(*id));

            let inserted: bool = sqlx::query_scalar(
                r#"
                INSERT INTO sentencing_case (
                    state_code,
                    external_id,
                    staff_id,
                    client_id,
                    due_date,
                    completion_date,
                    sentence_date,
                    assigned_date,
                    county,
                    lsir_score,
                    lsir_level,
                    report_type,
                    is_lsir_score_locked,
                    is_report_type_locked
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (state_code, external_id) DO UPDATE SET
                    staff_id = EXCLUDED.staff_id,
                    client_id = EXCLUDED.client_id,
                    due_date = EXCLUDED.due_date,
                    completion_date = EXCLUDED.completion_date,
                    sentence_date = EXCLUDED.sentence_date,
                    assigned_date = EXCLUDED.assigned_date,
                    county = EXCLUDED.county,
                    lsir_score = EXCLUDED.lsir_score,
                    lsir_level = EXCLUDED.lsir_level,
                    report_type = EXCLUDED.report_type,
                    is_lsir_score_locked = EXCLUDED.is_lsir_score_locked,
                    is_report_type_locked = EXCLUDED.is_report_type_locked,
                    imported_at = now()
                RETURNING (xmax = 0)
                "#,
            )
            .bind(state_code.as_str())
            .bind(&row.external_id)
            .bind(staff_id)
            .bind(client_id)
            .bind(row.due_date)
            .bind(row.completion_date)
            .bind(row.sentence_date)
            .bind(row.assigned_date)
            .bind(&row.county)
            .bind(row.lsir_score)
            .bind(&row.lsir_level)
            .bind(row.report_type.map(|report_type| report_type.as_str()))
            .bind(row.is_lsir_score_locked)
            .bind(row.is_report_type_locked)
            .fetch_one(&mut *tx)
            .await?;
            summary.record_upsert(inserted);
        }

        let keep: Vec<String> = rows.iter().map(|row| row.external_id.clone()).collect();
        let pruned: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM sentencing_case
            WHERE state_code = $1 AND NOT (external_id = ANY($2))
            RETURNING external_id
            "#,
        )
        .bind(state_code.as_str())
        .bind(&keep)
        .fetch_all(&mut *tx)
        .await?;

        tracing::debug!(
            table = "sentencing_case",
            state_code = state_code.as_str(),
            upserted = summary.inserted + summary.updated,
            pruned = pruned.len(),
            "reconciled batch"
        );
        summary.record_pruned(pruned);
        tx.commit().await?;
        Ok(summary)
    }

    async fn replace_opportunities(
        &self,
        state_code: StateCode,
        rows: &[OpportunityRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut summary = ReconcileSummary::default();

        for row in rows {
            let inserted: bool = sqlx::query_scalar(
                r#"
                INSERT INTO opportunity (
                    state_code,
                    opportunity_name,
                    provider_name,
                    description,
                    provider_phone_number,
                    provider_website,
                    provider_address,
                    capacity_total,
                    capacity_available,
                    needs_addressed,
                    developmental_disability_diagnosis_criterion,
                    no_current_or_prior_sex_offense_criterion,
                    no_current_or_prior_violent_offense_criterion,
                    no_pending_felony_charges_in_another_county_or_state_criterion,
                    entry_of_guilty_plea_criterion,
                    veteran_status_criterion,
                    prior_criminal_history_criterion,
                    diagnosed_mental_health_diagnosis_criterion,
                    asam_level_of_care_recommendation_criterion,
                    diagnosed_substance_use_disorder_criterion,
                    min_lsir_score_criterion,
                    max_lsir_score_criterion,
                    min_age,
                    max_age,
                    district,
                    last_updated_date,
                    additional_notes,
                    genders,
                    generic_description
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                    $21, $22, $23, $24, $25, $26, $27, $28, $29
                )
                ON CONFLICT (state_code, opportunity_name, provider_name) DO UPDATE SET
                    description = EXCLUDED.description,
                    provider_phone_number = EXCLUDED.provider_phone_number,
                    provider_website = EXCLUDED.provider_website,
                    provider_address = EXCLUDED.provider_address,
                    capacity_total = EXCLUDED.capacity_total,
                    capacity_available = EXCLUDED.capacity_available,
                    needs_addressed = EXCLUDED.needs_addressed,
                    developmental_disability_diagnosis_criterion = EXCLUDED.developmental_disability_diagnosis_criterion,
                    no_current_or_prior_sex_offense_criterion = EXCLUDED.no_current_or_prior_sex_offense_criterion,
                    no_current_or_prior_violent_offense_criterion = EXCLUDED.no_current_or_prior_violent_offense_criterion,
                    no_pending_felony_charges_in_another_county_or_state_criterion = EXCLUDED.no_pending_felony_charges_in_another_county_or_state_criterion,
                    entry_of_guilty_plea_criterion = EXCLUDED.entry_of_guilty_plea_criterion,
                    veteran_status_criterion = EXCLUDED.veteran_status_criterion,
                    prior_criminal_history_criterion = EXCLUDED.prior_criminal_history_criterion,
                    diagnosed_mental_health_diagnosis_criterion = EXCLUDED.diagnosed_mental_health_diagnosis_criterion,
                    asam_level_of_care_recommendation_criterion = EXCLUDED.asam_level_of_care_recommendation_criterion,
                    diagnosed_substance_use_disorder_criterion = EXCLUDED.diagnosed_substance_use_disorder_criterion,
                    min_lsir_score_criterion = EXCLUDED.min_lsir_score_criterion,
                    max_lsir_score_criterion = EXCLUDED.max_lsir_score_criterion,
                    min_age = EXCLUDED.min_age,
                    max_age = EXCLUDED.max_age,
                    district = EXCLUDED.district,
                    last_updated_date = EXCLUDED.last_updated_date,
                    additional_notes = EXCLUDED.additional_notes,
                    genders = EXCLUDED.genders,
                    generic_description = EXCLUDED.generic_description,
                    imported_at = now()
                RETURNING (xmax = 0)
                "#,
            )
            .bind(state_code.as_str())
            .bind(&row.opportunity_name)
            .bind(&row.provider_name)
            .bind(&row.description)
            .bind(&row.provider_phone_number)
            .bind(&row.provider_website)
            .bind(&row.provider_address)
            .bind(row.capacity_total)
            .bind(row.capacity_available)
            .bind(as_strs(&row.needs_addressed, |need| need.as_str()))
            .bind(row.developmental_disability_diagnosis_criterion)
            .bind(row.no_current_or_prior_sex_offense_criterion)
            .bind(row.no_current_or_prior_violent_offense_criterion)
            .bind(row.no_pending_felony_charges_in_another_county_or_state_criterion)
            .bind(row.entry_of_guilty_plea_criterion)
            .bind(row.veteran_status_criterion)
            .bind(row.prior_criminal_history_criterion.map(|value| value.as_str()))
            .bind(as_strs(
                &row.diagnosed_mental_health_diagnosis_criterion,
                |diagnosis| diagnosis.as_str(),
            ))
            .bind(
                row.asam_level_of_care_recommendation_criterion
                    .map(|value| value.as_str()),
            )
            .bind(
                row.diagnosed_substance_use_disorder_criterion
                    .map(|value| value.as_str()),
            )
            .bind(row.min_lsir_score_criterion)
            .bind(row.max_lsir_score_criterion)
            .bind(row.min_age)
            .bind(row.max_age)
            .bind(&row.district)
            .bind(row.last_updated_date)
            .bind(&row.additional_notes)
            .bind(as_strs(&row.genders, |gender| gender.as_str()))
            .bind(&row.generic_description)
            .fetch_one(&mut *tx)
            .await?;
            summary.record_upsert(inserted);
        }

        let names: Vec<String> = rows.iter().map(|row| row.opportunity_name.clone()).collect();
        let providers: Vec<String> = rows.iter().map(|row| row.provider_name.clone()).collect();
        let pruned: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM opportunity o
            WHERE o.state_code = $1
              AND NOT EXISTS (
                  SELECT 1
                  FROM UNNEST($2::text[], $3::text[]) AS keep(opportunity_name, provider_name)
                  WHERE keep.opportunity_name = o.opportunity_name
                    AND keep.provider_name = o.provider_name
              )
            RETURNING o.opportunity_name || ' / ' || o.provider_name
            "#,
        )
        .bind(state_code.as_str())
        .bind(&names)
        .bind(&providers)
        .fetch_all(&mut *tx)
        .await?;

        tracing::debug!(
            table = "opportunity",
            state_code = state_code.as_str(),
            upserted = summary.inserted + summary.updated,
            pruned = pruned.len(),
            "reconciled batch"
        );
        summary.record_pruned(pruned);
        tx.commit().await?;
        Ok(summary)
    }

    async fn replace_insights(
        &self,
        state_code: StateCode,
        rows: &[InsightRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut summary = ReconcileSummary::default();

        for row in rows {
            for offense_name in row.offense_names() {
                ensure_offense(&mut tx, state_code, offense_name).await?;
            }

            let (insight_id, inserted): (i64, bool) = sqlx::query_as(
                r#"
                INSERT INTO insight (
                    state_code,
                    gender,
                    assessment_score_bucket_start,
                    assessment_score_bucket_end,
                    offense_name,
                    rollup_gender,
                    rollup_assessment_score_bucket_start,
                    rollup_assessment_score_bucket_end,
                    rollup_offense_name,
                    rollup_ncic_category,
                    rollup_combined_offense_category,
                    rollup_violent_offense,
                    rollup_recidivism_num_records,
                    disposition_num_records
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (
                    state_code,
                    gender,
                    assessment_score_bucket_start,
                    assessment_score_bucket_end,
                    offense_name
                ) DO UPDATE SET
                    rollup_gender = EXCLUDED.rollup_gender,
                    rollup_assessment_score_bucket_start = EXCLUDED.rollup_assessment_score_bucket_start,
                    rollup_assessment_score_bucket_end = EXCLUDED.rollup_assessment_score_bucket_end,
                    rollup_offense_name = EXCLUDED.rollup_offense_name,
                    rollup_ncic_category = EXCLUDED.rollup_ncic_category,
                    rollup_combined_offense_category = EXCLUDED.rollup_combined_offense_category,
                    rollup_violent_offense = EXCLUDED.rollup_violent_offense,
                    rollup_recidivism_num_records = EXCLUDED.rollup_recidivism_num_records,
                    disposition_num_records = EXCLUDED.disposition_num_records,
                    imported_at = now()
                RETURNING insight_id, (xmax = 0)
                "#,
            )
            .bind(state_code.as_str())
            .bind(row.gender.as_str())
            .bind(row.assessment_score_bucket_start)
            .bind(row.assessment_score_bucket_end)
            .bind(&row.offense_name)
            .bind(row.rollup.gender.map(|gender| gender.as_str()))
            .bind(row.rollup.assessment_score_bucket_start)
            .bind(row.rollup.assessment_score_bucket_end)
            .bind(&row.rollup.offense_name)
            .bind(&row.rollup.ncic_category)
            .bind(&row.rollup.combined_offense_category)
            .bind(row.rollup.violent_offense)
            .bind(row.rollup_recidivism_num_records)
            .bind(row.disposition_num_records)
            .fetch_one(&mut *tx)
            .await?;
            summary.record_upsert(inserted);

            sqlx::query("DELETE FROM recidivism_series WHERE insight_id = $1")
                .bind(insight_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM disposition WHERE insight_id = $1")
                .bind(insight_id)
                .execute(&mut *tx)
                .await?;

            for series in &row.recidivism_series {
                let series_id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO recidivism_series (insight_id, recommendation)
                    VALUES ($1, $2)
                    RETURNING series_id
                    "#,
                )
                .bind(insight_id)
                .bind(series.recommendation.as_str())
                .fetch_one(&mut *tx)
                .await?;

                for point in &series.data_points {
                    sqlx::query(
                        r#"
                        INSERT INTO recidivism_data_point (
                            series_id,
                            cohort_months,
                            event_rate,
                            lower_ci,
                            upper_ci
                        ) VALUES ($1, $2, $3, $4, $5)
                        "#,
                    )
                    .bind(series_id)
                    .bind(point.cohort_months)
                    .bind(point.event_rate)
                    .bind(point.lower_ci)
                    .bind(point.upper_ci)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            for disposition in &row.dispositions {
                sqlx::query(
                    r#"
                    INSERT INTO disposition (insight_id, recommendation, percentage)
                    VALUES ($1, $2, $3)
                    "#,
                )
                .bind(insight_id)
                .bind(disposition.recommendation.as_str())
                .bind(disposition.percentage)
                .execute(&mut *tx)
                .await?;
            }
        }

        let genders: Vec<String> = rows
            .iter()
            .map(|row| row.gender.as_str().to_string())
            .collect();
        let starts: Vec<i32> = rows
            .iter()
            .map(|row| row.assessment_score_bucket_start)
            .collect();
        let ends: Vec<i32> = rows
            .iter()
            .map(|row| row.assessment_score_bucket_end)
            .collect();
        let offenses: Vec<String> = rows.iter().map(|row| row.offense_name.clone()).collect();

        let pruned: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM insight i
            WHERE i.state_code = $1
              AND NOT EXISTS (
                  SELECT 1
                  FROM UNNEST($2::text[], $3::int4[], $4::int4[], $5::text[])
                      AS keep(gender, bucket_start, bucket_end, offense_name)
                  WHERE keep.gender = i.gender
                    AND keep.bucket_start = i.assessment_score_bucket_start
                    AND keep.bucket_end = i.assessment_score_bucket_end
                    AND keep.offense_name = i.offense_name
              )
            RETURNING i.gender || ' ' || i.assessment_score_bucket_start || '-'
                || i.assessment_score_bucket_end || ' ' || i.offense_name
            "#,
        )
        .bind(state_code.as_str())
        .bind(&genders)
        .bind(&starts)
        .bind(&ends)
        .bind(&offenses)
        .fetch_all(&mut *tx)
        .await?;

        tracing::debug!(
            table = "insight",
            state_code = state_code.as_str(),
            upserted = summary.inserted + summary.updated,
            pruned = pruned.len(),
            "reconciled batch"
        );
        summary.record_pruned(pruned);
        tx.commit().await?;
        Ok(summary)
    }

    async fn replace_offenses(
        &self,
        state_code: StateCode,
        rows: &[OffenseRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut summary = ReconcileSummary::default();

        for row in rows {
            let inserted: bool = sqlx::query_scalar(
                r#"
                INSERT INTO offense (state_code, name, is_sex_offense, is_violent_offense)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (state_code, name) DO UPDATE SET
                    is_sex_offense = EXCLUDED.is_sex_offense,
                    is_violent_offense = EXCLUDED.is_violent_offense,
                    imported_at = now()
                RETURNING (xmax = 0)
                "#,
            )
            .bind(state_code.as_str())
            .bind(&row.name)
            .bind(row.is_sex_offense)
            .bind(row.is_violent_offense)
            .fetch_one(&mut *tx)
            .await?;
            summary.record_upsert(inserted);
        }

        let keep: Vec<String> = rows.iter().map(|row| row.name.clone()).collect();
        let pruned: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM offense
            WHERE state_code = $1 AND NOT (name = ANY($2))
            RETURNING name
            "#,
        )
        .bind(state_code.as_str())
        .bind(&keep)
        .fetch_all(&mut *tx)
        .await?;

        tracing::debug!(
            table = "offense",
            state_code = state_code.as_str(),
            upserted = summary.inserted + summary.updated,
            pruned = pruned.len(),
            "reconciled batch"
        );
        summary.record_pruned(pruned);
        tx.commit().await?;
        Ok(summary)
    }
}
