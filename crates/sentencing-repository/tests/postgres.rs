use std::env;

use anyhow::Result;
use chrono::NaiveDate;
use sentencing_parser::{Gender, StateCode};
use sentencing_repository::{
    CaseRecommendation, CaseRow, ClientRow, DataPointRow, DispositionRow, ImportRepository,
    InsightRow, OffenseRow, PostgresRepository, RecidivismSeriesRow, ReportType, RollupRow,
    StaffRow,
};

fn staff(id: &str, case_ids: &[&str]) -> StaffRow {
    StaffRow {
        external_id: id.to_string(),
        pseudonymized_id: format!("p-{id}"),
        full_name: format!("Staff {id}"),
        email: Some(format!("{id}@example.com")),
        case_ids: case_ids.iter().map(|id| id.to_string()).collect(),
    }
}

fn client(id: &str, gender: Gender) -> ClientRow {
    ClientRow {
        external_id: id.to_string(),
        pseudonymized_id: format!("p-{id}"),
        full_name: format!("Client {id}"),
        gender,
        is_gender_locked: gender.is_known(),
        county: "UNKNOWN".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1985, 6, 1).unwrap(),
        district: Some("D1".to_string()),
        case_ids: Vec::new(),
    }
}

fn case(id: &str, staff_id: &str, client_id: &str) -> CaseRow {
    CaseRow {
        external_id: id.to_string(),
        staff_id: Some(staff_id.to_string()),
        client_id: Some(client_id.to_string()),
        due_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        completion_date: None,
        sentence_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        assigned_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        county: Some("Ada".to_string()),
        lsir_score: Some(21),
        lsir_level: None,
        report_type: Some(ReportType::FullPsi),
        is_lsir_score_locked: true,
        is_report_type_locked: true,
    }
}

fn insight(offense: &str) -> InsightRow {
    InsightRow {
        gender: Gender::Male,
        assessment_score_bucket_start: 0,
        assessment_score_bucket_end: 20,
        offense_name: offense.to_string(),
        rollup: RollupRow {
            offense_name: Some("Rollup Offense".to_string()),
            ..RollupRow::default()
        },
        rollup_recidivism_num_records: 140,
        recidivism_series: vec![RecidivismSeriesRow {
            recommendation: CaseRecommendation::Probation,
            data_points: vec![DataPointRow {
                cohort_months: 12,
                event_rate: 0.1,
                lower_ci: 0.05,
                upper_ci: 0.15,
            }],
        }],
        disposition_num_records: 90,
        dispositions: vec![DispositionRow {
            recommendation: CaseRecommendation::Term,
            percentage: 0.2,
        }],
    }
}

async fn count(repo: &PostgresRepository, query: &str) -> Result<i64> {
    Ok(sqlx::query_scalar::<_, i64>(query)
        .fetch_one(repo.pool())
        .await?)
}

#[tokio::test]
async fn replace_operations_reconcile_postgres_tables() -> Result<()> {
    let database_url = match env::var("SENTENCING_TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping repository integration test because SENTENCING_TEST_DATABASE_URL is not set"
            );
            return Ok(());
        }
    };

    let repo = PostgresRepository::connect(&database_url, 2).await?;
    repo.run_migrations().await?;
    sqlx::query(
        "TRUNCATE TABLE staff, client, sentencing_case, opportunity, offense, insight, recidivism_series, recidivism_data_point, disposition",
    )
    .execute(repo.pool())
    .await?;

    // Staff full replace: {A, B, C} then {B, D}.
    repo.replace_staff(
        StateCode::UsId,
        &[staff("A", &[]), staff("B", &[]), staff("C", &[])],
    )
    .await?;
    let summary = repo
        .replace_staff(StateCode::UsId, &[staff("B", &[]), staff("D", &[])])
        .await?;
    assert_eq!((summary.inserted, summary.updated, summary.deleted), (1, 1, 2));
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM staff").await?, 2);

    // Re-running the same batch is a no-op apart from updates.
    let again = repo
        .replace_staff(StateCode::UsId, &[staff("B", &[]), staff("D", &[])])
        .await?;
    assert_eq!((again.inserted, again.updated, again.deleted), (0, 2, 0));

    // Cases link only to rows that exist.
    repo.replace_clients(StateCode::UsId, &[client("c-1", Gender::Female)])
        .await?;
    repo.replace_cases(
        StateCode::UsId,
        &[case("case-1", "B", "c-1"), case("case-2", "Z", "c-9")],
    )
    .await?;
    let dangling: Option<String> = sqlx::query_scalar(
        "SELECT staff_id FROM sentencing_case WHERE state_code = 'US_ID' AND external_id = 'case-2'",
    )
    .fetch_one(repo.pool())
    .await?;
    assert_eq!(dangling, None);

    // Staff that lists a case attaches it; pruning staff clears links.
    repo.replace_staff(StateCode::UsId, &[staff("Z", &["case-2"])])
        .await?;
    let links: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT external_id, staff_id FROM sentencing_case WHERE state_code = 'US_ID' ORDER BY external_id",
    )
    .fetch_all(repo.pool())
    .await?;
    assert_eq!(
        links,
        vec![
            ("case-1".to_string(), None),
            ("case-2".to_string(), Some("Z".to_string())),
        ]
    );

    // Unknown gender never overwrites a known one.
    repo.replace_clients(StateCode::UsId, &[client("c-1", Gender::InternalUnknown)])
        .await?;
    let gender: String =
        sqlx::query_scalar("SELECT gender FROM client WHERE external_id = 'c-1'")
            .fetch_one(repo.pool())
            .await?;
    assert_eq!(gender, "FEMALE");

    // Insights own their children and create the offenses they name.
    repo.replace_insights(StateCode::UsId, &[insight("Burglary")])
        .await?;
    repo.replace_insights(StateCode::UsId, &[insight("Burglary")])
        .await?;
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM insight").await?, 1);
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM recidivism_data_point").await?, 1);
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM disposition").await?, 1);
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM offense").await?, 2);

    // Offenses store unspecified flags as NULL and prune the rest.
    let summary = repo
        .replace_offenses(
            StateCode::UsId,
            &[OffenseRow {
                name: "Burglary".to_string(),
                is_sex_offense: None,
                is_violent_offense: Some(false),
            }],
        )
        .await?;
    assert_eq!(summary.deleted_keys, vec!["Rollup Offense".to_string()]);
    let flags: (Option<bool>, Option<bool>) = sqlx::query_as(
        "SELECT is_sex_offense, is_violent_offense FROM offense WHERE name = 'Burglary'",
    )
    .fetch_one(repo.pool())
    .await?;
    assert_eq!(flags, (None, Some(false)));

    // Another jurisdiction's empty batch leaves US_ID untouched.
    repo.replace_cases(StateCode::UsNd, &[]).await?;
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM sentencing_case").await?, 2);

    Ok(())
}
