use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::model::{ExternalReportType, Gender, NeedToBeAddressed, OpportunityGender, StateCode};
use crate::{
    split_records, validate_batch, CaseRecord, ClientRecord, FileType, InsightRecord,
    OffenseRecord, OpportunityRecord, SchemaError, StaffRecord,
};

fn case_value(external_id: &str) -> Value {
    json!({
        "external_id": external_id,
        "state_code": "US_ID",
        "staff_id": "staff-1",
        "client_id": "client-1",
        "due_date": "2024-03-01",
        "sentence_date": "2023-12-01T00:00:00.000Z",
        "assigned_date": "2024-01-15",
        "county": "Ada",
        "lsir_score": "27",
        "lsir_level": "3",
        "report_type": "PSI Assigned Full"
    })
}

fn staff_value(external_id: &str) -> Value {
    json!({
        "external_id": external_id,
        "pseudonymized_id": format!("p-{external_id}"),
        "case_ids": "[\"case-1\", \"case-2\"]",
        "state_code": "US_ID",
        "full_name": "{\"given_names\": \"Ada\", \"middle_names\": \"\", \"surname\": \"Lovelace\", \"name_suffix\": \"\"}",
        "email": "ada@example.com"
    })
}

fn opportunity_value() -> Value {
    json!({
        "OpportunityName": "Reentry Housing",
        "CapacityTotal": "12",
        "NeedsAddressed": ["HousingOpportunities", "Education"],
        "developmentalDisabilityDiagnosisCriterion": false,
        "noCurrentOrPriorSexOffenseCriterion": true,
        "noCurrentOrPriorViolentOffenseCriterion": false,
        "noPendingFelonyChargesInAnotherCountyOrStateCriterion": false,
        "entryOfGuiltyPleaCriterion": false,
        "veteranStatusCriterion": false,
        "diagnosedMentalHealthDiagnosisCriterion": ["Any"],
        "diagnosedSubstanceUseDisorderCriterion": "Moderate",
        "minAge": "18",
        "lastUpdatedDate": "2024-05-02",
        "genders": ["Women"]
    })
}

#[test]
fn file_names_resolve_to_exactly_one_file_type() {
    let table = [
        ("sentencing_case_record.json", FileType::Cases),
        ("sentencing_staff_record.json", FileType::Staff),
        ("sentencing_client_record.json", FileType::Clients),
        (
            "sentencing_community_opportunity_record.json",
            FileType::Opportunities,
        ),
        ("case_insights_record.json", FileType::Insights),
        ("sentencing_charge_record.json", FileType::Offenses),
    ];

    for (name, expected) in table {
        assert_eq!(FileType::from_file_name(name), Some(expected));
        assert_eq!(expected.file_name(), name);
    }

    assert_eq!(FileType::from_file_name("sentencing_case_record"), None);
    assert_eq!(FileType::from_file_name("SENTENCING_CASE_RECORD.JSON"), None);
    assert_eq!(FileType::from_file_name("unknown.json"), None);
}

#[test]
fn state_code_accepts_idaho_alias() {
    assert_eq!("US_IX".parse::<StateCode>(), Ok(StateCode::UsId));
    assert_eq!("US_ND".parse::<StateCode>(), Ok(StateCode::UsNd));
    assert!("US_MO".parse::<StateCode>().is_err());

    let parsed: StateCode = serde_json::from_value(json!("US_IX")).expect("alias");
    assert_eq!(parsed, StateCode::UsId);
}

#[test]
fn case_schema_coerces_dates_and_numbers() {
    let records: Vec<CaseRecord> =
        validate_batch(StateCode::UsId, vec![case_value("case-1")]).expect("valid batch");

    let record = &records[0];
    assert_eq!(record.lsir_score, Some(27));
    assert_eq!(record.due_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    assert_eq!(record.completion_date, None);
    assert_eq!(
        record.sentence_date,
        NaiveDate::from_ymd_opt(2023, 12, 1).unwrap()
    );
    assert_eq!(record.report_type, Some(ExternalReportType::PsiAssignedFull));
}

#[test]
fn one_invalid_record_rejects_the_batch() {
    let mut bad = case_value("case-2");
    bad["state_code"] = json!("NOT A STATE");
    let mut also_bad = case_value("case-3");
    also_bad["lsir_score"] = json!("high");

    let err = validate_batch::<CaseRecord>(
        StateCode::UsId,
        vec![case_value("case-1"), bad, also_bad],
    )
    .expect_err("batch should be rejected");

    let SchemaError::InvalidRecords {
        file_type,
        total,
        errors,
    } = &err;
    assert_eq!(*file_type, FileType::Cases);
    assert_eq!(*total, 3);
    assert_eq!(
        errors.iter().map(|e| e.index).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(err.to_string().contains("2 of 3 records invalid"));
}

#[test]
fn records_from_another_jurisdiction_are_rejected() {
    let mut other_state = case_value("case-1");
    other_state["state_code"] = json!("US_ND");

    let err = validate_batch::<CaseRecord>(StateCode::UsId, vec![other_state])
        .expect_err("mismatched jurisdiction");
    assert!(err.errors()[0].message.contains("does not match jurisdiction US_ID"));
}

#[test]
fn staff_schema_decodes_embedded_json() {
    let records: Vec<StaffRecord> =
        validate_batch(StateCode::UsId, vec![staff_value("staff-1")]).expect("valid");

    let staff = &records[0];
    assert_eq!(staff.case_ids, vec!["case-1".to_string(), "case-2".to_string()]);
    assert_eq!(staff.full_name.display_name(), "Ada Lovelace");
}

#[test]
fn staff_schema_rejects_malformed_embedded_json() {
    let mut bad = staff_value("staff-1");
    bad["case_ids"] = json!("[\"case-1\"");

    let err = validate_batch::<StaffRecord>(StateCode::UsId, vec![bad]).expect_err("bad json");
    assert!(err.errors()[0].message.contains("invalid embedded JSON"));
}

#[test]
fn client_schema_requires_known_gender_enum() {
    let value = json!({
        "external_id": "client-1",
        "pseudonymized_id": "p-client-1",
        "case_ids": "[]",
        "state_code": "US_IX",
        "full_name": "{\"given_names\": \"Grace\", \"middle_names\": \"B\", \"surname\": \"Hopper\", \"name_suffix\": \"Jr\"}",
        "gender": "FEMALE",
        "birth_date": "1960-02-03"
    });

    let records: Vec<ClientRecord> =
        validate_batch(StateCode::UsId, vec![value.clone()]).expect("valid");
    assert_eq!(records[0].gender, Gender::Female);
    assert_eq!(records[0].full_name.display_name(), "Grace B Hopper Jr");
    assert_eq!(records[0].county, None);

    let mut bad = value;
    bad["gender"] = json!("SOMETIMES");
    assert!(validate_batch::<ClientRecord>(StateCode::UsId, vec![bad]).is_err());
}

#[test]
fn opportunity_schema_reads_mixed_case_headers() {
    let records: Vec<OpportunityRecord> =
        validate_batch(StateCode::UsNd, vec![opportunity_value()]).expect("valid");

    let opportunity = &records[0];
    assert_eq!(opportunity.opportunity_name, "Reentry Housing");
    assert_eq!(opportunity.provider_name, None);
    assert_eq!(opportunity.capacity_total, Some(12));
    assert_eq!(opportunity.min_age, Some(18));
    assert_eq!(
        opportunity.needs_addressed,
        vec![
            NeedToBeAddressed::HousingOpportunities,
            NeedToBeAddressed::Education
        ]
    );
    assert_eq!(opportunity.genders, Some(vec![OpportunityGender::Women]));
}

#[test]
fn opportunity_schema_requires_criteria_flags() {
    let mut value = opportunity_value();
    value
        .as_object_mut()
        .unwrap()
        .remove("veteranStatusCriterion");

    assert!(validate_batch::<OpportunityRecord>(StateCode::UsId, vec![value]).is_err());
}

#[test]
fn insight_schema_decodes_rollup_and_series() {
    let value = json!({
        "state_code": "US_ID",
        "gender": "MALE",
        "assessment_score_bucket_start": "0",
        "assessment_score_bucket_end": "20",
        "most_severe_description": "Burglary",
        "recidivism_rollup": "{\"state_code\": \"US_ID\", \"gender\": \"MALE\", \"most_severe_description\": \"Burglary\"}",
        "recidivism_num_records": "140",
        "recidivism_probation_series": "[{\"cohort_months\": 12, \"event_rate\": 0.1, \"lower_ci\": 0.05, \"upper_ci\": 0.15}]",
        "disposition_num_records": "90",
        "disposition_probation_pc": 0.5,
        "disposition_rider_pc": 0.3,
        "disposition_term_pc": 0.2
    });

    let records: Vec<InsightRecord> = validate_batch(StateCode::UsId, vec![value]).expect("valid");
    let insight = &records[0];
    assert_eq!(insight.assessment_score_bucket_end, 20);
    assert_eq!(insight.recidivism_rollup.gender, Some(Gender::Male));
    assert_eq!(
        insight
            .recidivism_probation_series
            .as_ref()
            .map(|series| series.len()),
        Some(1)
    );
    assert!(insight.recidivism_rider_series.is_none());
}

#[test]
fn offense_schema_keeps_unspecified_flags_empty() {
    let records: Vec<OffenseRecord> = validate_batch(
        StateCode::UsId,
        vec![json!({"state_code": "US_ID", "charge": "Theft", "is_violent": false})],
    )
    .expect("valid");

    assert_eq!(records[0].is_sex_offense, None);
    assert_eq!(records[0].is_violent, Some(false));
}

#[test]
fn split_records_drops_malformed_lines_only() {
    let content = "{\"a\": 1}\r\n\n{not json}\nnull\n  {\"a\": 2}  \n{\"a\":\n";

    let batch = split_records(content);

    assert_eq!(batch.records, vec![json!({"a": 1}), json!({"a": 2})]);
    assert_eq!(batch.non_blank_lines, 5);
    assert_eq!(
        batch
            .rejected
            .iter()
            .map(|line| line.line_number)
            .collect::<Vec<_>>(),
        vec![3, 6]
    );
}

#[test]
fn split_records_handles_empty_objects() {
    let batch = split_records("");
    assert!(batch.records.is_empty());
    assert!(batch.rejected.is_empty());
    assert_eq!(batch.non_blank_lines, 0);
}
