pub mod errors;
pub mod formats;
pub mod model;
pub mod ndjson;
mod registry;

pub use errors::{LineError, RecordError, SchemaError};
pub use formats::{
    CaseRecord, ClientRecord, InsightRecord, OffenseRecord, OpportunityRecord,
    RecidivismDataPoint, RecidivismRollup, StaffRecord,
};
pub use model::{
    AsamLevelOfCareRecommendationCriterion, DiagnosedMentalHealthDiagnosisCriterion,
    DiagnosedSubstanceUseDisorderCriterion, ExternalReportType, FullName, Gender,
    NeedToBeAddressed, OpportunityGender, PriorCriminalHistoryCriterion, StateCode,
};
pub use ndjson::{split_records, NdjsonBatch};
pub use registry::{validate_batch, FileType, ImportRecord};

#[cfg(test)]
mod tests;
