mod cases;
mod clients;
pub(crate) mod common;
mod insights;
mod offenses;
mod opportunities;
mod staff;

pub use cases::CaseRecord;
pub use clients::ClientRecord;
pub use insights::{InsightRecord, RecidivismDataPoint, RecidivismRollup};
pub use offenses::OffenseRecord;
pub use opportunities::OpportunityRecord;
pub use staff::StaffRecord;
