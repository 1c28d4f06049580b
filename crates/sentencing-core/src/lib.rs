//! The import pipeline: notification → queued task → fetch → ETL.

pub mod auth;
pub mod config;
pub mod error;
pub mod etl;
pub mod handler;
pub mod reporting;
pub mod routing;
pub mod scheduler;
pub mod trigger;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use config::{ConfigError, ImportConfig};
pub use error::{ImportError, ImportFailure};
pub use etl::{run_etl, LoadReport};
pub use handler::{ImportHandler, ImportOutcome};
pub use reporting::{ExceptionReporter, TracingReporter};
pub use routing::{ObjectLocation, RoutingError};
pub use trigger::{NotificationEnvelope, TriggerOutcome, TriggerReceiver};
