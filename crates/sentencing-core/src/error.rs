use sentencing_bucket::BucketError;
use sentencing_parser::SchemaError;
use sentencing_repository::RepositoryError;
use thiserror::Error;

use crate::auth::AuthError;
use crate::routing::RoutingError;
use crate::scheduler::SchedulerError;

/// Why an import of a resolved object failed.
#[derive(Error, Debug)]
pub enum ImportFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] BucketError),

    #[error("object is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("{0}")]
    Schema(#[from] SchemaError),

    #[error("storage failed: {0}")]
    Storage(#[from] RepositoryError),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("Error importing object {object_id} from bucket {bucket_id}: {source}")]
    Failed {
        bucket_id: String,
        object_id: String,
        #[source]
        source: ImportFailure,
    },

    #[error("Error scheduling import: {0}")]
    Scheduler(#[from] SchedulerError),
}

impl ImportError {
    pub(crate) fn failed(bucket_id: &str, object_id: &str, source: impl Into<ImportFailure>) -> Self {
        ImportError::Failed {
            bucket_id: bucket_id.to_string(),
            object_id: object_id.to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
