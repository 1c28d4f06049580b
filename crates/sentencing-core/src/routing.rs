//! Maps a `(bucket, object)` pair onto the jurisdiction and export it holds.

use sentencing_parser::{FileType, StateCode};
use thiserror::Error;

/// Jurisdictions whose exports are imported.
pub const SUPPORTED_JURISDICTIONS: [StateCode; 2] = [StateCode::UsId, StateCode::UsNd];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Unsupported bucket + object pair: {bucket_id}/{object_id}")]
    Unsupported {
        bucket_id: String,
        object_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket_id: String,
    pub object_id: String,
    pub jurisdiction: StateCode,
    pub file_type: FileType,
}

impl ObjectLocation {
    /// Resolves an object to its import target.
    ///
    /// The first path segment names the jurisdiction and the last one the
    /// export file. Objects outside `import_bucket_id`, under an unsupported
    /// jurisdiction or with an unknown file name resolve to nothing.
    pub fn resolve(
        bucket_id: &str,
        object_id: &str,
        import_bucket_id: &str,
    ) -> Result<Self, RoutingError> {
        let unsupported = || RoutingError::Unsupported {
            bucket_id: bucket_id.to_string(),
            object_id: object_id.to_string(),
        };

        if bucket_id != import_bucket_id {
            return Err(unsupported());
        }

        let prefix = object_id.split('/').next().unwrap_or_default();
        let file_name = object_id.rsplit('/').next().unwrap_or_default();

        let jurisdiction = prefix
            .parse::<StateCode>()
            .ok()
            .filter(|code| SUPPORTED_JURISDICTIONS.contains(code))
            .ok_or_else(unsupported)?;
        let file_type = FileType::from_file_name(file_name).ok_or_else(unsupported)?;

        Ok(Self {
            bucket_id: bucket_id.to_string(),
            object_id: object_id.to_string(),
            jurisdiction,
            file_type,
        })
    }
}
