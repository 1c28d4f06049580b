//! Runtime configuration, read once from the environment at startup.

use std::net::SocketAddr;

use sentencing_bucket::{BucketConfig, GCS_INTEROP_ENDPOINT};
use thiserror::Error;

use crate::scheduler::{CloudTasksConfig, CLOUD_TASKS_API_BASE};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_address: SocketAddr,
    /// The only bucket whose objects are imported.
    pub import_bucket_id: String,
    pub bucket: BucketConfig,
    pub cloud_tasks: CloudTasksConfig,
    /// Identity expected on `/trigger_import` calls.
    pub storage_notification_service_account: String,
    /// Identity expected on `/handle_import` calls.
    pub cloud_tasks_service_account: String,
    /// Audience required of `/trigger_import` tokens.
    pub trigger_audience: String,
    /// Audience required of `/handle_import` tokens, also stamped on tasks.
    pub handler_audience: String,
    /// Static OAuth token for the Cloud Tasks API; the metadata server is
    /// used when unset.
    pub google_access_token: Option<String>,
}

impl ImportConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, reporting every missing
    /// required variable at once. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut missing = Vec::new();
        let mut require = |name: &'static str| match get(name) {
            Some(value) => value,
            None => {
                missing.push(name);
                String::new()
            }
        };

        let database_url = require("DATABASE_URL");
        let import_bucket_id = require("IMPORT_BUCKET_ID");
        let project_id = require("CLOUD_TASKS_PROJECT_ID");
        let location = require("CLOUD_TASKS_LOCATION");
        let queue = require("CLOUD_TASKS_QUEUE");
        let handler_url = require("IMPORT_HANDLER_URL");
        let storage_notification_service_account = require("STORAGE_NOTIFICATION_SERVICE_ACCOUNT");
        let cloud_tasks_service_account = require("CLOUD_TASKS_SERVICE_ACCOUNT");

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let bind_address = get("BIND_ADDRESS")
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDRESS",
                message: e.to_string(),
            })?;

        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "DATABASE_MAX_CONNECTIONS",
                    message: format!("expected a positive integer, got '{raw}'"),
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let handler_audience =
            get("HANDLE_IMPORT_AUDIENCE").unwrap_or_else(|| handler_url.clone());
        let trigger_audience = match get("TRIGGER_IMPORT_AUDIENCE") {
            Some(audience) => audience,
            None => trigger_url(&handler_url)?,
        };

        let bucket = bucket_config(&get);

        let cloud_tasks = CloudTasksConfig {
            project_id,
            location,
            queue,
            handler_url,
            service_account_email: cloud_tasks_service_account.clone(),
            audience: Some(handler_audience.clone()),
            api_base: get("CLOUD_TASKS_API_BASE")
                .unwrap_or_else(|| CLOUD_TASKS_API_BASE.to_string()),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            bind_address,
            import_bucket_id,
            bucket,
            cloud_tasks,
            storage_notification_service_account,
            cloud_tasks_service_account,
            trigger_audience,
            handler_audience,
            google_access_token: get("GOOGLE_ACCESS_TOKEN"),
        })
    }
}

/// The `/trigger_import` URL served next to the configured handler URL.
fn trigger_url(handler_url: &str) -> Result<String, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid {
        name: "IMPORT_HANDLER_URL",
        message,
    };
    let mut url = reqwest::Url::parse(handler_url).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid(format!("'{handler_url}' is not an http(s) URL")));
    }
    let prefix = url
        .path()
        .rsplit_once('/')
        .map(|(prefix, _)| prefix.to_string())
        .unwrap_or_default();
    url.set_path(&format!("{prefix}/trigger_import"));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Bucket settings alone, for tools that only read objects.
pub fn bucket_config_from_env() -> BucketConfig {
    bucket_config(&|name: &str| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn bucket_config(get: &dyn Fn(&str) -> Option<String>) -> BucketConfig {
    BucketConfig {
        endpoint: Some(get("BUCKET_ENDPOINT").unwrap_or_else(|| GCS_INTEROP_ENDPOINT.to_string())),
        region: get("BUCKET_REGION").unwrap_or_else(|| "auto".to_string()),
        access_key_id: get("BUCKET_ACCESS_KEY"),
        secret_access_key: get("BUCKET_SECRET_KEY"),
        force_path_style: true,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn required() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/sentencing"),
            ("IMPORT_BUCKET_ID", "recidiviz-sentencing-exports"),
            ("CLOUD_TASKS_PROJECT_ID", "recidiviz-test"),
            ("CLOUD_TASKS_LOCATION", "us-central1"),
            ("CLOUD_TASKS_QUEUE", "sentencing-import"),
            ("IMPORT_HANDLER_URL", "https://import.example.com/handle_import"),
            (
                "STORAGE_NOTIFICATION_SERVICE_ACCOUNT",
                "gcs-notify@recidiviz-test.iam.gserviceaccount.com",
            ),
            (
                "CLOUD_TASKS_SERVICE_ACCOUNT",
                "tasks@recidiviz-test.iam.gserviceaccount.com",
            ),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<ImportConfig, ConfigError> {
        ImportConfig::from_lookup(|name| vars.get(name).map(|value| value.to_string()))
    }

    #[test]
    fn defaults_fill_optional_settings() {
        let config = load(&required()).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.bucket.endpoint.as_deref(), Some(GCS_INTEROP_ENDPOINT));
        assert_eq!(config.bucket.region, "auto");
        assert_eq!(config.cloud_tasks.api_base, CLOUD_TASKS_API_BASE);
        assert_eq!(
            config.cloud_tasks.service_account_email,
            "tasks@recidiviz-test.iam.gserviceaccount.com"
        );
        assert_eq!(
            config.handler_audience,
            "https://import.example.com/handle_import"
        );
        assert_eq!(
            config.trigger_audience,
            "https://import.example.com/trigger_import"
        );
        assert!(config.google_access_token.is_none());
    }

    #[test]
    fn every_missing_variable_is_listed() {
        let mut vars = required();
        vars.remove("DATABASE_URL");
        vars.remove("CLOUD_TASKS_QUEUE");
        vars.insert("IMPORT_BUCKET_ID", "  ");

        let err = load(&vars).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec!["DATABASE_URL", "IMPORT_BUCKET_ID", "CLOUD_TASKS_QUEUE"])
        );
        assert_eq!(
            err.to_string(),
            "missing required environment variables: DATABASE_URL, IMPORT_BUCKET_ID, CLOUD_TASKS_QUEUE"
        );
    }

    #[test]
    fn malformed_optional_values_are_rejected() {
        let mut vars = required();
        vars.insert("DATABASE_MAX_CONNECTIONS", "zero");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid {
                name: "DATABASE_MAX_CONNECTIONS",
                ..
            })
        ));

        let mut vars = required();
        vars.insert("BIND_ADDRESS", "localhost");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid {
                name: "BIND_ADDRESS",
                ..
            })
        ));
    }

    #[test]
    fn route_audiences_can_be_overridden() {
        let mut vars = required();
        vars.insert("HANDLE_IMPORT_AUDIENCE", "https://import.example.com");
        vars.insert("TRIGGER_IMPORT_AUDIENCE", "https://notify.example.com/push");
        vars.insert("BUCKET_ACCESS_KEY", "GOOG1EXAMPLE");
        vars.insert("BUCKET_SECRET_KEY", "secret");

        let config = load(&vars).unwrap();
        assert_eq!(config.handler_audience, "https://import.example.com");
        assert_eq!(
            config.cloud_tasks.audience.as_deref(),
            Some("https://import.example.com")
        );
        assert_eq!(config.trigger_audience, "https://notify.example.com/push");
        assert_eq!(config.bucket.access_key_id.as_deref(), Some("GOOG1EXAMPLE"));
    }

    #[test]
    fn trigger_audience_keeps_the_handler_path_prefix() {
        let mut vars = required();
        vars.insert("IMPORT_HANDLER_URL", "https://api.example.com/import/handle_import?x=1");
        let config = load(&vars).unwrap();
        assert_eq!(
            config.trigger_audience,
            "https://api.example.com/import/trigger_import"
        );

        vars.insert("IMPORT_HANDLER_URL", "not a url");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid {
                name: "IMPORT_HANDLER_URL",
                ..
            })
        ));
    }
}
