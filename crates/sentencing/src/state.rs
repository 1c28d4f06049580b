use std::sync::Arc;

use anyhow::{Context, Result};
use sentencing_bucket::{BucketStore, S3BucketStore};
use sentencing_core::auth::{ExpectedCaller, GoogleIdTokenVerifier, IdentityVerifier};
use sentencing_core::scheduler::{
    AccessTokenSource, CloudTasksScheduler, MetadataServerToken, StaticAccessToken, TaskScheduler,
};
use sentencing_core::{
    ExceptionReporter, ImportConfig, ImportHandler, TracingReporter, TriggerReceiver,
};
use sentencing_repository::{ImportRepository, PostgresRepository};

/// Service accounts allowed to call each route, with their token audiences.
#[derive(Debug, Clone)]
pub struct CallerIdentities {
    /// Storage notification sender, on `/trigger_import`.
    pub notification: ExpectedCaller,
    /// Cloud Tasks caller, on `/handle_import`.
    pub task: ExpectedCaller,
}

pub struct AppState {
    pub trigger: TriggerReceiver,
    pub handler: ImportHandler,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub reporter: Arc<dyn ExceptionReporter>,
    pub callers: CallerIdentities,
}

impl AppState {
    pub fn new(
        scheduler: Arc<dyn TaskScheduler>,
        bucket: Arc<dyn BucketStore>,
        repository: Arc<dyn ImportRepository>,
        verifier: Arc<dyn IdentityVerifier>,
        reporter: Arc<dyn ExceptionReporter>,
        callers: CallerIdentities,
        import_bucket_id: &str,
    ) -> Self {
        Self {
            trigger: TriggerReceiver::new(scheduler, reporter.clone(), import_bucket_id),
            handler: ImportHandler::new(bucket, repository, reporter.clone(), import_bucket_id),
            verifier,
            reporter,
            callers,
        }
    }

    /// Wires the production adapters and applies pending migrations.
    pub async fn from_config(config: &ImportConfig) -> Result<Self> {
        let repository = PostgresRepository::connect(
            &config.database_url,
            config.database_max_connections,
        )
        .await
        .context("failed to connect to Postgres")?;
        repository.run_migrations().await?;

        let bucket = S3BucketStore::new(config.bucket.clone())
            .await
            .context("failed to configure bucket client")?;

        let tokens: Arc<dyn AccessTokenSource> = match &config.google_access_token {
            Some(token) => Arc::new(StaticAccessToken::new(token.clone())),
            None => Arc::new(MetadataServerToken::new()?),
        };
        let scheduler = CloudTasksScheduler::new(config.cloud_tasks.clone(), tokens)
            .context("invalid Cloud Tasks configuration")?;

        let verifier = GoogleIdTokenVerifier::google()?;
        verifier.warm().await;

        Ok(Self::new(
            Arc::new(scheduler),
            Arc::new(bucket),
            Arc::new(repository),
            Arc::new(verifier),
            Arc::new(TracingReporter),
            CallerIdentities {
                notification: ExpectedCaller {
                    email: config.storage_notification_service_account.clone(),
                    audience: config.trigger_audience.clone(),
                },
                task: ExpectedCaller {
                    email: config.cloud_tasks_service_account.clone(),
                    audience: config.handler_audience.clone(),
                },
            },
            &config.import_bucket_id,
        ))
    }
}
