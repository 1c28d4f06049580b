//! Turns storage notifications into queued import tasks.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{ImportError, Result};
use crate::reporting::ExceptionReporter;
use crate::routing::ObjectLocation;
use crate::scheduler::{ImportTask, TaskScheduler};

/// Storage event type that signals a new or overwritten object.
pub const OBJECT_FINALIZE: &str = "OBJECT_FINALIZE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportNotification {
    pub bucket_id: String,
    pub object_id: String,
    #[serde(default)]
    pub event_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PubSubMessage {
    pub attributes: ImportNotification,
}

/// Body of `/trigger_import`: a Pub/Sub push envelope or the bare
/// notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NotificationEnvelope {
    PubSub { message: PubSubMessage },
    Direct(ImportNotification),
}

impl NotificationEnvelope {
    pub fn into_notification(self) -> ImportNotification {
        match self {
            NotificationEnvelope::PubSub { message } => message.attributes,
            NotificationEnvelope::Direct(notification) => notification,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Scheduled(ImportTask),
    /// Events other than object creation.
    Ignored { event_type: String },
    /// Reported; nothing was scheduled.
    Unsupported,
}

#[derive(Clone)]
pub struct TriggerReceiver {
    scheduler: Arc<dyn TaskScheduler>,
    reporter: Arc<dyn ExceptionReporter>,
    import_bucket_id: String,
}

impl TriggerReceiver {
    pub fn new(
        scheduler: Arc<dyn TaskScheduler>,
        reporter: Arc<dyn ExceptionReporter>,
        import_bucket_id: impl Into<String>,
    ) -> Self {
        Self {
            scheduler,
            reporter,
            import_bucket_id: import_bucket_id.into(),
        }
    }

    /// Schedules one import task per relevant notification.
    ///
    /// Irrelevant objects are not errors: the notification source must not
    /// retry them.
    pub async fn receive(&self, envelope: NotificationEnvelope) -> Result<TriggerOutcome> {
        let notification = envelope.into_notification();

        if let Some(event_type) = notification
            .event_type
            .filter(|event_type| event_type != OBJECT_FINALIZE)
        {
            tracing::debug!(
                bucket_id = notification.bucket_id.as_str(),
                object_id = notification.object_id.as_str(),
                event_type = event_type.as_str(),
                "ignoring storage event"
            );
            return Ok(TriggerOutcome::Ignored { event_type });
        }

        let location = match ObjectLocation::resolve(
            &notification.bucket_id,
            &notification.object_id,
            &self.import_bucket_id,
        ) {
            Ok(location) => location,
            Err(err) => {
                self.reporter.report(&err.to_string());
                return Ok(TriggerOutcome::Unsupported);
            }
        };

        let task = ImportTask {
            bucket_id: location.bucket_id,
            object_id: location.object_id,
        };
        if let Err(err) = self.scheduler.schedule(&task).await {
            let err = ImportError::from(err);
            self.reporter.report(&err.to_string());
            return Err(err);
        }

        Ok(TriggerOutcome::Scheduled(task))
    }
}
