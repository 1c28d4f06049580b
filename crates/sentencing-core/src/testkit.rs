//! In-process fakes for the pipeline's outbound seams.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{AuthError, IdentityVerifier, VerifiedIdentity};
use crate::reporting::ExceptionReporter;
use crate::scheduler::{ImportTask, SchedulerError, TaskScheduler};

/// Collects exception reports instead of emitting them.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }
}

impl ExceptionReporter for RecordingReporter {
    fn report(&self, message: &str) {
        self.reports.lock().push(message.to_string());
    }
}

/// Records scheduled tasks; optionally rejects every task.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    tasks: Mutex<Vec<ImportTask>>,
    fail: bool,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn tasks(&self) -> Vec<ImportTask> {
        self.tasks.lock().clone()
    }
}

#[async_trait]
impl TaskScheduler for RecordingScheduler {
    async fn schedule(&self, task: &ImportTask) -> Result<(), SchedulerError> {
        if self.fail {
            return Err(SchedulerError::Rejected {
                status: 503,
                body: "queue unavailable".to_string(),
            });
        }
        self.tasks.lock().push(task.clone());
        Ok(())
    }
}

/// Accepts a fixed set of opaque tokens.
#[derive(Debug, Default)]
pub struct StaticVerifier {
    identities: HashMap<String, (VerifiedIdentity, Option<String>)>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` for any audience.
    pub fn with_identity(mut self, token: &str, email: &str, email_verified: bool) -> Self {
        self.identities.insert(
            token.to_string(),
            (
                VerifiedIdentity {
                    email: Some(email.to_string()),
                    email_verified,
                },
                None,
            ),
        );
        self
    }

    /// Restricts an already registered token to `audience`.
    pub fn scoped_to(mut self, token: &str, audience: &str) -> Self {
        if let Some((_, scope)) = self.identities.get_mut(token) {
            *scope = Some(audience.to_string());
        }
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str, audience: &str) -> Result<VerifiedIdentity, AuthError> {
        let (identity, scope) = self
            .identities
            .get(token)
            .ok_or_else(|| AuthError::InvalidToken("unrecognised token".to_string()))?;
        match scope {
            Some(scope) if scope != audience => Err(AuthError::InvalidToken(format!(
                "token audience {scope} does not match {audience}"
            ))),
            _ => Ok(identity.clone()),
        }
    }
}
