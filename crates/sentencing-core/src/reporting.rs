//! Out-of-band exception sink.
//!
//! Import problems are never surfaced to end users; they are reported here
//! and the request answers with a status code only.

pub const EXCEPTION_TARGET: &str = "sentencing::exception";

pub trait ExceptionReporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Emits each report as an error event on [`EXCEPTION_TARGET`], which the log
/// pipeline forwards to error tracking.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ExceptionReporter for TracingReporter {
    fn report(&self, message: &str) {
        tracing::error!(target: EXCEPTION_TARGET, exception = message, "{message}");
    }
}
