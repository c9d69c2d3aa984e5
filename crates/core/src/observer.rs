//! Collaborator seams notified by the session lifecycle.

use brook_protocol::Severity;
use tracing::{debug, error, info, warn};

/// UI-side collaborator. Notified when a persistent session connects so
/// the application can move past its authentication view.
pub trait UiNotifier: Send + Sync {
    fn advance_to_session(&self);
}

/// Consumer of the service's diagnostic stream.
pub trait DiagnosticSink: Send + Sync {
    fn publish(&self, severity: Severity, message: &str);
}

/// Forwards the diagnostic stream to the application log.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn publish(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => debug!(target: "brook.diagnostics", "{message}"),
            Severity::Info => info!(target: "brook.diagnostics", "{message}"),
            Severity::Warn => warn!(target: "brook.diagnostics", "{message}"),
            Severity::Error => error!(target: "brook.diagnostics", "{message}"),
        }
    }
}
