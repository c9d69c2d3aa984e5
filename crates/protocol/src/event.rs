//! Events delivered asynchronously from the service to the client.

use serde::{Deserialize, Serialize};

use crate::types::{SessionGrant, Severity};

/// An inbound event drained from the transport during a poll tick.
///
/// Events are delivered in arrival order within one connection; no
/// ordering is guaranteed across distinct connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// One-shot credential grant after the user authenticated.
    Grant(SessionGrant),
    /// Diagnostic stream entry, including server-side command validation
    /// feedback.
    Diagnostic { severity: Severity, message: String },
    /// The post-connect subscription request was applied.
    SubscriptionApplied,
    /// The service closed the connection.
    Disconnected { reason: Option<String> },
}
