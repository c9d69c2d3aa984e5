//! Identity, severity, and session grant types shared by commands and events.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identity assigned by the service when a connection is established.
///
/// The client never inspects the contents; it only stores the value and
/// echoes it back where the protocol requires one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Severity levels carried by the diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// Credential grant delivered on an anonymous connection once the user
/// authenticates. Consumed exactly once to open a persistent session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionGrant {
    /// Identity the grant was issued for.
    pub identity: Identity,
    /// Durable token accepted by subsequent authenticated connects.
    pub token: String,
    /// Server-side issue time, seconds since the Unix epoch.
    pub created_at: u64,
}
