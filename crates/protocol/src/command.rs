//! Commands sent from the client to the service.

use serde::{Deserialize, Serialize};

/// A named remote operation.
///
/// Commands are fire-and-forget on the wire; server-side validation
/// feedback arrives asynchronously on the diagnostic stream rather than
/// as a direct return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Login {
        username: String,
        password: String,
    },
    Register {
        username: String,
        email: String,
        password: String,
        send_newsletter: bool,
        accepted_terms: bool,
    },
    SetOnline,
    SetOffline,
    Subscribe {
        queries: Vec<String>,
    },
}

impl ClientCommand {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::Login { .. } => "login",
            ClientCommand::Register { .. } => "register",
            ClientCommand::SetOnline => "set_online",
            ClientCommand::SetOffline => "set_offline",
            ClientCommand::Subscribe { .. } => "subscribe",
        }
    }
}
