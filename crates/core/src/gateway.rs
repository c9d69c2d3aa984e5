//! UI-facing authentication convenience wrapper.
//!
//! View-models hand user input here instead of sequencing the session
//! controller themselves: the gateway opens a temporary session, waits
//! (paced, off the UI thread) for it to come up, and then issues the
//! login or register command.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::session::{RegisterRequest, SessionController};

/// Pause between connection probes while waiting for the temporary
/// session to come up.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Authentication entry point consumed by UI view-models.
pub struct AuthGateway {
    controller: Arc<SessionController>,
}

impl AuthGateway {
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self { controller }
    }

    /// Opens a temporary session and, once connected, sends the login
    /// command. On timeout the request is dropped with a warning and
    /// the session is left open for the caller to inspect or close.
    pub async fn attempt_login(&self, username: &str, password: &str) {
        if !self.wait_for_connection().await {
            return;
        }
        self.controller.login(username, password);
    }

    /// Opens a temporary session and, once connected, sends the
    /// register command. Timeout behavior matches
    /// [`attempt_login`](Self::attempt_login).
    pub async fn attempt_register(&self, request: RegisterRequest) {
        if !self.wait_for_connection().await {
            return;
        }
        self.controller.register(request);
    }

    async fn wait_for_connection(&self) -> bool {
        self.controller.open_temporary_session();

        let budget = self.controller.config().connect_wait;
        let deadline = Instant::now() + budget;
        loop {
            if self.controller.is_connected() {
                debug!(target: "brook.gateway", "session is up");
                return true;
            }
            if Instant::now() >= deadline {
                warn!(
                    target: "brook.gateway",
                    budget_ms = budget.as_millis() as u64,
                    "service did not come up in time; dropping the request"
                );
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
