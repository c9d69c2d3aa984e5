//! Session lifecycle orchestration and the authentication handoff.
//!
//! One controller owns at most one `(connection, worker)` pair at a
//! time. It is constructed once at startup and shared by reference with
//! the UI and the auth gateway; there is no process-wide singleton.
//!
//! The delicate part is the handoff: the session grant callback runs
//! inside the temporary worker's own tick, so it must never wait for
//! that worker to terminate. It only records the grant and hands the
//! close-and-reopen sequence to a task of its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use brook_protocol::{ClientCommand, Identity, SessionGrant, Severity};

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionEvents};
use crate::observer::{DiagnosticSink, UiNotifier};
use crate::transport::Connector;
use crate::worker::PollWorker;

/// Input for the register command.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub send_newsletter: bool,
    pub accepted_terms: bool,
}

impl RegisterRequest {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            send_newsletter: false,
            accepted_terms: false,
        }
    }

    /// Opts into the newsletter.
    pub fn with_newsletter(mut self, opt_in: bool) -> Self {
        self.send_newsletter = opt_in;
        self
    }

    /// Records acceptance of the terms of service.
    pub fn with_accepted_terms(mut self, accepted: bool) -> Self {
        self.accepted_terms = accepted;
        self
    }

    fn into_command(self) -> ClientCommand {
        ClientCommand::Register {
            username: self.username,
            email: self.email,
            password: self.password,
            send_newsletter: self.send_newsletter,
            accepted_terms: self.accepted_terms,
        }
    }
}

#[derive(Default)]
struct ControllerState {
    connection: Option<Arc<Connection>>,
    worker: Option<PollWorker>,
    pending_grant_token: Option<String>,
    local_identity: Option<Identity>,
}

/// Owner of the single live session and driver of the handoff protocol.
pub struct SessionController {
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    ui: Arc<dyn UiNotifier>,
    diagnostics: Arc<dyn DiagnosticSink>,
    state: Mutex<ControllerState>,
    handoff_in_flight: AtomicBool,
    // Handle to ourselves for the callbacks registered on connections;
    // weak, so a dropped controller tears down cleanly.
    weak_self: Weak<SessionController>,
}

impl SessionController {
    pub fn new(
        connector: Arc<dyn Connector>,
        config: ClientConfig,
        ui: Arc<dyn UiNotifier>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            connector,
            config,
            ui,
            diagnostics,
            state: Mutex::new(ControllerState::default()),
            handoff_in_flight: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the current connection, if any, is up. Eventually
    /// consistent; state transitions serialize through the alive-guard,
    /// not through this read.
    pub fn is_connected(&self) -> bool {
        self.state
            .lock()
            .connection
            .as_ref()
            .is_some_and(|connection| connection.is_active())
    }

    /// Identity assigned on the most recent connect.
    pub fn local_identity(&self) -> Option<Identity> {
        self.state.lock().local_identity.clone()
    }

    /// Grant token currently being consumed by an in-flight handoff.
    pub fn pending_grant_token(&self) -> Option<String> {
        self.state.lock().pending_grant_token.clone()
    }

    /// Opens an anonymous session for the authentication flow.
    /// Completion is observed via [`is_connected`](Self::is_connected)
    /// and, after the user authenticates, the session grant handoff.
    pub fn open_temporary_session(&self) {
        let weak = self.weak_self.clone();
        let events = ConnectionEvents {
            on_connect: Some(Box::new({
                let weak = weak.clone();
                move |identity| {
                    if let Some(controller) = weak.upgrade() {
                        controller.state.lock().local_identity = Some(identity);
                    }
                }
            })),
            on_grant: Some(Box::new(move |grant| {
                if let Some(controller) = weak.upgrade() {
                    controller.grant_received(grant);
                }
            })),
            on_diagnostic: Some(self.diagnostic_forwarder()),
            on_disconnect: Some(self.disconnect_reporter()),
        };
        self.open_with("temporary", events, None, false);
    }

    /// Opens a persistent session with a granted token. On connect the
    /// UI collaborator is told to advance past authentication.
    pub fn open_session(&self, token: &str) {
        let weak = self.weak_self.clone();
        let events = ConnectionEvents {
            on_connect: Some(Box::new(move |identity| {
                if let Some(controller) = weak.upgrade() {
                    controller.state.lock().local_identity = Some(identity.clone());
                    info!(target: "brook.session", identity = %identity, "persistent session connected");
                    controller.ui.advance_to_session();
                }
            })),
            on_grant: None,
            on_diagnostic: Some(self.diagnostic_forwarder()),
            on_disconnect: Some(self.disconnect_reporter()),
        };
        self.open_with("persistent", events, Some(token.to_string()), true);
    }

    fn open_with(
        &self,
        kind: &'static str,
        events: ConnectionEvents,
        token: Option<String>,
        persistent: bool,
    ) {
        let mut state = self.state.lock();
        if state
            .worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
        {
            error!(target: "brook.session", kind, "a session is already open; close it first");
            return;
        }

        debug!(target: "brook.session", kind, "opening session");
        state.local_identity = None;
        let connection = Connection::new(events);
        let worker = PollWorker::spawn(
            Arc::clone(&connection),
            Arc::clone(&self.connector),
            self.config.clone(),
            token,
            persistent,
            Arc::clone(&self.diagnostics),
        );
        state.connection = Some(connection);
        state.worker = Some(worker);
    }

    /// Cancels the current worker and waits for it to terminate. Safe
    /// from any context except code running inside the worker's own
    /// tick - lifecycle callbacks hand close requests to a task of
    /// their own instead of awaiting this directly.
    pub async fn close(&self) {
        let (connection, worker) = {
            let mut state = self.state.lock();
            (state.connection.take(), state.worker.take())
        };

        let Some(worker) = worker else {
            debug!(target: "brook.session", "close requested with no open session");
            return;
        };

        info!(target: "brook.session", "closing session");
        worker.request_stop();
        worker.join().await;
        drop(connection);
        debug!(target: "brook.session", "session closed");
    }

    pub fn login(&self, username: &str, password: &str) {
        self.send_command(ClientCommand::Login {
            username: username.to_string(),
            password: password.to_string(),
        });
    }

    pub fn register(&self, request: RegisterRequest) {
        self.send_command(request.into_command());
    }

    pub fn set_online(&self) {
        self.send_command(ClientCommand::SetOnline);
    }

    pub fn set_offline(&self) {
        self.send_command(ClientCommand::SetOffline);
    }

    fn send_command(&self, command: ClientCommand) {
        let connection = self.state.lock().connection.clone();
        match connection {
            Some(connection) => connection.send(command),
            None => {
                error!(
                    target: "brook.session",
                    command = command.name(),
                    "dropping command: no open session"
                );
            }
        }
    }

    /// Entry point of the handoff protocol. Runs inside the temporary
    /// worker's tick, so it only records the grant and spawns the task
    /// that does the closing and reopening.
    fn grant_received(self: Arc<Self>, grant: SessionGrant) {
        if self.handoff_in_flight.swap(true, Ordering::AcqRel) {
            warn!(target: "brook.session", "ignoring session grant: a handoff is already in flight");
            return;
        }

        info!(
            target: "brook.session",
            identity = %grant.identity,
            "session grant received; switching to a persistent session"
        );
        self.state.lock().pending_grant_token = Some(grant.token.clone());

        tokio::spawn(async move {
            self.run_handoff(grant).await;
        });
    }

    async fn run_handoff(self: Arc<Self>, grant: SessionGrant) {
        let old = self.state.lock().connection.clone();
        self.close().await;

        // The worker has terminated, but a transport that ignored the
        // disconnect leaves the old link active. Give it a bounded
        // window, then fall back to staying disconnected.
        if let Some(old) = old {
            let deadline = Instant::now() + self.config.handoff_timeout;
            while old.is_active() {
                if Instant::now() >= deadline {
                    error!(
                        target: "brook.session",
                        timeout_ms = self.config.handoff_timeout.as_millis() as u64,
                        "temporary link never went inactive; abandoning handoff"
                    );
                    self.diagnostics
                        .publish(Severity::Error, "session handoff abandoned: link stayed active");
                    self.finish_handoff();
                    return;
                }
                tokio::time::sleep(self.config.tick_interval).await;
            }
        }

        self.open_session(&grant.token);
        self.finish_handoff();
    }

    fn finish_handoff(&self) {
        self.state.lock().pending_grant_token = None;
        self.handoff_in_flight.store(false, Ordering::Release);
    }

    fn diagnostic_forwarder(&self) -> Box<dyn Fn(Severity, String) + Send + Sync> {
        let sink = Arc::clone(&self.diagnostics);
        Box::new(move |severity, message| sink.publish(severity, &message))
    }

    fn disconnect_reporter(&self) -> Box<dyn Fn(Option<String>) + Send + Sync> {
        let sink = Arc::clone(&self.diagnostics);
        Box::new(move |reason| {
            let reason = reason.unwrap_or_else(|| "unspecified".to_string());
            sink.publish(Severity::Error, &format!("connection lost: {reason}"));
        })
    }
}
