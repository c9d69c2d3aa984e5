//! The connection handle: one client-side link to the remote service.
//!
//! A handle is exclusively owned by the poll worker that ticks it. The
//! session controller keeps a reference for issuing commands and reading
//! `is_active`, but event dispatch happens only on the worker's loop, so
//! callbacks observe events in arrival order.
//!
//! Nothing here throws across the public boundary: connect failures come
//! back as `Result` to the driving worker, and everything else is logged
//! and converted to a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use brook_protocol::{ClientCommand, Identity, ServerEvent, SessionGrant, Severity};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::transport::{Connector, Transport};

/// Callbacks fired during `tick` and on connect.
///
/// All of them run on the owning worker's loop; none may block on worker
/// termination (see the handoff protocol in [`crate::session`]).
#[derive(Default)]
pub(crate) struct ConnectionEvents {
    pub(crate) on_connect: Option<Box<dyn Fn(Identity) + Send + Sync>>,
    pub(crate) on_grant: Option<Box<dyn Fn(SessionGrant) + Send + Sync>>,
    pub(crate) on_diagnostic: Option<Box<dyn Fn(Severity, String) + Send + Sync>>,
    pub(crate) on_disconnect: Option<Box<dyn Fn(Option<String>) + Send + Sync>>,
}

/// Opaque link to the remote service.
pub struct Connection {
    transport: Mutex<Option<Box<dyn Transport>>>,
    active: AtomicBool,
    identity: Mutex<Option<Identity>>,
    events: ConnectionEvents,
}

impl Connection {
    /// Creates an inactive handle; [`establish`](Self::establish) brings
    /// it up.
    pub(crate) fn new(events: ConnectionEvents) -> Arc<Self> {
        Arc::new(Self {
            transport: Mutex::new(None),
            active: AtomicBool::new(false),
            identity: Mutex::new(None),
            events,
        })
    }

    /// The one-shot connect: awaits the connector, installs the
    /// transport, issues the one-time subscription request, and fires
    /// the connect callback. Invoked exactly once, by the owning worker.
    pub(crate) async fn establish(
        &self,
        connector: &dyn Connector,
        config: &ClientConfig,
        token: Option<&str>,
    ) -> Result<Identity> {
        let connected = connector
            .connect(&config.uri, &config.module, token)
            .await?;

        let identity = connected.identity;
        *self.transport.lock() = Some(connected.transport);
        *self.identity.lock() = Some(identity.clone());
        self.active.store(true, Ordering::Release);

        self.send(ClientCommand::Subscribe {
            queries: config.queries.clone(),
        });

        info!(target: "brook.connection", identity = %identity, "connected");
        if let Some(on_connect) = &self.events.on_connect {
            on_connect(identity.clone());
        }
        Ok(identity)
    }

    /// Whether the link is up. Written by connect/disconnect and by the
    /// service's disconnect notification; reads from other contexts are
    /// eventually consistent.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Identity assigned by the service, once connected.
    pub fn identity(&self) -> Option<Identity> {
        self.identity.lock().clone()
    }

    /// Queues a command on the link. When the link is not active the
    /// command is dropped with one logged error - never an exception.
    pub(crate) fn send(&self, command: ClientCommand) {
        let name = command.name();
        if !self.is_active() {
            error!(
                target: "brook.connection",
                command = name,
                "dropping command: connection is not active"
            );
            return;
        }

        let mut transport = self.transport.lock();
        let Some(transport) = transport.as_mut() else {
            error!(
                target: "brook.connection",
                command = name,
                "dropping command: transport already released"
            );
            return;
        };

        if let Err(err) = transport.send(command) {
            error!(
                target: "brook.connection",
                command = name,
                error = %err,
                "transport refused command"
            );
        } else {
            debug!(target: "brook.connection", command = name, "command sent");
        }
    }

    /// Drains buffered inbound events and dispatches each to the
    /// registered callbacks, in arrival order. Worker-only.
    pub(crate) fn tick(&self) {
        let events = {
            let mut transport = self.transport.lock();
            match transport.as_mut() {
                Some(transport) => transport.drain(),
                None => return,
            }
        };

        // Dispatch outside the transport lock: callbacks may send.
        for event in events {
            self.dispatch(event);
        }
    }

    fn dispatch(&self, event: ServerEvent) {
        match event {
            ServerEvent::Grant(grant) => {
                debug!(target: "brook.connection", identity = %grant.identity, "session grant received");
                if let Some(on_grant) = &self.events.on_grant {
                    on_grant(grant);
                }
            }
            ServerEvent::Diagnostic { severity, message } => {
                if let Some(on_diagnostic) = &self.events.on_diagnostic {
                    on_diagnostic(severity, message);
                }
            }
            ServerEvent::SubscriptionApplied => {
                debug!(target: "brook.connection", "subscription applied");
            }
            ServerEvent::Disconnected { reason } => {
                warn!(
                    target: "brook.connection",
                    reason = reason.as_deref().unwrap_or("none"),
                    "service closed the connection"
                );
                self.active.store(false, Ordering::Release);
                if let Some(mut transport) = self.transport.lock().take() {
                    transport.close();
                }
                if let Some(on_disconnect) = &self.events.on_disconnect {
                    on_disconnect(reason);
                }
            }
        }
    }

    /// Tears the link down and releases the transport. Idempotent; only
    /// the first call reaches the transport.
    pub(crate) fn disconnect(&self) {
        let Some(mut transport) = self.transport.lock().take() else {
            debug!(target: "brook.connection", "disconnect on a released handle");
            return;
        };

        transport.close();
        if transport.is_open() {
            // Leave `active` as-is so the worker can report the fault;
            // the transport is dropped regardless.
            warn!(target: "brook.connection", "transport ignored close");
            return;
        }

        self.active.store(false, Ordering::Release);
        debug!(target: "brook.connection", "disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_transport::FakeHub;
    use parking_lot::Mutex as PlMutex;

    fn config() -> ClientConfig {
        ClientConfig::new("wss://svc.example/db", "app")
    }

    #[tokio::test]
    async fn establish_subscribes_and_reports_the_identity() {
        let (connector, hub) = FakeHub::new();
        let connection = Connection::new(ConnectionEvents::default());

        let identity = connection
            .establish(connector.as_ref(), &config(), None)
            .await
            .unwrap();

        assert!(connection.is_active());
        assert_eq!(connection.identity(), Some(identity));
        let sent = hub.link(0).take_sent();
        assert!(matches!(sent[0], ClientCommand::Subscribe { .. }));
    }

    #[tokio::test]
    async fn send_while_inactive_never_reaches_a_transport() {
        let connection = Connection::new(ConnectionEvents::default());
        connection.send(ClientCommand::SetOnline);
        assert!(!connection.is_active());
    }

    #[tokio::test]
    async fn tick_dispatches_events_in_arrival_order() {
        let (connector, hub) = FakeHub::new();
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let events = ConnectionEvents {
            on_diagnostic: Some(Box::new({
                let seen = Arc::clone(&seen);
                move |_, message| seen.lock().push(message)
            })),
            ..Default::default()
        };
        let connection = Connection::new(events);
        connection
            .establish(connector.as_ref(), &config(), None)
            .await
            .unwrap();

        hub.link(0).inject_diagnostic(Severity::Info, "first");
        hub.link(0).inject_diagnostic(Severity::Info, "second");
        connection.tick();

        assert_eq!(*seen.lock(), vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn remote_disconnect_marks_the_handle_inactive() {
        let (connector, hub) = FakeHub::new();
        let reasons = Arc::new(PlMutex::new(Vec::new()));
        let events = ConnectionEvents {
            on_disconnect: Some(Box::new({
                let reasons = Arc::clone(&reasons);
                move |reason| reasons.lock().push(reason)
            })),
            ..Default::default()
        };
        let connection = Connection::new(events);
        connection
            .establish(connector.as_ref(), &config(), None)
            .await
            .unwrap();

        hub.link(0).inject_disconnected(Some("kicked"));
        connection.tick();

        assert!(!connection.is_active());
        assert_eq!(*reasons.lock(), vec![Some("kicked".to_string())]);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (connector, hub) = FakeHub::new();
        let connection = Connection::new(ConnectionEvents::default());
        connection
            .establish(connector.as_ref(), &config(), None)
            .await
            .unwrap();

        connection.disconnect();
        connection.disconnect();

        assert!(!connection.is_active());
        assert_eq!(hub.link(0).close_calls(), 1);
    }
}
