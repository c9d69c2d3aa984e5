//! Fake connector and transport for exercising the session lifecycle
//! without a live service.
//!
//! Provides a scripted in-memory implementation of [`Connector`] and
//! [`Transport`]: tests enqueue connect outcomes, inject inbound events
//! into live links, and inspect the commands the client sent.
//!
//! # Example
//!
//! ```ignore
//! let (connector, hub) = FakeHub::new();
//! let controller = SessionController::new(connector, config, ui, sink);
//!
//! controller.open_temporary_session();
//! // ... wait for is_connected() ...
//! hub.link(0).inject_grant("identity-1", "tok123");
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use brook_protocol::{ClientCommand, Identity, ServerEvent, SessionGrant, Severity};

use crate::error::{Error, Result};
use crate::transport::{Connected, Connector, Transport};

/// Scripted outcome for one connect attempt.
pub enum ConnectScript {
    /// Resolve immediately with this identity.
    Accept(Identity),
    /// Resolve immediately with a connect error.
    Reject(String),
    /// Never resolve; the attempt stays pending until dropped.
    Stall,
}

#[derive(Default)]
struct HubState {
    scripts: VecDeque<ConnectScript>,
    attempts: Vec<Option<String>>,
    links: Vec<Arc<Mutex<LinkState>>>,
}

struct LinkState {
    inbound: VecDeque<ServerEvent>,
    sent: Vec<ClientCommand>,
    open: bool,
    close_calls: u32,
    drain_calls: u32,
    ignore_close: bool,
}

/// Test-side controller for the fake service.
///
/// Unscripted connect attempts are accepted with a generated identity,
/// so happy-path tests need no setup beyond [`FakeHub::new`].
pub struct FakeHub {
    state: Arc<Mutex<HubState>>,
}

impl FakeHub {
    /// Creates the connector/controller pair.
    pub fn new() -> (Arc<FakeConnector>, FakeHub) {
        let state = Arc::new(Mutex::new(HubState::default()));
        let connector = Arc::new(FakeConnector {
            state: Arc::clone(&state),
        });
        (connector, FakeHub { state })
    }

    /// Scripts the outcome of the next unscripted connect attempt.
    pub fn expect_connect(&self, script: ConnectScript) {
        self.state.lock().scripts.push_back(script);
    }

    /// Tokens passed to each connect attempt so far, in call order.
    /// `None` marks an anonymous attempt.
    pub fn connect_attempts(&self) -> Vec<Option<String>> {
        self.state.lock().attempts.clone()
    }

    /// Number of links handed out by accepted connects.
    pub fn links(&self) -> usize {
        self.state.lock().links.len()
    }

    /// Handle to the `index`th accepted link, in connect order.
    ///
    /// # Panics
    ///
    /// Panics if no such link exists.
    pub fn link(&self, index: usize) -> FakeLink {
        let state = self.state.lock();
        FakeLink {
            state: Arc::clone(&state.links[index]),
        }
    }
}

/// Test-side handle to one accepted link.
pub struct FakeLink {
    state: Arc<Mutex<LinkState>>,
}

impl FakeLink {
    /// Queues a raw inbound event for the next drain.
    pub fn inject(&self, event: ServerEvent) {
        self.state.lock().inbound.push_back(event);
    }

    /// Queues a session grant event.
    pub fn inject_grant(&self, identity: &str, token: &str) {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.inject(ServerEvent::Grant(SessionGrant {
            identity: Identity::new(identity),
            token: token.to_string(),
            created_at,
        }));
    }

    /// Queues a diagnostic stream entry.
    pub fn inject_diagnostic(&self, severity: Severity, message: &str) {
        self.inject(ServerEvent::Diagnostic {
            severity,
            message: message.to_string(),
        });
    }

    /// Queues a remote-initiated disconnect notification.
    pub fn inject_disconnected(&self, reason: Option<&str>) {
        self.inject(ServerEvent::Disconnected {
            reason: reason.map(str::to_string),
        });
    }

    /// Takes all captured outbound commands, clearing the buffer.
    pub fn take_sent(&self) -> Vec<ClientCommand> {
        std::mem::take(&mut self.state.lock().sent)
    }

    /// Clones the captured outbound commands without clearing them.
    pub fn sent(&self) -> Vec<ClientCommand> {
        self.state.lock().sent.clone()
    }

    /// Number of times the client closed this link.
    pub fn close_calls(&self) -> u32 {
        self.state.lock().close_calls
    }

    /// Number of times the client drained this link.
    pub fn drain_calls(&self) -> u32 {
        self.state.lock().drain_calls
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// When set, `close` is counted but the link stays open - simulates
    /// a transport that does not honor disconnect.
    pub fn set_ignore_close(&self, ignore: bool) {
        self.state.lock().ignore_close = ignore;
    }
}

/// In-memory [`Connector`] backed by a [`FakeHub`] script.
pub struct FakeConnector {
    state: Arc<Mutex<HubState>>,
}

impl Connector for FakeConnector {
    fn connect(
        &self,
        _uri: &str,
        _module: &str,
        token: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = Result<Connected>> + Send + '_>> {
        let state = Arc::clone(&self.state);
        let token = token.map(str::to_string);

        Box::pin(async move {
            let script = {
                let mut hub = state.lock();
                hub.attempts.push(token);
                let fallback = ConnectScript::Accept(Identity::new(format!(
                    "client-{}",
                    hub.attempts.len()
                )));
                hub.scripts.pop_front().unwrap_or(fallback)
            };

            match script {
                ConnectScript::Accept(identity) => {
                    let link = Arc::new(Mutex::new(LinkState {
                        inbound: VecDeque::new(),
                        sent: Vec::new(),
                        open: true,
                        close_calls: 0,
                        drain_calls: 0,
                        ignore_close: false,
                    }));
                    state.lock().links.push(Arc::clone(&link));
                    Ok(Connected {
                        transport: Box::new(FakeLinkTransport { state: link }),
                        identity,
                    })
                }
                ConnectScript::Reject(reason) => Err(Error::Connect(reason)),
                ConnectScript::Stall => std::future::pending().await,
            }
        })
    }
}

struct FakeLinkTransport {
    state: Arc<Mutex<LinkState>>,
}

impl Transport for FakeLinkTransport {
    fn send(&mut self, command: ClientCommand) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::ChannelClosed);
        }
        state.sent.push(command);
        Ok(())
    }

    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut state = self.state.lock();
        state.drain_calls += 1;
        state.inbound.drain(..).collect()
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.close_calls += 1;
        if !state.ignore_close {
            state.open = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unscripted_connects_are_accepted_with_generated_identities() {
        let (connector, hub) = FakeHub::new();

        let first = connector.connect("wss://x", "app", None).await.unwrap();
        let second = connector
            .connect("wss://x", "app", Some("tok"))
            .await
            .unwrap();

        assert_eq!(first.identity.as_str(), "client-1");
        assert_eq!(second.identity.as_str(), "client-2");
        assert_eq!(
            hub.connect_attempts(),
            vec![None, Some("tok".to_string())]
        );
        assert_eq!(hub.links(), 2);
    }

    #[tokio::test]
    async fn link_captures_sends_and_replays_injected_events() {
        let (connector, hub) = FakeHub::new();
        let mut connected = connector.connect("wss://x", "app", None).await.unwrap();

        connected
            .transport
            .send(ClientCommand::SetOnline)
            .unwrap();
        hub.link(0).inject_diagnostic(Severity::Info, "hello");

        assert_eq!(hub.link(0).take_sent(), vec![ClientCommand::SetOnline]);
        let events = connected.transport.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::Diagnostic { .. }));
    }

    #[tokio::test]
    async fn rejected_connect_surfaces_the_reason() {
        let (connector, hub) = FakeHub::new();
        hub.expect_connect(ConnectScript::Reject("nope".to_string()));

        let err = connector
            .connect("wss://x", "app", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connect(reason) if reason == "nope"));
    }

    #[tokio::test]
    async fn ignored_close_leaves_the_link_open() {
        let (connector, hub) = FakeHub::new();
        let mut connected = connector.connect("wss://x", "app", None).await.unwrap();

        hub.link(0).set_ignore_close(true);
        connected.transport.close();

        assert_eq!(hub.link(0).close_calls(), 1);
        assert!(connected.transport.is_open());
    }
}
