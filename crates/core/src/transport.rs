//! The opaque transport boundary to the remote service.
//!
//! The wire protocol and data schema are not this crate's concern; the
//! lifecycle layer only needs a factory that opens links and a channel
//! that carries commands out and buffered events in. Production
//! connectors live with the application; tests use
//! [`fake_transport`](crate::fake_transport).

use std::future::Future;
use std::pin::Pin;

use brook_protocol::{ClientCommand, Identity, ServerEvent};

use crate::error::Result;

/// A successfully established link: the live transport plus the identity
/// the service assigned to this client.
pub struct Connected {
    pub transport: Box<dyn Transport>,
    pub identity: Identity,
}

impl std::fmt::Debug for Connected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connected")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Bidirectional message channel to the service.
///
/// Implementations buffer inbound events internally; `drain` hands the
/// backlog to the caller without blocking.
pub trait Transport: Send {
    /// Queues one command for delivery. Delivery feedback arrives
    /// asynchronously on the diagnostic stream, not as a return value.
    fn send(&mut self, command: ClientCommand) -> Result<()>;

    /// Removes and returns all buffered inbound events, in arrival order.
    fn drain(&mut self) -> Vec<ServerEvent>;

    /// Whether the link is still open from the transport's point of view.
    fn is_open(&self) -> bool;

    /// Releases the link. Idempotent.
    fn close(&mut self);
}

/// Factory that opens transports against the remote service.
pub trait Connector: Send + Sync {
    /// Starts a connection attempt. `token` is `None` for anonymous
    /// (temporary) sessions and the granted credential for persistent
    /// ones.
    fn connect(
        &self,
        uri: &str,
        module: &str,
        token: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = Result<Connected>> + Send + '_>>;
}
