// brook-rs: client connection and session lifecycle for the brook service.
//
// This crate owns the hard part of a brook client: opening, maintaining,
// handing off, and tearing down the link to the remote data service. The
// UI layer, settings persistence, and the wire protocol itself are
// external collaborators reached through the traits in `transport` and
// `observer`.

pub mod config;
pub mod connection;
pub mod error;
pub mod fake_transport;
pub mod gateway;
pub mod observer;
pub mod session;
pub mod transport;
pub mod worker;

pub use config::ClientConfig;
pub use connection::Connection;
pub use error::{Error, Result};
pub use gateway::AuthGateway;
pub use observer::{DiagnosticSink, LogSink, UiNotifier};
pub use session::{RegisterRequest, SessionController};
pub use transport::{Connected, Connector, Transport};
pub use worker::WorkerPhase;

pub use brook_protocol as protocol;
