//! Wire types for the brook client protocol.
//!
//! This crate contains the serde-serializable types exchanged between a
//! brook client and the remote data service. These types represent the
//! "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with protocol: Match the service's published message schema
//! * Stable: Changes only when the wire protocol changes
//!
//! The session lifecycle built on top of these types lives in `brook-rs`.

pub mod command;
pub mod event;
pub mod types;

pub use command::*;
pub use event::*;
pub use types::*;
