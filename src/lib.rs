//! TCP line-broadcast relay.
//!
//! Publishers connect to one TCP endpoint and send newline-terminated UTF-8
//! lines; subscribers connect to a second endpoint and receive every
//! published line. Each module focuses on a concrete responsibility:
//!
//! - [`cli`] parses the command-line interface into a server configuration.
//! - [`config`] holds the immutable server configuration, including the
//!   greeting templates shown to connecting publishers.
//! - [`event`] defines the lifecycle/error event union and the sinks that
//!   consume it (a tracing-backed logger and an in-memory recorder).
//! - [`registry`] tracks the currently connected subscribers and hands out
//!   point-in-time snapshots for broadcast.
//! - [`publisher`] and [`subscriber`] drive the per-connection sessions.
//! - [`server`] binds both endpoints and runs the accept loops.
//!
//! Integration tests use this crate directly to stand up a relay on
//! ephemeral ports and exercise it over real sockets.

pub mod cli;
pub mod config;
pub mod event;
pub mod publisher;
pub mod registry;
pub mod server;
pub mod subscriber;

pub(crate) const LINE_ENDINGS: &[char] = &['\n', '\r'];
