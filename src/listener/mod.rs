//! Coordinated listeners: connection accounting and graceful close.
//!
//! - [`listen`]: transport traits ([`Listen`], [`Connection`]);
//! - [`coordinator`]: [`Listener`], the public per-socket coordinator;
//! - [`arbiter`]: the task that owns the count and decides when a drain completes;
//! - [`conn`]: [`Conn`], the accepted-connection handle;
//! - [`handoff`]: [`Handoff`] / [`ListenerRef`] for type-erased registries;
//! - [`tcp`]: [`TcpTransport`].

mod arbiter;
mod conn;
mod coordinator;
mod handoff;
mod listen;
mod tcp;

#[cfg(test)]
pub(crate) mod testing;

pub use conn::Conn;
pub use coordinator::Listener;
pub use handoff::{Handoff, ListenerRef};
pub use listen::{Connection, Listen};
pub use tcp::TcpTransport;
