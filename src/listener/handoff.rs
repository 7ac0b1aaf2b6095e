//! # Object-safe view of a coordinated listener.
//!
//! The supervisor and the restart path only drain, close and export; they do
//! not accept. [`Handoff`] erases the transport type so listeners of different
//! kinds can share one ordered registry ([`ListenerRef`]).

use std::io;
use std::os::fd::OwnedFd;
use std::sync::Arc;

use async_trait::async_trait;

use super::coordinator::Listener;
use super::listen::Listen;
use crate::error::ListenerError;

/// Drain/close/export operations of a [`Listener`].
#[async_trait]
pub trait Handoff: Send + Sync + 'static {
    /// Label for events and logs.
    fn label(&self) -> &str;

    /// See [`Listener::close_request`].
    async fn close_request(&self);

    /// See [`Listener::close`].
    async fn close(&self) -> Result<(), ListenerError>;

    /// See [`Listener::file`].
    fn file(&self) -> io::Result<OwnedFd>;
}

/// Shared reference to a listener, as held in a registry.
///
/// Order matters: it decides descriptor numbering on restart.
pub type ListenerRef = Arc<dyn Handoff>;

#[async_trait]
impl<L: Listen> Handoff for Listener<L> {
    fn label(&self) -> &str {
        Listener::label(self)
    }

    async fn close_request(&self) {
        Listener::close_request(self).await
    }

    async fn close(&self) -> Result<(), ListenerError> {
        Listener::close(self).await
    }

    fn file(&self) -> io::Result<OwnedFd> {
        Listener::file(self)
    }
}
