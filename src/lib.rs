//! # sockvisor
//!
//! **Sockvisor** coordinates graceful shutdown and zero-downtime restarts of
//! tokio network servers.
//!
//! Each listening socket is wrapped in a [`Listener`] that counts the
//! connections it has accepted and lets a close request wait until all of them
//! are finished. On restart the sockets are passed to a freshly spawned copy of
//! the program, which adopts them with [`inherit`] and asks its predecessor to
//! drain with [`close_parent`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ TcpTransport │   │ TcpTransport │   │ custom Listen│
//!     │  (bound or   │   │  (bound or   │   │   transport  │
//!     │  inherited)  │   │  inherited)  │   │              │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Listener    │   │  Listener    │   │  Listener    │
//!     │  + Arbiter   │   │  + Arbiter   │   │  + Arbiter   │
//!     │ (count task) │   │ (count task) │   │ (count task) │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ DrainRequested   │ Drained          │ AcceptRaced ...
//!      ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Signals: stop ─► drain_all(registry), restart ─► restart()     │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          ┌────────┼────────┐
//!                          ▼        ▼        ▼
//!                      LogWriter  sub2 ...  subN
//! ```
//!
//! ### Restart handoff
//! ```text
//! generation N                               generation N+1
//!   restart signal
//!   restart([L0, L1]) ── spawn, LISTEN_FDS=2 ─► inherit() ─► [L0', L1']
//!   (keeps serving)                            accept loops running
//!                                              close_parent() ── stop signal ─┐
//!   drain_all(): wait for in-flight conns ◄───────────────────────────────────┘
//!   exit
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / functions                  |
//! |-------------------|-------------------------------------------------------------|----------------------------------------|
//! | **Listeners**     | Connection accounting, drain-then-close.                    | [`Listener`], [`Conn`], [`Listen`]     |
//! | **Handoff**       | Pass sockets to a successor, adopt them on startup.         | [`restart`], [`inherit`], [`close_parent`] |
//! | **Supervision**   | Signal-driven drain and restart over a listener registry.   | [`Supervisor`], [`CloseMode`]          |
//! | **Subscriber API**| Hook into drain/handoff events (logging, metrics).          | [`Subscribe`], [`LogWriter`]           |
//! | **Errors**        | Typed errors per surface.                                   | [`ListenerError`], [`RestartError`]    |
//! | **Configuration** | Control signals, bus capacity.                              | [`Config`]                             |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use sockvisor::{Config, ListenerRef, LogWriter, Subscribe, Supervisor, TcpTransport};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let sup = Supervisor::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     // Adopt sockets from a predecessor, or bind on a cold start.
//!     let listeners = match sup.inherit() {
//!         Ok(inherited) => inherited,
//!         Err(e) if e.is_cold_start() => vec![sup.listen(TcpTransport::bind("127.0.0.1:8080").await?)],
//!         Err(e) => return Err(e.into()),
//!     };
//!
//!     for l in &listeners {
//!         let l = Arc::clone(l);
//!         tokio::spawn(async move {
//!             while let Ok(conn) = l.accept().await {
//!                 tokio::spawn(async move {
//!                     // ... serve ...
//!                     let _ = conn.close().await;
//!                 });
//!             }
//!         });
//!     }
//!
//!     sup.close_parent()?;
//!     let registry: Vec<ListenerRef> = listeners.into_iter().map(|l| l as ListenerRef).collect();
//!     sup.run(registry).await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod exec;
mod listener;
mod subscribers;

// ---- Public re-exports ----

pub use core::{CloseMode, Config, Supervisor, SupervisorBuilder};
pub use error::{InheritError, ListenerError, RestartError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use exec::{LISTEN_FDS, LISTEN_FDS_START, close_parent, close_parent_with, inherit, restart};
pub use listener::{Conn, Connection, Handoff, Listen, Listener, ListenerRef, TcpTransport};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
