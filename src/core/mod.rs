//! Runtime core: configuration, signals and orchestration.
//!
//! The public API from this module is [`Supervisor`] (built through
//! [`SupervisorBuilder`]), which reacts to the stop and restart signals across a
//! registry of listeners, and its [`Config`].
//!
//! Internal modules:
//! - [`supervisor`]: drains listeners concurrently, spawns successors, forwards events;
//! - [`signals`]: maps the configured OS signals onto control actions;
//! - [`builder`]: wires the bus and subscriber workers.

mod builder;
mod config;
mod signals;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub use supervisor::{CloseMode, Supervisor};
