use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    core::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};
use super::supervisor::Supervisor;

/// Builder for constructing a Supervisor with optional subscribers.
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (drains, inherits, restarts)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// Starts subscriber workers and the bus forwarder, so listeners created
    /// through the supervisor report to subscribers right away.
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers));

        let (flush_tx, flush_rx) = mpsc::unbounded_channel();

        let sup = Arc::new(Supervisor::new_internal(self.cfg, bus, subs, flush_tx));
        sup.subscriber_listener(flush_rx);
        sup
    }
}

impl Supervisor {
    /// Creates a builder for constructing a Supervisor.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }
}
