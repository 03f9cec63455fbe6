//! Wires a listener to a dispatcher and runs both.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::chain::ChainService;
use crate::config::ListenerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ListenerError;
use crate::listener::Listener;
use crate::publisher::Publisher;
use crate::source::BlockSource;

/// Stops a running [`Service`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    stop: Arc<watch::Sender<bool>>,
}

impl ServiceHandle {
    /// Stop the dispatcher, which in turn stops the listener.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }
}

/// A listener and the dispatcher consuming its events.
pub struct Service<C: ChainService> {
    listener: Listener<C>,
    dispatcher: Dispatcher,
    stop: Arc<watch::Sender<bool>>,
}

impl<C: ChainService> Service<C> {
    pub fn new(chain: Arc<C>, publisher: Arc<dyn Publisher>, config: ListenerConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity.max(1));
        let listener = Listener::new(chain, config, events_tx);
        let (stop, stop_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(publisher, events_rx, listener.handle(), stop_rx);
        Self {
            listener,
            dispatcher,
            stop: Arc::new(stop),
        }
    }

    /// Replace the listener's block source.
    pub fn with_source(mut self, source: BlockSource) -> Self {
        self.listener = self.listener.with_source(source);
        self
    }

    pub fn handle(&self) -> ServiceHandle {
        ServiceHandle {
            stop: Arc::clone(&self.stop),
        }
    }

    /// Run until the listener ends.
    ///
    /// Events already queued when the listener finishes on its own are still
    /// published before this returns. The listener's fatal error, if any, is
    /// returned.
    pub async fn run(self) -> Result<(), ListenerError> {
        let Self {
            mut listener,
            dispatcher,
            stop: _stop,
        } = self;

        info!("service started");
        let dispatching = tokio::spawn(dispatcher.run());

        let result = listener.run().await;
        // Dropping the listener closes the event channel so the dispatcher drains and exits.
        drop(listener);

        if let Err(e) = dispatching.await {
            warn!(error = %e, "dispatcher task failed");
        }
        info!("service stopped");
        result
    }
}
