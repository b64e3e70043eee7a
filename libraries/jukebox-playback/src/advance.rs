//! Auto-advance coordinator
//!
//! Turns transport notifications into `TrackEnded`/`TrackFailed` commands on
//! the owning session. The session decides whether the notification is still
//! current; the coordinator only routes.

use crate::controller::Command;
use crate::registry::SessionRegistry;
use jukebox_core::{TransportEvent, TransportEventKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Routes transport events to sessions
pub struct AutoAdvanceCoordinator {
    registry: SessionRegistry,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl AutoAdvanceCoordinator {
    pub fn new(registry: SessionRegistry, events: mpsc::UnboundedReceiver<TransportEvent>) -> Self {
        Self { registry, events }
    }

    /// Run until the transport drops its sender
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.dispatch(event);
        }
        info!("Transport event stream closed");
    }

    fn dispatch(&self, event: TransportEvent) {
        let Some(session) = self.registry.get(event.channel) else {
            debug!(channel = %event.channel, generation = %event.generation, "Event for unknown channel dropped");
            return;
        };

        let command = match event.kind {
            TransportEventKind::Ended => Command::TrackEnded {
                generation: event.generation,
            },
            TransportEventKind::Failed(reason) => Command::TrackFailed {
                generation: event.generation,
                reason,
            },
        };

        if session.send(command).is_err() {
            debug!(channel = %event.channel, "Session closed before event delivery");
        }
    }
}
