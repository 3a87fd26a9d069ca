use std::sync::{Arc, Mutex, Weak};

use futures::{stream::BoxStream, StreamExt};
use scenedeck_types::{messages::InboundMessage, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel_error;

type Handler = Arc<dyn Fn(&InboundMessage) + Send + Sync>;
type Registry = Mutex<Vec<(Uuid, Handler)>>;

/// Registry of inbound handlers sharing one channel.
#[derive(Clone, Default)]
pub struct MessageHub {
    handlers: Arc<Registry>,
}

impl MessageHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handler stays registered until the returned subscription is
    /// disposed or dropped.
    pub fn register<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.handlers
            .lock()
            .map_err(|_| channel_error("handler registry poisoned"))?
            .push((id, Arc::new(handler)));
        debug!("registered inbound handler {id}");
        Ok(Subscription {
            id,
            registry: Arc::downgrade(&self.handlers),
        })
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().map(|h| h.len()).unwrap_or_default()
    }

    /// Calls every registered handler in registration order.
    pub fn dispatch(&self, message: &InboundMessage) -> usize {
        // Snapshot so handlers may register or dispose while running.
        let handlers: Vec<Handler> = match self.handlers.lock() {
            Ok(guard) => guard.iter().map(|(_, handler)| handler.clone()).collect(),
            Err(_) => {
                warn!("handler registry poisoned; dropping {} message", message.kind());
                return 0;
            }
        };
        for handler in &handlers {
            handler(message);
        }
        handlers.len()
    }

    pub fn dispatch_frame(&self, frame: &str) -> usize {
        match InboundMessage::from_json(frame) {
            Ok(message) => self.dispatch(&message),
            Err(err) => {
                warn!("dropping inbound frame: {err}");
                0
            }
        }
    }

    /// Drives inbound frames into the handlers until the stream ends.
    pub async fn pump(&self, mut frames: BoxStream<'static, String>) {
        info!("inbound message pump started");
        while let Some(frame) = frames.next().await {
            self.dispatch_frame(&frame);
        }
        info!("inbound message pump finished");
    }
}

/// Registration handle returned by [`MessageHub::register`].
pub struct Subscription {
    id: Uuid,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .and_then(|registry| {
                registry
                    .lock()
                    .ok()
                    .map(|handlers| handlers.iter().any(|(id, _)| *id == self.id))
            })
            .unwrap_or(false)
    }

    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if let Ok(mut handlers) = registry.lock() {
            handlers.retain(|(id, _)| *id != self.id);
            debug!("disposed inbound handler {}", self.id);
        };
    }
}
