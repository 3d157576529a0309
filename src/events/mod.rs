//! Typed in-process event bus.
//!
//! # Data Flow
//! ```text
//! publisher (e.g. sign-up handler)
//!     → EventBus<E>::publish (tokio broadcast)
//!     → one task per registered EventListener<E>
//!     → listener.on_event(event)
//! ```
//!
//! # Design Decisions
//! - Listeners are registered explicitly during startup
//! - Each listener owns its receiver; a slow listener only lags itself
//! - Listener failures are logged and never stop the bus

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Published after a new user finished signing up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpCompleted {
    pub email: String,
    pub name: String,
}

/// Reacts to events of type `E`.
#[async_trait]
pub trait EventListener<E>: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: E) -> Result<(), Self::Error>;
}

/// Broadcast channel for one event type.
#[derive(Debug)]
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Returns how many listeners will see it.
    pub fn publish(&self, event: E) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Register a listener; it sees every event published after this call.
    ///
    /// The listener task stops on shutdown or when every bus handle is dropped.
    pub fn add_listener<L>(&self, listener: Arc<L>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()>
    where
        L: EventListener<E>,
    {
        let mut rx = self.subscribe();
        tracing::debug!(listener = listener.name(), "Event listener registered");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Ok(event) => {
                            if let Err(e) = listener.on_event(event).await {
                                tracing::error!(listener = listener.name(), error = %e, "Event listener failed");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(listener = listener.name(), skipped, "Event listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
            tracing::debug!(listener = listener.name(), "Event listener stopped");
        })
    }
}
