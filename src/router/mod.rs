//! # Router
//!
//! Wires message handlers to transport subscriptions and coordinates the
//! service lifecycle.
//!
//! ## Lifecycle
//!
//! `Uninitialized → Wiring → Running → (Stopped | Crashed)`
//!
//! `start` returns only after every handler topic is subscribed, so HTTP
//! traffic is never accepted before the fan-out pipeline can see it.
//!
//! ## Delivery outcomes
//!
//! - success: outbound envelopes are published, then the message is acked
//! - retryable failure (or outbound publish failure): nack, redelivered
//! - permanent failure or panic: logged and acked

mod errors;
mod middleware;

pub use errors::{HandlerError, RouterError, RouterResult};
pub use middleware::{HandlerMiddleware, HandlerPipeline, Next, Observe, Recoverer};

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::events::Envelope;
use crate::transport::{Delivery, DeliveryStream, Transport};

/// Envelopes produced by a successful handler
pub type HandlerResult = Result<Vec<Envelope>, HandlerError>;

/// Consumes one message and returns the messages to publish
pub trait MessageHandler: Send + Sync {
    fn handle<'a>(&'a self, envelope: &'a Envelope) -> BoxFuture<'a, HandlerResult>;
}

/// A delivery as seen by middleware
#[derive(Debug, Clone)]
pub struct Message {
    /// Name of the handler (also its consumer group)
    pub handler: String,
    pub topic: String,
    pub envelope: Envelope,
    pub attempt: u32,
}

/// Router lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterState {
    Uninitialized,
    Wiring,
    Running,
    Stopped,
    Crashed,
}

impl fmt::Display for RouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RouterState::Uninitialized => "uninitialized",
            RouterState::Wiring => "wiring",
            RouterState::Running => "running",
            RouterState::Stopped => "stopped",
            RouterState::Crashed => "crashed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone)]
struct HandlerRegistration {
    name: String,
    subscribe_topic: String,
    publish_topic: Option<String>,
    handler: Arc<dyn MessageHandler>,
}

/// Handler wired to its subscription, ready to consume
struct Consumer {
    name: String,
    topic: String,
    publish_topic: Option<String>,
    pipeline: HandlerPipeline,
    deliveries: DeliveryStream,
}

pub struct Router {
    transport: Arc<dyn Transport>,
    handlers: Mutex<Vec<HandlerRegistration>>,
    middleware: Mutex<Vec<Arc<dyn HandlerMiddleware>>>,
    state: watch::Sender<RouterState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("transport", &self.transport.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn poisoned<T>(_: T) -> RouterError {
    RouterError::Internal("Lock poisoned".into())
}

impl Router {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(RouterState::Uninitialized);
        Self {
            transport,
            handlers: Mutex::new(Vec::new()),
            middleware: Mutex::new(Vec::new()),
            state,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Transport shared with publishers and live streams
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn state(&self) -> RouterState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn state_changes(&self) -> watch::Receiver<RouterState> {
        self.state.subscribe()
    }

    /// Wait until the router leaves `Uninitialized` and `Wiring`
    pub async fn running(&self) -> RouterState {
        let mut changes = self.state.subscribe();
        let settled = changes
            .wait_for(|s| !matches!(s, RouterState::Uninitialized | RouterState::Wiring))
            .await
            .map(|s| *s);
        settled.unwrap_or_else(|_| self.state())
    }

    /// Wait until the router is stopped or crashed
    pub async fn stopped(&self) -> RouterState {
        let mut changes = self.state.subscribe();
        let settled = changes
            .wait_for(|s| matches!(s, RouterState::Stopped | RouterState::Crashed))
            .await
            .map(|s| *s);
        settled.unwrap_or_else(|_| self.state())
    }

    fn ensure_not_started(&self) -> RouterResult<()> {
        if self.state() != RouterState::Uninitialized {
            return Err(RouterError::AlreadyStarted);
        }
        Ok(())
    }

    /// Register a handler consuming `subscribe_topic` under consumer group
    /// `name`; its outbound envelopes go to `publish_topic`
    pub fn add_handler(
        &self,
        name: impl Into<String>,
        subscribe_topic: impl Into<String>,
        publish_topic: Option<&str>,
        handler: Arc<dyn MessageHandler>,
    ) -> RouterResult<()> {
        self.ensure_not_started()?;
        let mut handlers = self.handlers.lock().map_err(poisoned)?;
        handlers.push(HandlerRegistration {
            name: name.into(),
            subscribe_topic: subscribe_topic.into(),
            publish_topic: publish_topic.map(str::to_string),
            handler,
        });
        Ok(())
    }

    /// Add middleware applied to every handler, inside the recoverer
    pub fn add_middleware(&self, middleware: Arc<dyn HandlerMiddleware>) -> RouterResult<()> {
        self.ensure_not_started()?;
        self.middleware.lock().map_err(poisoned)?.push(middleware);
        Ok(())
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().map(|h| h.len()).unwrap_or(0)
    }

    /// Subscribe every handler and start consuming.
    ///
    /// Returns once the router is `Running`, or with the subscription error
    /// that moved it to `Crashed`.
    pub async fn start(self: &Arc<Self>) -> RouterResult<()> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == RouterState::Uninitialized {
                *state = RouterState::Wiring;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(RouterError::AlreadyStarted);
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let router = Arc::clone(self);
        let wiring = tokio::spawn(async move {
            let result = router.wire().await;
            let _ = ready_tx.send(result);
        });
        self.tasks.lock().map_err(poisoned)?.push(wiring);

        match ready_rx.await {
            Ok(result) => result,
            Err(_) => {
                self.state.send_replace(RouterState::Crashed);
                Err(RouterError::WiringAborted)
            }
        }
    }

    async fn wire(self: Arc<Self>) -> RouterResult<()> {
        let registrations: Vec<HandlerRegistration> =
            self.handlers.lock().map_err(poisoned)?.clone();
        let middleware: Vec<Arc<dyn HandlerMiddleware>> =
            self.middleware.lock().map_err(poisoned)?.clone();

        let mut consumers = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let deliveries = match self
                .transport
                .subscribe(&registration.subscribe_topic, Some(&registration.name))
                .await
            {
                Ok(deliveries) => deliveries,
                Err(source) => {
                    error!(
                        handler = %registration.name,
                        topic = %registration.subscribe_topic,
                        error = %source,
                        "Failed to subscribe handler"
                    );
                    self.state.send_replace(RouterState::Crashed);
                    return Err(RouterError::Subscribe {
                        handler: registration.name,
                        source,
                    });
                }
            };

            info!(
                handler = %registration.name,
                topic = %registration.subscribe_topic,
                publish_topic = ?registration.publish_topic,
                "Handler subscribed"
            );
            consumers.push(Consumer {
                pipeline: HandlerPipeline::new(registration.handler, &middleware),
                name: registration.name,
                topic: registration.subscribe_topic,
                publish_topic: registration.publish_topic,
                deliveries,
            });
        }

        self.state.send_replace(RouterState::Running);
        info!(handlers = consumers.len(), transport = self.transport.name(), "Router running");

        let live = Arc::new(AtomicUsize::new(consumers.len()));
        let mut tasks = self.tasks.lock().map_err(poisoned)?;
        for consumer in consumers {
            let router = Arc::clone(&self);
            let live = Arc::clone(&live);
            tasks.push(tokio::spawn(async move {
                let name = consumer.name.clone();
                router.consume(consumer).await;
                info!(handler = %name, "Handler subscription ended");

                if live.fetch_sub(1, Ordering::SeqCst) == 1 {
                    router.state.send_if_modified(|state| {
                        if *state == RouterState::Running {
                            *state = RouterState::Stopped;
                            true
                        } else {
                            false
                        }
                    });
                }
            }));
        }

        Ok(())
    }

    async fn consume(&self, mut consumer: Consumer) {
        while let Some(delivery) = consumer.deliveries.next().await {
            let message = Message {
                handler: consumer.name.clone(),
                topic: consumer.topic.clone(),
                envelope: delivery.envelope.clone(),
                attempt: delivery.attempt,
            };

            match consumer.pipeline.execute(&message).await {
                Ok(outbound) => {
                    let published = self
                        .publish_outbound(
                            &consumer.name,
                            consumer.publish_topic.as_deref(),
                            &message,
                            outbound,
                        )
                        .await;
                    settle(delivery, published).await;
                }
                Err(e) if e.is_retryable() => settle(delivery, false).await,
                Err(e) => {
                    error!(
                        handler = %consumer.name,
                        message_id = %message.envelope.id,
                        error = %e,
                        "Dropping message that cannot be processed"
                    );
                    settle(delivery, true).await;
                }
            }
        }
    }

    /// `handler` and `publish_topic` are borrowed separately from the
    /// consumer: its delivery stream is not `Sync`
    async fn publish_outbound(
        &self,
        handler: &str,
        publish_topic: Option<&str>,
        message: &Message,
        outbound: Vec<Envelope>,
    ) -> bool {
        if outbound.is_empty() {
            return true;
        }
        let Some(topic) = publish_topic else {
            warn!(
                handler,
                produced = outbound.len(),
                "Handler produced messages but has no publish topic"
            );
            return true;
        };

        for envelope in outbound {
            if let Err(e) = self.transport.publish(topic, envelope).await {
                error!(
                    handler,
                    message_id = %message.envelope.id,
                    topic,
                    error = %e,
                    "Failed to publish handler output"
                );
                return false;
            }
        }
        true
    }

    /// Close the transport and stop every consumption task
    pub async fn shutdown(&self) -> RouterResult<()> {
        let closed = self.transport.close().await;

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().map_err(poisoned)?);
        for task in tasks {
            task.abort();
        }

        self.state.send_if_modified(|state| {
            if matches!(state, RouterState::Crashed | RouterState::Stopped) {
                false
            } else {
                *state = RouterState::Stopped;
                true
            }
        });
        info!("Router shut down");

        closed.map_err(RouterError::Shutdown)
    }
}

async fn settle(delivery: Delivery, ack: bool) {
    let id = delivery.envelope.id.clone();
    let result = if ack {
        delivery.ack().await
    } else {
        delivery.nack().await
    };
    if let Err(e) = result {
        warn!(message_id = %id, ack, error = %e, "Failed to settle message");
    }
}
