//! # Handler Middleware
//!
//! Every handler runs behind a chain of middleware:
//! Recoverer → user middleware → Observe → handler.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::{debug, error, warn};

use super::errors::HandlerError;
use super::{HandlerResult, Message, MessageHandler};

/// Middleware stage around a handler
pub trait HandlerMiddleware: Send + Sync {
    fn process<'a>(&'a self, message: &'a Message, next: Next<'a>)
        -> BoxFuture<'a, HandlerResult>;
}

/// Next middleware in chain
pub struct Next<'a> {
    middleware: &'a [Arc<dyn HandlerMiddleware>],
    handler: &'a dyn MessageHandler,
}

impl<'a> Next<'a> {
    /// Run the next middleware or the handler
    pub fn run(self, message: &'a Message) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if let Some((first, rest)) = self.middleware.split_first() {
                let next = Next {
                    middleware: rest,
                    handler: self.handler,
                };
                first.process(message, next).await
            } else {
                self.handler.handle(&message.envelope).await
            }
        })
    }
}

/// A handler wrapped in its middleware chain
pub struct HandlerPipeline {
    middleware: Vec<Arc<dyn HandlerMiddleware>>,
    handler: Arc<dyn MessageHandler>,
}

impl HandlerPipeline {
    /// Wrap `handler` as Recoverer → `middleware` → Observe → handler
    pub fn new(handler: Arc<dyn MessageHandler>, middleware: &[Arc<dyn HandlerMiddleware>]) -> Self {
        let mut chain: Vec<Arc<dyn HandlerMiddleware>> = Vec::with_capacity(middleware.len() + 2);
        chain.push(Arc::new(Recoverer));
        chain.extend(middleware.iter().cloned());
        chain.push(Arc::new(Observe));

        Self {
            middleware: chain,
            handler,
        }
    }

    pub async fn execute(&self, message: &Message) -> HandlerResult {
        let next = Next {
            middleware: &self.middleware,
            handler: self.handler.as_ref(),
        };
        next.run(message).await
    }

    /// Get the number of middleware stages
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }
}

/// Turns a handler panic into a non-retryable error
pub struct Recoverer;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl HandlerMiddleware for Recoverer {
    fn process<'a>(&'a self, message: &'a Message, next: Next<'a>)
        -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            match AssertUnwindSafe(next.run(message)).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(
                        handler = %message.handler,
                        message_id = %message.envelope.id,
                        panic = %reason,
                        "Handler panicked"
                    );
                    Err(HandlerError::Panicked(reason))
                }
            }
        })
    }
}

/// Per-message tracing
pub struct Observe;

impl HandlerMiddleware for Observe {
    fn process<'a>(&'a self, message: &'a Message, next: Next<'a>)
        -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let start = Instant::now();
            let result = next.run(message).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(outbound) => debug!(
                    handler = %message.handler,
                    topic = %message.topic,
                    message_id = %message.envelope.id,
                    attempt = message.attempt,
                    produced = outbound.len(),
                    elapsed_ms,
                    "Message handled"
                ),
                Err(e) => warn!(
                    handler = %message.handler,
                    topic = %message.topic,
                    message_id = %message.envelope.id,
                    attempt = message.attempt,
                    retryable = e.is_retryable(),
                    error = %e,
                    elapsed_ms,
                    "Message handler failed"
                ),
            }
            result
        })
    }
}
