//! # Null Transport
//!
//! Used when fan-out is disabled: publishing succeeds and goes nowhere,
//! subscriptions stay idle until the transport is closed.

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::watch;
use tracing::trace;

use super::errors::{TransportError, TransportResult};
use super::{end_on_close, Delivery, DeliveryStream, Transport};
use crate::events::Envelope;

#[derive(Debug)]
pub struct NullTransport {
    closed: watch::Sender<bool>,
}

impl NullTransport {
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self { closed }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for NullTransport {
    async fn publish(&self, topic: &str, envelope: Envelope) -> TransportResult<String> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        trace!(topic, message_id = %envelope.id, "Discarding message");
        Ok(envelope.id)
    }

    async fn subscribe(&self, _topic: &str, _group: Option<&str>) -> TransportResult<DeliveryStream> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(end_on_close(stream::pending::<Delivery>(), &self.closed))
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.send_replace(true);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
