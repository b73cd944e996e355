//! # Message Transport
//!
//! Publish/subscribe over named topics with at-least-once delivery.
//! Transports only ever see [`Envelope`]s; typed events are converted at
//! the edges through the codec.
//!
//! ## Consumer groups
//!
//! Subscribers sharing a group name compete for messages. Distinct groups
//! and ungrouped subscribers each receive every message.

mod channel;
mod errors;
#[cfg(feature = "nats")]
mod nats;
mod null;

pub use channel::{ChannelTransport, DEFAULT_MAX_REDELIVERIES};
pub use errors::{TransportError, TransportResult};
#[cfg(feature = "nats")]
pub use nats::NatsTransport;
pub use null::NullTransport;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::watch;
use tracing::info;

use crate::config::{MessagingConfig, Mode, TransportKind};
use crate::events::{encode, Envelope, Event};

/// Resolves one delivery with the broker
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&mut self) -> TransportResult<()>;

    /// Request redelivery
    async fn nack(&mut self) -> TransportResult<()>;
}

/// A received message awaiting acknowledgement
pub struct Delivery {
    pub envelope: Envelope,

    /// 1 on first delivery, incremented on each redelivery
    pub attempt: u32,

    acker: Box<dyn Acker>,
}

impl Delivery {
    pub fn new(envelope: Envelope, attempt: u32, acker: Box<dyn Acker>) -> Self {
        Self {
            envelope,
            attempt,
            acker,
        }
    }

    /// Message id of the carried envelope
    pub fn id(&self) -> &str {
        &self.envelope.id
    }

    pub async fn ack(mut self) -> TransportResult<()> {
        self.acker.ack().await
    }

    pub async fn nack(mut self) -> TransportResult<()> {
        self.acker.nack().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("envelope", &self.envelope)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// Stream of deliveries for one subscription
pub type DeliveryStream = BoxStream<'static, Delivery>;

#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Publish an envelope, returning its message id
    async fn publish(&self, topic: &str, envelope: Envelope) -> TransportResult<String>;

    /// Subscribe to a topic, optionally as a member of a consumer group
    async fn subscribe(&self, topic: &str, group: Option<&str>) -> TransportResult<DeliveryStream>;

    /// Stop accepting publishes and end every subscription
    async fn close(&self) -> TransportResult<()>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

async fn closed_signal(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

/// Box `deliveries` so the stream ends once `closed` is set to true
pub(crate) fn end_on_close<S>(deliveries: S, closed: &watch::Sender<bool>) -> DeliveryStream
where
    S: Stream<Item = Delivery> + Send + 'static,
{
    deliveries
        .take_until(closed_signal(closed.subscribe()))
        .boxed()
}

/// Encode an event and publish it on its own topic
pub async fn publish_event<E: Event>(
    transport: &dyn Transport,
    event: &E,
) -> TransportResult<String> {
    let envelope = encode(event).map_err(|e| TransportError::Encode(e.to_string()))?;
    transport.publish(E::TOPIC, envelope).await
}

/// Build the transport selected by configuration
pub async fn open_transport(
    mode: Mode,
    config: &MessagingConfig,
) -> TransportResult<Arc<dyn Transport>> {
    let kind = config.transport_kind(mode);
    info!(transport = %kind, "Opening message transport");

    match kind {
        TransportKind::Null => Ok(Arc::new(NullTransport::new())),
        TransportKind::Channel => Ok(Arc::new(ChannelTransport::new(config.max_redeliveries))),
        TransportKind::Nats => open_nats(config).await,
    }
}

#[cfg(feature = "nats")]
async fn open_nats(config: &MessagingConfig) -> TransportResult<Arc<dyn Transport>> {
    let transport =
        NatsTransport::connect(&config.nats_url, &config.stream_name, config.max_redeliveries)
            .await?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "nats"))]
async fn open_nats(_config: &MessagingConfig) -> TransportResult<Arc<dyn Transport>> {
    Err(TransportError::Unavailable(
        "the nats transport requires the `nats` feature".into(),
    ))
}
