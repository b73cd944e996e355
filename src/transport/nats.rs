//! # NATS JetStream Transport
//!
//! One stream covers every topic under `<prefix>.<topic>` subjects.
//! Grouped subscriptions bind a durable pull consumer named after the
//! group; ungrouped ones get an ephemeral consumer that only sees new
//! messages.

use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, DeliverPolicy},
    stream, AckKind,
};
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use super::errors::{TransportError, TransportResult};
use super::{end_on_close, Acker, Delivery, DeliveryStream, Transport};
use crate::events::Envelope;

/// Header carrying the envelope id
const MESSAGE_ID_HEADER: &str = "Feedline-Message-Id";

/// JetStream de-duplication header
const NATS_MSG_ID_HEADER: &str = "Nats-Msg-Id";

/// JetStream-backed transport
#[derive(Debug)]
pub struct NatsTransport {
    client: async_nats::Client,
    context: jetstream::Context,
    stream_name: String,
    subject_prefix: String,
    max_redeliveries: u32,

    /// Set on close; every subscription stream ends on it
    closed: watch::Sender<bool>,
}

struct NatsAcker {
    message: jetstream::Message,
    message_id: String,
}

#[async_trait]
impl Acker for NatsAcker {
    async fn ack(&mut self) -> TransportResult<()> {
        self.message.ack().await.map_err(|e| TransportError::Ack {
            message_id: self.message_id.clone(),
            reason: e.to_string(),
        })
    }

    async fn nack(&mut self) -> TransportResult<()> {
        self.message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| TransportError::Ack {
                message_id: self.message_id.clone(),
                reason: e.to_string(),
            })
    }
}

fn into_delivery(message: jetstream::Message) -> Delivery {
    let message_id = message
        .headers
        .as_ref()
        .and_then(|headers| headers.get(MESSAGE_ID_HEADER))
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let attempt = message
        .info()
        .map(|info| u32::try_from(info.delivered).unwrap_or(u32::MAX))
        .unwrap_or(1);

    let envelope = Envelope::with_id(message_id.clone(), message.payload.to_vec());
    Delivery::new(
        envelope,
        attempt,
        Box::new(NatsAcker {
            message,
            message_id,
        }),
    )
}

impl NatsTransport {
    /// Connect and make sure the stream exists
    pub async fn connect(
        url: &str,
        stream_name: &str,
        max_redeliveries: u32,
    ) -> TransportResult<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let context = jetstream::new(client.clone());
        let subject_prefix = stream_name.to_lowercase();

        context
            .get_or_create_stream(stream::Config {
                name: stream_name.to_string(),
                subjects: vec![format!("{}.>", subject_prefix)],
                ..Default::default()
            })
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!(url, stream = stream_name, "Connected to NATS JetStream");
        let (closed, _) = watch::channel(false);
        Ok(Self {
            client,
            context,
            stream_name: stream_name.to_string(),
            subject_prefix,
            max_redeliveries,
            closed,
        })
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn subject(&self, topic: &str) -> String {
        format!("{}.{}", self.subject_prefix, topic)
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn publish(&self, topic: &str, envelope: Envelope) -> TransportResult<String> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let publish_error = |reason: String| TransportError::Publish {
            topic: topic.to_string(),
            reason,
        };

        let mut headers = HeaderMap::new();
        headers.insert(MESSAGE_ID_HEADER, envelope.id.as_str());
        headers.insert(NATS_MSG_ID_HEADER, envelope.id.as_str());

        let ack = self
            .context
            .publish_with_headers(self.subject(topic), headers, Bytes::from(envelope.payload))
            .await
            .map_err(|e| publish_error(e.to_string()))?;
        ack.await.map_err(|e| publish_error(e.to_string()))?;

        Ok(envelope.id)
    }

    async fn subscribe(&self, topic: &str, group: Option<&str>) -> TransportResult<DeliveryStream> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let subscribe_error = |reason: String| TransportError::Subscribe {
            topic: topic.to_string(),
            reason,
        };

        let stream = self
            .context
            .get_stream(&self.stream_name)
            .await
            .map_err(|e| subscribe_error(e.to_string()))?;

        let config = pull::Config {
            durable_name: group.map(str::to_string),
            filter_subject: self.subject(topic),
            deliver_policy: if group.is_some() {
                DeliverPolicy::All
            } else {
                DeliverPolicy::New
            },
            ack_policy: AckPolicy::Explicit,
            max_deliver: i64::from(self.max_redeliveries) + 1,
            ..Default::default()
        };

        let consumer = match group {
            Some(name) => stream.get_or_create_consumer(name, config).await,
            None => stream.create_consumer(config).await,
        }
        .map_err(|e| subscribe_error(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| subscribe_error(e.to_string()))?;

        let topic = topic.to_string();
        let deliveries = messages.filter_map(move |result| {
            let topic = topic.clone();
            async move {
                match result {
                    Ok(message) => Some(into_delivery(message)),
                    Err(e) => {
                        warn!(topic = %topic, error = %e, "Failed to receive message");
                        None
                    }
                }
            }
        });
        Ok(end_on_close(deliveries, &self.closed))
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.send_replace(true);
        self.client
            .flush()
            .await
            .map_err(|e| TransportError::Internal(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "nats"
    }
}
