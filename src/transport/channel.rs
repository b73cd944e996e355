//! # Channel Transport
//!
//! In-process broker on tokio unbounded channels.
//!
//! Members of one consumer group share each message round-robin; every
//! group and every ungrouped subscriber gets its own copy. A nack puts the
//! message back on the same subscriber's queue until `max_redeliveries`
//! is exhausted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::errors::{TransportError, TransportResult};
use super::{Acker, Delivery, DeliveryStream, Transport};
use crate::events::Envelope;

type DeliverySender = mpsc::UnboundedSender<Delivery>;

#[derive(Debug, Default)]
struct Group {
    members: Vec<DeliverySender>,
    next: usize,
}

#[derive(Debug, Default)]
struct TopicSubscribers {
    groups: HashMap<String, Group>,
    ungrouped: Vec<DeliverySender>,
}

/// Default nack budget per message
pub const DEFAULT_MAX_REDELIVERIES: u32 = 5;

/// In-process at-least-once broker
#[derive(Debug)]
pub struct ChannelTransport {
    topics: RwLock<HashMap<String, TopicSubscribers>>,
    closed: Arc<AtomicBool>,
    max_redeliveries: u32,
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REDELIVERIES)
    }
}

fn poisoned<T>(_: T) -> TransportError {
    TransportError::Internal("Lock poisoned".into())
}

/// Resolves a delivery held by one channel subscriber
#[derive(Debug)]
struct ChannelAcker {
    topic: String,
    envelope: Envelope,
    attempt: u32,
    sender: DeliverySender,
    closed: Arc<AtomicBool>,
    max_redeliveries: u32,
}

#[async_trait]
impl Acker for ChannelAcker {
    async fn ack(&mut self) -> TransportResult<()> {
        Ok(())
    }

    async fn nack(&mut self) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        if self.attempt > self.max_redeliveries {
            error!(
                topic = %self.topic,
                message_id = %self.envelope.id,
                attempts = self.attempt,
                "Redelivery budget exhausted, dropping message"
            );
            return Ok(());
        }

        let attempt = self.attempt + 1;
        let redelivery = Delivery::new(
            self.envelope.clone(),
            attempt,
            Box::new(ChannelAcker {
                topic: self.topic.clone(),
                envelope: self.envelope.clone(),
                attempt,
                sender: self.sender.clone(),
                closed: Arc::clone(&self.closed),
                max_redeliveries: self.max_redeliveries,
            }),
        );

        debug!(topic = %self.topic, message_id = %self.envelope.id, attempt, "Redelivering message");
        if self.sender.send(redelivery).is_err() {
            warn!(
                topic = %self.topic,
                message_id = %self.envelope.id,
                "Subscriber gone, message not redelivered"
            );
        }
        Ok(())
    }
}

impl ChannelTransport {
    pub fn new(max_redeliveries: u32) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
            max_redeliveries,
        }
    }

    fn delivery(&self, topic: &str, envelope: &Envelope, sender: &DeliverySender) -> Delivery {
        Delivery::new(
            envelope.clone(),
            1,
            Box::new(ChannelAcker {
                topic: topic.to_string(),
                envelope: envelope.clone(),
                attempt: 1,
                sender: sender.clone(),
                closed: Arc::clone(&self.closed),
                max_redeliveries: self.max_redeliveries,
            }),
        )
    }

    /// Number of live subscriptions on a topic, groups counted per member
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .map(|topics| {
                topics
                    .get(topic)
                    .map(|t| {
                        t.ungrouped.iter().filter(|s| !s.is_closed()).count()
                            + t.groups
                                .values()
                                .flat_map(|g| g.members.iter())
                                .filter(|s| !s.is_closed())
                                .count()
                    })
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn publish(&self, topic: &str, envelope: Envelope) -> TransportResult<String> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let mut topics = self.topics.write().map_err(poisoned)?;
        let Some(subscribers) = topics.get_mut(topic) else {
            debug!(topic, message_id = %envelope.id, "No subscribers, message dropped");
            return Ok(envelope.id);
        };

        subscribers
            .ungrouped
            .retain(|sender| sender.send(self.delivery(topic, &envelope, sender)).is_ok());

        for (name, group) in subscribers.groups.iter_mut() {
            loop {
                if group.members.is_empty() {
                    debug!(topic, group = %name, "Consumer group has no live members");
                    break;
                }
                let index = group.next % group.members.len();
                let sender = &group.members[index];
                if sender.send(self.delivery(topic, &envelope, sender)).is_ok() {
                    group.next = index + 1;
                    break;
                }
                group.members.remove(index);
            }
        }
        subscribers.groups.retain(|_, g| !g.members.is_empty());

        Ok(envelope.id)
    }

    async fn subscribe(&self, topic: &str, group: Option<&str>) -> TransportResult<DeliveryStream> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut topics = self.topics.write().map_err(poisoned)?;
            let subscribers = topics.entry(topic.to_string()).or_default();
            match group {
                Some(name) => subscribers
                    .groups
                    .entry(name.to_string())
                    .or_default()
                    .members
                    .push(tx),
                None => subscribers.ungrouped.push(tx),
            }
        }

        debug!(topic, group = ?group, "Subscribed");
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|delivery| (delivery, rx))
        })
        .boxed())
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        let mut topics = self.topics.write().map_err(poisoned)?;
        topics.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn envelope(id: &str) -> Envelope {
        Envelope::with_id(id, b"{}".to_vec())
    }

    async fn next(stream: &mut DeliveryStream) -> Option<Delivery> {
        timeout(Duration::from_millis(200), stream.next())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let transport = ChannelTransport::default();
        let id = transport.publish("topic", envelope("m1")).await.unwrap();
        assert_eq!(id, "m1");
    }

    #[tokio::test]
    async fn test_ungrouped_subscribers_each_receive() {
        let transport = ChannelTransport::default();
        let mut a = transport.subscribe("topic", None).await.unwrap();
        let mut b = transport.subscribe("topic", None).await.unwrap();

        transport.publish("topic", envelope("m1")).await.unwrap();

        assert_eq!(next(&mut a).await.unwrap().envelope.id, "m1");
        assert_eq!(next(&mut b).await.unwrap().envelope.id, "m1");
    }

    #[tokio::test]
    async fn test_group_members_compete() {
        let transport = ChannelTransport::default();
        let mut a = transport.subscribe("topic", Some("workers")).await.unwrap();
        let mut b = transport.subscribe("topic", Some("workers")).await.unwrap();

        transport.publish("topic", envelope("m1")).await.unwrap();
        transport.publish("topic", envelope("m2")).await.unwrap();

        let first = next(&mut a).await.unwrap();
        let second = next(&mut b).await.unwrap();
        assert_eq!(first.envelope.id, "m1");
        assert_eq!(second.envelope.id, "m2");
        assert!(next(&mut a).await.is_none());
    }

    #[tokio::test]
    async fn test_distinct_groups_each_receive() {
        let transport = ChannelTransport::default();
        let mut a = transport.subscribe("topic", Some("one")).await.unwrap();
        let mut b = transport.subscribe("topic", Some("two")).await.unwrap();

        transport.publish("topic", envelope("m1")).await.unwrap();

        assert!(next(&mut a).await.is_some());
        assert!(next(&mut b).await.is_some());
    }

    #[tokio::test]
    async fn test_nack_redelivers_with_next_attempt() {
        let transport = ChannelTransport::default();
        let mut stream = transport.subscribe("topic", Some("workers")).await.unwrap();

        transport.publish("topic", envelope("m1")).await.unwrap();

        let first = next(&mut stream).await.unwrap();
        assert_eq!(first.attempt, 1);
        first.nack().await.unwrap();

        let second = next(&mut stream).await.unwrap();
        assert_eq!(second.envelope.id, "m1");
        assert_eq!(second.attempt, 2);
        second.ack().await.unwrap();

        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_redelivery_budget() {
        let transport = ChannelTransport::new(1);
        let mut stream = transport.subscribe("topic", None).await.unwrap();

        transport.publish("topic", envelope("m1")).await.unwrap();

        next(&mut stream).await.unwrap().nack().await.unwrap();
        let retry = next(&mut stream).await.unwrap();
        assert_eq!(retry.attempt, 2);
        retry.nack().await.unwrap();

        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let transport = ChannelTransport::default();
        let a = transport.subscribe("topic", Some("workers")).await.unwrap();
        let mut b = transport.subscribe("topic", Some("workers")).await.unwrap();
        drop(a);

        transport.publish("topic", envelope("m1")).await.unwrap();
        assert_eq!(next(&mut b).await.unwrap().envelope.id, "m1");
        assert_eq!(transport.subscriber_count("topic"), 1);
    }

    #[tokio::test]
    async fn test_close_ends_streams() {
        let transport = ChannelTransport::default();
        let mut stream = transport.subscribe("topic", None).await.unwrap();

        transport.close().await.unwrap();

        assert!(stream.next().await.is_none());
        assert!(matches!(
            transport.publish("topic", envelope("m1")).await,
            Err(TransportError::Closed)
        ));
        assert!(transport.subscribe("topic", None).await.is_err());
    }
}
