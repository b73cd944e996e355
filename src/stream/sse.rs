//! # Server-Sent Events
//!
//! Bridges transport messages to one long-lived HTTP response. Each client
//! holds its own ungrouped subscription, so disconnecting drops only that
//! subscription.

use std::convert::Infallible;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::adapter::StreamAdapter;
use crate::transport::{DeliveryStream, Transport};

/// SSE event name sent when the streamed resource no longer exists
pub const REMOVED_EVENT: &str = "removed";

fn data_event(value: &Value) -> Event {
    Event::default().data(value.to_string())
}

fn error_response(status: u16, message: String) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": message }))).into_response()
}

struct Refresh {
    adapter: Arc<dyn StreamAdapter>,
    deliveries: DeliveryStream,
    param: String,
    finished: bool,
}

impl Refresh {
    /// Next payload to send, skipping envelopes meant for other clients
    async fn next_event(&mut self) -> Option<Event> {
        if self.finished {
            return None;
        }

        while let Some(delivery) = self.deliveries.next().await {
            let matches = self.adapter.validate(&self.param, &delivery.envelope);
            let message_id = delivery.envelope.id.clone();
            if let Err(e) = delivery.ack().await {
                warn!(message_id = %message_id, error = %e, "Failed to ack stream message");
            }
            if !matches {
                continue;
            }

            match self.adapter.response(&self.param).await {
                Ok(Some(value)) => return Some(data_event(&value)),
                Ok(None) => {
                    debug!(param = %self.param, "Streamed resource removed");
                    self.finished = true;
                    return Some(Event::default().event(REMOVED_EVENT).data("null"));
                }
                Err(e) => {
                    warn!(param = %self.param, error = %e, "Failed to refresh stream payload");
                }
            }
        }
        None
    }
}

/// Open a live stream for `param` on `topic`.
///
/// Subscribes before reading the initial state, so no update between the
/// read and the subscription is lost. Responds 404 when the resource does
/// not exist.
pub async fn live_stream(
    adapter: Arc<dyn StreamAdapter>,
    transport: Arc<dyn Transport>,
    topic: &str,
    param: String,
) -> Response {
    let deliveries = match transport.subscribe(topic, None).await {
        Ok(deliveries) => deliveries,
        Err(e) => {
            warn!(topic, error = %e, "Failed to subscribe live stream");
            return error_response(e.status_code(), e.to_string());
        }
    };

    let initial = match adapter.response(&param).await {
        Ok(Some(value)) => value,
        Ok(None) => return error_response(404, "Not found".to_string()),
        Err(e) => {
            warn!(topic, param = %param, error = %e, "Failed to load stream payload");
            return error_response(e.status_code(), e.to_string());
        }
    };

    debug!(topic, param = %param, "Live stream opened");
    let refresh = Refresh {
        adapter,
        deliveries,
        param,
        finished: false,
    };

    let updates = stream::unfold(refresh, |mut refresh| async move {
        refresh.next_event().await.map(|event| (event, refresh))
    });
    let events = stream::once(async move { data_event(&initial) })
        .chain(updates)
        .map(Ok::<_, Infallible>);

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{encode, FeedUpdated, FEED_UPDATED_TOPIC};
    use crate::feed_store::{FeedStore, InMemoryFeedStore};
    use crate::stream::FeedStream;
    use crate::transport::ChannelTransport;

    #[tokio::test]
    async fn test_missing_resource_is_404() {
        let transport = Arc::new(ChannelTransport::default());
        let adapter = Arc::new(FeedStream::new(Arc::new(InMemoryFeedStore::new())));

        let response =
            live_stream(adapter, transport.clone(), FEED_UPDATED_TOPIC, "tech".into()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_is_event_stream() {
        let transport = Arc::new(ChannelTransport::default());
        let store = Arc::new(InMemoryFeedStore::new());
        store.ensure_feed("tech").await.unwrap();
        let adapter = Arc::new(FeedStream::new(store));

        let response =
            live_stream(adapter, transport.clone(), FEED_UPDATED_TOPIC, "tech".into()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
        assert_eq!(transport.subscriber_count(FEED_UPDATED_TOPIC), 1);
    }

    #[tokio::test]
    async fn test_refresh_skips_other_feeds() {
        let transport = Arc::new(ChannelTransport::default());
        let store = Arc::new(InMemoryFeedStore::new());
        store.ensure_feed("tech").await.unwrap();

        let deliveries = transport.subscribe(FEED_UPDATED_TOPIC, None).await.unwrap();
        let mut refresh = Refresh {
            adapter: Arc::new(FeedStream::new(store)),
            deliveries,
            param: "tech".to_string(),
            finished: false,
        };

        for name in ["news", "art", "tech"] {
            let envelope = encode(&FeedUpdated::new(name)).unwrap();
            transport.publish(FEED_UPDATED_TOPIC, envelope).await.unwrap();
        }
        transport.close().await.unwrap();

        assert!(refresh.next_event().await.is_some());
        assert!(refresh.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_reports_removal_once() {
        let transport = Arc::new(ChannelTransport::default());
        let store = Arc::new(InMemoryFeedStore::new());

        let deliveries = transport.subscribe(FEED_UPDATED_TOPIC, None).await.unwrap();
        let mut refresh = Refresh {
            adapter: Arc::new(FeedStream::new(store)),
            deliveries,
            param: "tech".to_string(),
            finished: false,
        };

        let envelope = encode(&FeedUpdated::new("tech")).unwrap();
        transport.publish(FEED_UPDATED_TOPIC, envelope).await.unwrap();

        assert!(refresh.next_event().await.is_some());
        assert!(refresh.finished);
        assert!(refresh.next_event().await.is_none());
    }
}
