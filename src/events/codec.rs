//! # Event Codec
//!
//! Events cross the transport as JSON inside an [`Envelope`]. Transports
//! never see the structured type.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{CodecError, CodecResult};
use super::event::Event;

/// Transport-level wrapper around a serialized event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Globally unique message id
    pub id: String,

    /// Serialized event
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Wrap a payload under a fresh message id
    pub fn new(payload: Vec<u8>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), payload)
    }

    pub fn with_id(id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

/// Serialize an event into a new envelope
pub fn encode<E: Event>(event: &E) -> CodecResult<Envelope> {
    let payload = serde_json::to_vec(event).map_err(|e| CodecError::Encode {
        topic: E::TOPIC,
        reason: e.to_string(),
    })?;
    Ok(Envelope::new(payload))
}

/// Parse an envelope's payload as the given event
pub fn decode<E: Event>(envelope: &Envelope) -> CodecResult<E> {
    serde_json::from_slice(&envelope.payload).map_err(|e| CodecError::Malformed {
        topic: E::TOPIC,
        message_id: envelope.id.clone(),
        reason: e.to_string(),
    })
}
