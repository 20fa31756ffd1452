//! Request-side bus abstraction.
//!
//! The daemon never builds protocol frames; it talks to the bus through the
//! `async-nats` service API. What the rest of the crate sees is narrower
//! still: [`BusRequest`], one inbound request that can be answered exactly
//! once with bytes or with an error status. The managed service's dispatch
//! logic is written against this trait so tests can drive it with scripted
//! requests and capture the responses.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failure to publish a reply back to the bus.
#[derive(Debug, Error)]
#[error("failed to publish reply: {0}")]
pub struct ReplyError(pub String);

/// One inbound request delivered by the bus.
#[async_trait]
pub trait BusRequest: Send + Sync {
    /// The subject the bus delivered this request on (rewritten form).
    fn subject(&self) -> &str;

    /// The request payload.
    fn payload(&self) -> &[u8];

    /// Replies with a successful byte sequence.
    async fn respond(&self, payload: Bytes) -> Result<(), ReplyError>;

    /// Replies with an error status carrying a human-readable message.
    async fn respond_error(&self, message: &str) -> Result<(), ReplyError>;
}

/// [`BusRequest`] over a live NATS service request.
pub struct NatsRequest {
    inner: async_nats::service::Request,
}

impl NatsRequest {
    /// Wraps a request delivered by the NATS service API.
    pub fn new(inner: async_nats::service::Request) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl BusRequest for NatsRequest {
    fn subject(&self) -> &str {
        self.inner.message.subject.as_str()
    }

    fn payload(&self) -> &[u8] {
        &self.inner.message.payload
    }

    async fn respond(&self, payload: Bytes) -> Result<(), ReplyError> {
        self.inner
            .respond(Ok(payload))
            .await
            .map_err(|e| ReplyError(e.to_string()))
    }

    async fn respond_error(&self, message: &str) -> Result<(), ReplyError> {
        self.inner
            .respond(Err(async_nats::service::error::Error {
                code: 500,
                status: message.to_string(),
            }))
            .await
            .map_err(|e| ReplyError(e.to_string()))
    }
}
