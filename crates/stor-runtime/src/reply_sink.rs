use std::{
    fmt,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use thiserror::Error;

/// Failure to hand a reply back to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("reply channel is closed")]
    Closed,
    #[error("failed to deliver reply: {0}")]
    Delivery(String),
}

/// Destination for the replies to one request.
///
/// A sink may be answered more than once: streaming methods send several
/// replies over the lifetime of a single request.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn respond(&self, reply: &str) -> Result<(), TransportError>;
}

/// One inbound method call as delivered by the bus.
pub struct ServiceRequest {
    method: String,
    payload: String,
    sink: Arc<dyn ReplySink>,
}

impl ServiceRequest {
    pub fn new(
        method: impl Into<String>,
        payload: impl Into<String>,
        sink: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            method: method.into(),
            payload: payload.into(),
            sink,
        }
    }

    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    /// Raw JSON payload text.
    pub fn payload(&self) -> &str {
        self.payload.as_str()
    }

    pub async fn respond(&self, reply: &str) -> Result<(), TransportError> {
        self.sink.respond(reply).await
    }
}

impl fmt::Debug for ServiceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRequest")
            .field("method", &self.method)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Test double that records every reply it accepts.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryReplySink {
    replies: Arc<Mutex<Vec<String>>>,
    accept_limit: Option<usize>,
}

#[cfg(test)]
impl MemoryReplySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `limit` replies, then fails every later send with `Closed`.
    pub fn closing_after(limit: usize) -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            accept_limit: Some(limit),
        }
    }

    pub fn replies(&self) -> Vec<String> {
        lock_unpoisoned(&self.replies).clone()
    }

    /// Polls until at least `count` replies arrived or `timeout` elapsed.
    pub async fn wait_for_replies(
        &self,
        count: usize,
        timeout: std::time::Duration,
    ) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let replies = self.replies();
            if replies.len() >= count || tokio::time::Instant::now() >= deadline {
                return replies;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ReplySink for MemoryReplySink {
    async fn respond(&self, reply: &str) -> Result<(), TransportError> {
        let mut replies = lock_unpoisoned(&self.replies);
        if self
            .accept_limit
            .is_some_and(|limit| replies.len() >= limit)
        {
            return Err(TransportError::Closed);
        }
        replies.push(reply.to_string());
        Ok(())
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
