use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};
use tracing::{debug, info, warn};

use crate::{generic_failure_reply, ReplySink, ServiceRequest, StorageService, TransportError};

const UNKNOWN_REQUEST_ID: &str = "unknown";
const UNKNOWN_METHOD: &str = "unknown";

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

#[derive(Debug, Clone, Deserialize)]
struct RawServiceFrame {
    request_id: String,
    method: String,
    #[serde(default)]
    payload: Option<Value>,
}

/// One parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFrame {
    pub request_id: String,
    pub method: String,
    /// Payload re-encoded as JSON object text.
    pub payload: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeReport {
    pub processed_lines: usize,
    pub error_count: usize,
}

pub fn parse_service_frame(raw: &str) -> Result<ServiceFrame> {
    let frame = serde_json::from_str::<RawServiceFrame>(raw)
        .context("failed to parse service frame JSON")?;
    let request_id = frame.request_id.trim();
    if request_id.is_empty() {
        bail!("service frame request_id must be non-empty");
    }
    let method = frame.method.trim();
    if method.is_empty() {
        bail!("service frame method must be non-empty");
    }
    let payload = match frame.payload {
        None | Some(Value::Null) => "{}".to_string(),
        Some(value) => {
            let object = value
                .as_object()
                .ok_or_else(|| anyhow!("service frame payload must be a JSON object"))?;
            serde_json::to_string(object).context("failed to encode service frame payload")?
        }
    };
    Ok(ServiceFrame {
        request_id: request_id.to_string(),
        method: method.to_string(),
        payload,
    })
}

pub fn best_effort_request_id_from_raw(raw: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(raw).ok()?;
    let request_id = value
        .as_object()
        .and_then(|object| object.get("request_id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())?;
    Some(request_id.to_string())
}

/// Wraps a reply body as `{"request_id":..,"method":..,"reply":<body>}`.
///
/// The body is embedded verbatim; it is already a JSON object.
pub fn render_reply_frame(request_id: &str, method: &str, reply: &str) -> Result<String> {
    let request_id =
        serde_json::to_string(request_id).context("failed to encode reply request_id")?;
    let method = serde_json::to_string(method).context("failed to encode reply method")?;
    Ok(format!(
        "{{\"request_id\":{request_id},\"method\":{method},\"reply\":{reply}}}"
    ))
}

/// Writes the replies of one request as NDJSON lines on a shared writer.
pub struct NdjsonReplySink {
    request_id: String,
    method: String,
    writer: SharedWriter,
}

impl NdjsonReplySink {
    fn new(request_id: &str, method: &str, writer: SharedWriter) -> Self {
        Self {
            request_id: request_id.to_string(),
            method: method.to_string(),
            writer,
        }
    }
}

#[async_trait]
impl ReplySink for NdjsonReplySink {
    async fn respond(&self, reply: &str) -> Result<(), TransportError> {
        let line = render_reply_frame(&self.request_id, &self.method, reply)
            .map_err(|error| TransportError::Delivery(error.to_string()))?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|error| TransportError::Delivery(error.to_string()))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|error| TransportError::Delivery(error.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|error| TransportError::Delivery(error.to_string()))
    }
}

/// Serves NDJSON request frames from `reader`, writing reply frames to `writer`.
///
/// Requests are dispatched one at a time. At end of input the loop waits for
/// an active resize to finish streaming before returning.
pub async fn serve_ndjson<R, W>(service: &StorageService, reader: R, writer: W) -> Result<ServeReport>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let writer: SharedWriter = Arc::new(Mutex::new(Box::new(writer)));
    let mut lines = reader.lines();
    let mut report = ServeReport::default();

    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read service ndjson input line")?
    {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        report.processed_lines = report.processed_lines.saturating_add(1);

        let frame = match parse_service_frame(trimmed) {
            Ok(frame) => frame,
            Err(error) => {
                report.error_count = report.error_count.saturating_add(1);
                let request_id = best_effort_request_id_from_raw(trimmed)
                    .unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_string());
                let message = format!("{error:#}");
                warn!(request_id = %request_id, error = %message, "malformed service frame");
                let sink = NdjsonReplySink::new(&request_id, UNKNOWN_METHOD, Arc::clone(&writer));
                sink.respond(&generic_failure_reply(&message))
                    .await
                    .context("failed to write malformed frame reply")?;
                continue;
            }
        };

        debug!(request_id = %frame.request_id, method = %frame.method, "received service frame");
        let sink = NdjsonReplySink::new(&frame.request_id, &frame.method, Arc::clone(&writer));
        let request = Arc::new(ServiceRequest::new(
            frame.method.as_str(),
            frame.payload,
            Arc::new(sink),
        ));
        if let Err(error) = service.dispatch(request).await {
            report.error_count = report.error_count.saturating_add(1);
            warn!(request_id = %frame.request_id, %error, "failed to deliver reply");
        }
    }

    if service.resize_coordinator().is_running() {
        info!("input closed; waiting for active resize to finish");
    }
    service.resize_coordinator().wait_idle().await;
    Ok(report)
}
