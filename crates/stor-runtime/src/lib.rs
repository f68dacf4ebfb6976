//! Runtime for the storage-management service.
//!
//! Hosts the command runner, per-method handlers, the streaming media-resize
//! task, the reply-sink seam towards the bus, and the NDJSON stdio transport.

pub mod cancellation;
pub mod command_runner;
pub mod method_handlers;
pub mod ndjson_transport;
pub mod reply_sink;
pub mod resize_task;
pub mod service;
pub mod service_replies;

pub use cancellation::*;
pub use command_runner::*;
pub use method_handlers::*;
pub use ndjson_transport::*;
pub use reply_sink::*;
pub use resize_task::*;
pub use service::*;
pub use service_replies::*;
