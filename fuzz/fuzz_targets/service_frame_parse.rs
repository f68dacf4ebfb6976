#![no_main]

use libfuzzer_sys::fuzz_target;
use stor_runtime::{
    best_effort_request_id_from_raw, generic_failure_reply, parse_service_frame,
    render_reply_frame,
};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let maybe_request_id = best_effort_request_id_from_raw(&raw);

    let line = match parse_service_frame(&raw) {
        Ok(frame) => {
            assert!(!frame.request_id.is_empty());
            assert!(!frame.method.is_empty());
            let payload = serde_json::from_str::<serde_json::Value>(&frame.payload)
                .expect("payload re-encodes as JSON");
            assert!(payload.is_object());
            render_reply_frame(&frame.request_id, &frame.method, "{\"returnValue\": true}")
        }
        Err(error) => {
            let request_id = maybe_request_id.as_deref().unwrap_or("unknown");
            render_reply_frame(request_id, "unknown", &generic_failure_reply(&error.to_string()))
        }
    }
    .expect("reply frame renders");
    serde_json::from_str::<serde_json::Value>(&line).expect("reply frame is JSON");
});
