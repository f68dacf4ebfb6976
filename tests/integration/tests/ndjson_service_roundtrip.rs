use std::time::Duration;

use serde_json::{json, Value};
use stor_core::{CommandCatalog, CommandTemplate};
use stor_runtime::{serve_ndjson, ServeReport, ServiceConfig, StorageService};
use tokio::io::AsyncReadExt;

const PIPE_CAPACITY: usize = 1024 * 1024;

async fn serve(service: &StorageService, input: &str) -> (ServeReport, Vec<Value>) {
    let (mut client, server) = tokio::io::duplex(PIPE_CAPACITY);
    let report = tokio::time::timeout(
        Duration::from_secs(10),
        serve_ndjson(service, input.as_bytes(), server),
    )
    .await
    .expect("serve finished")
    .expect("serve succeeded");

    let mut output = String::new();
    client
        .read_to_string(&mut output)
        .await
        .expect("read reply frames");
    let frames = output
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("reply frame is JSON"))
        .collect();
    (report, frames)
}

fn frames_for<'a>(frames: &'a [Value], request_id: &str) -> Vec<&'a Value> {
    frames
        .iter()
        .filter(|frame| frame["request_id"] == json!(request_id))
        .collect()
}

#[tokio::test]
async fn integration_default_catalog_answers_sync_requests_once_each() {
    let service = StorageService::new(ServiceConfig::default());
    let input = concat!(
        "{\"request_id\": \"s\", \"method\": \"status\"}\n",
        "{\"request_id\": \"v\", \"method\": \"version\"}\n",
        "{\"request_id\": \"u\", \"method\": \"getUsage\", \"payload\": {\"filesystem\": \"store-media\"}}\n",
        "{\"request_id\": \"g\", \"method\": \"listVolumes\", \"payload\": {\"group\": \"a;rm -rf /\"}}\n",
        "{\"request_id\": \"x\", \"method\": \"formatDisk\"}\n",
    );
    let (report, frames) = serve(&service, input).await;
    assert_eq!(report.processed_lines, 5);
    assert_eq!(report.error_count, 0);
    assert_eq!(frames.len(), 5);

    assert_eq!(frames[0]["reply"], json!({"returnValue": true}));
    assert_eq!(frames[1]["reply"]["apiVersion"], json!("1"));

    // The test host has no such device, so df reports failure with its command.
    let usage = &frames[2];
    assert_eq!(usage["method"], json!("getUsage"));
    assert_eq!(usage["reply"]["returnValue"], json!(false));
    assert_eq!(usage["reply"]["errorCode"], json!(-1));
    assert_eq!(
        usage["reply"]["errorText"],
        json!("Unable to run command: /bin/df -m /dev/mapper/store-media 2>&1")
    );
    assert!(usage["reply"]["stdErr"].is_array());

    assert_eq!(
        frames[3]["reply"],
        json!({"returnValue": false, "errorCode": -1, "errorText": "Invalid or missing group"})
    );
    assert_eq!(
        frames[4]["reply"]["errorText"],
        json!("Unknown method: formatDisk")
    );
}

#[tokio::test]
async fn integration_malformed_frames_are_answered_not_dropped() {
    let service = StorageService::new(ServiceConfig::default());
    let input = concat!(
        "# operator note\n",
        "not json at all\n",
        "{\"request_id\": \"p\", \"method\": \"getUsage\", \"payload\": \"store-media\"}\n",
        "{\"request_id\": \"ok\", \"method\": \"status\"}\n",
    );
    let (report, frames) = serve(&service, input).await;
    assert_eq!(
        report,
        ServeReport {
            processed_lines: 3,
            error_count: 2
        }
    );
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0]["request_id"], json!("unknown"));
    assert_eq!(frames[0]["reply"]["returnValue"], json!(false));
    assert_eq!(frames[1]["request_id"], json!("p"));
    assert!(frames[1]["reply"]["errorText"]
        .as_str()
        .expect("error text")
        .contains("payload must be a JSON object"));
    assert_eq!(frames[2]["reply"], json!({"returnValue": true}));
}

#[tokio::test]
async fn integration_resize_stream_is_tagged_with_originating_request() {
    let catalog = CommandCatalog::empty()
        .with_template(CommandTemplate::new(
            "resizeMedia",
            "printf 'pass 1\\npass 2\\n'; echo resized to {}",
            Some("size"),
        ))
        .with_template(CommandTemplate::new("listMounts", "echo rootfs / ext3", None));
    let service = StorageService::with_catalog(ServiceConfig::default(), catalog);
    let input = concat!(
        "{\"request_id\": \"resize-1\", \"method\": \"resizeMedia\", \"payload\": {\"size\": \"2048\"}}\n",
        "{\"request_id\": \"mounts\", \"method\": \"listMounts\"}\n",
    );
    let (report, frames) = serve(&service, input).await;
    assert_eq!(report.error_count, 0);
    assert!(!service.resize_coordinator().is_running());

    let resize = frames_for(&frames, "resize-1");
    let replies = resize
        .iter()
        .map(|frame| frame["reply"].clone())
        .collect::<Vec<_>>();
    assert_eq!(
        replies,
        vec![
            json!({"returnValue": true, "stage": "start"}),
            json!({"returnValue": true, "stage": "status", "status": "pass 1"}),
            json!({"returnValue": true, "stage": "status", "status": "pass 2"}),
            json!({"returnValue": true, "stage": "status", "status": "resized to 2048"}),
            json!({"returnValue": true, "stage": "completed"}),
        ]
    );
    assert!(resize
        .iter()
        .all(|frame| frame["method"] == json!("resizeMedia")));

    let mounts = frames_for(&frames, "mounts");
    assert_eq!(mounts.len(), 1);
    assert_eq!(
        mounts[0]["reply"],
        json!({"stdOut": ["rootfs / ext3"], "returnValue": true})
    );
}

#[tokio::test]
async fn integration_kill_frame_cancels_running_resize() {
    let catalog = CommandCatalog::empty().with_template(CommandTemplate::new(
        "resizeMedia",
        "sleep 5; echo late {}",
        Some("size"),
    ));
    let service = StorageService::with_catalog(ServiceConfig::default(), catalog);
    let input = concat!(
        "{\"request_id\": \"r\", \"method\": \"resizeMedia\", \"payload\": {\"size\": \"100\"}}\n",
        "{\"request_id\": \"r2\", \"method\": \"resizeMedia\", \"payload\": {\"size\": \"200\"}}\n",
        "{\"request_id\": \"k\", \"method\": \"killResizeMedia\"}\n",
        "{\"request_id\": \"k2\", \"method\": \"killResizeMedia\"}\n",
    );
    let started = std::time::Instant::now();
    let (_, frames) = serve(&service, input).await;
    assert!(started.elapsed() < Duration::from_secs(4));

    let resize = frames_for(&frames, "r");
    assert_eq!(resize.len(), 1);
    assert_eq!(
        resize[0]["reply"],
        json!({"returnValue": true, "stage": "start"})
    );
    assert_eq!(
        frames_for(&frames, "r2")[0]["reply"],
        json!({"returnValue": false, "stage": "failed"})
    );
    assert_eq!(
        frames_for(&frames, "k")[0]["reply"],
        json!({"returnValue": true, "stage": "completed"})
    );
    assert_eq!(
        frames_for(&frames, "k2")[0]["reply"],
        json!({"returnValue": false, "stage": "failed"})
    );
}
