#![no_main]

use libfuzzer_sys::fuzz_target;
use stor_core::{json_escape_bytes, MAX_ESCAPE_INPUT_BYTES};

fuzz_target!(|data: &[u8]| {
    match json_escape_bytes(data) {
        Ok(escaped) => {
            assert!(data.len() <= MAX_ESCAPE_INPUT_BYTES);
            assert!(escaped.bytes().all(|byte| byte >= 0x20 && byte < 0x80));
            let literal = format!("\"{escaped}\"");
            let decoded = serde_json::from_str::<String>(&literal).expect("escaped text parses");
            if data.iter().all(|byte| *byte < 0x80) {
                assert_eq!(decoded.as_bytes(), data);
            }
        }
        Err(_) => assert!(data.len() > MAX_ESCAPE_INPUT_BYTES),
    }
});
