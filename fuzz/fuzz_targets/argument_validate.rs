#![no_main]

use libfuzzer_sys::fuzz_target;
use stor_core::{validate_argument, CommandTemplate};

fuzz_target!(|data: &[u8]| {
    let candidate = String::from_utf8_lossy(data);
    let Ok(argument) = validate_argument("size", &candidate) else {
        return;
    };
    assert!(argument
        .as_str()
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-'));
    let template = CommandTemplate::new("resizeMedia", "/bin/resizefat -v {} 2>&1", Some("size"));
    let command = template.render(Some(&argument)).expect("placeholder template renders");
    assert!(!command.as_str().contains(';'));
});
