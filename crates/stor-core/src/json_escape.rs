use crate::StorageError;

/// Largest input accepted by the escaper.
pub const MAX_ESCAPE_INPUT_BYTES: usize = 8 * 1024;

const JSON_HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Escapes `input` into the body of a JSON string literal (no surrounding quotes).
///
/// Bytes below `0x20` and above `0x7f` are written as `\u00XX` one byte at a
/// time, so multi-byte UTF-8 sequences come out as several escapes rather than
/// one code point.
pub fn json_escape_bytes(input: &[u8]) -> Result<String, StorageError> {
    if input.len() > MAX_ESCAPE_INPUT_BYTES {
        return Err(StorageError::EscapeInputTooLong {
            len: input.len(),
            max: MAX_ESCAPE_INPUT_BYTES,
        });
    }

    let mut output = String::with_capacity(input.len() + input.len() / 8 + 2);
    let mut run_start = 0;
    for (position, &byte) in input.iter().enumerate() {
        let short_escape = match byte {
            0x08 => Some("\\b"),
            b'\n' => Some("\\n"),
            b'\r' => Some("\\r"),
            b'\t' => Some("\\t"),
            b'"' => Some("\\\""),
            b'\\' => Some("\\\\"),
            _ => None,
        };
        let needs_unicode_escape = byte < 0x20 || byte > 0x7f;
        if short_escape.is_none() && !needs_unicode_escape {
            continue;
        }

        push_ascii_run(&mut output, &input[run_start..position]);
        match short_escape {
            Some(escape) => output.push_str(escape),
            None => {
                output.push_str("\\u00");
                output.push(char::from(JSON_HEX_DIGITS[usize::from(byte >> 4)]));
                output.push(char::from(JSON_HEX_DIGITS[usize::from(byte & 0x0f)]));
            }
        }
        run_start = position + 1;
    }
    push_ascii_run(&mut output, &input[run_start..]);

    Ok(output)
}

/// Convenience wrapper over [`json_escape_bytes`] for text input.
pub fn json_escape_str(input: &str) -> Result<String, StorageError> {
    json_escape_bytes(input.as_bytes())
}

/// Length of the escaped form of one input byte.
pub fn json_escaped_byte_len(byte: u8) -> usize {
    match byte {
        0x08 | b'\n' | b'\r' | b'\t' | b'"' | b'\\' => 2,
        byte if byte < 0x20 || byte > 0x7f => 6,
        _ => 1,
    }
}

/// Longest prefix of `input` whose escaped form fits in `room` bytes.
pub fn escaped_prefix_len(input: &[u8], room: usize) -> usize {
    let mut used = 0usize;
    for (position, &byte) in input.iter().enumerate() {
        used = used.saturating_add(json_escaped_byte_len(byte));
        if used > room {
            return position;
        }
    }
    input.len()
}

// Runs never contain bytes outside 0x20..=0x7f.
fn push_ascii_run(output: &mut String, run: &[u8]) {
    output.extend(run.iter().copied().map(char::from));
}

#[cfg(test)]
mod tests {
    use super::{
        escaped_prefix_len, json_escape_bytes, json_escape_str, json_escaped_byte_len,
        MAX_ESCAPE_INPUT_BYTES,
    };
    use crate::StorageError;
    use proptest::prelude::*;

    #[test]
    fn unit_escapes_short_sequences() {
        assert_eq!(
            json_escape_str("a\"b\\c\nd\re\tf\u{8}g").expect("escape"),
            "a\\\"b\\\\c\\nd\\re\\tf\\bg"
        );
    }

    #[test]
    fn unit_escapes_control_and_high_bytes_as_lowercase_unicode() {
        assert_eq!(json_escape_bytes(&[0x01]).expect("escape"), "\\u0001");
        assert_eq!(json_escape_bytes(&[0x1f]).expect("escape"), "\\u001f");
        assert_eq!(json_escape_bytes(&[0xff]).expect("escape"), "\\u00ff");
        assert_eq!(json_escape_str("é").expect("escape"), "\\u00c3\\u00a9");
    }

    #[test]
    fn unit_delete_byte_passes_through() {
        assert_eq!(json_escape_bytes(&[b'a', 0x7f]).expect("escape"), "a\u{7f}");
    }

    #[test]
    fn unit_plain_text_is_unchanged() {
        let line = "/dev/mapper/store-media   7712   512   7200   7% /media/internal";
        assert_eq!(json_escape_str(line).expect("escape"), line);
        assert_eq!(json_escape_str("").expect("escape"), "");
    }

    #[test]
    fn regression_escaping_twice_re_escapes_backslashes() {
        let once = json_escape_str("a\"b").expect("escape");
        let twice = json_escape_str(&once).expect("escape");
        assert_eq!(twice, "a\\\\\\\"b");
    }

    #[test]
    fn regression_over_length_input_is_an_explicit_error() {
        let input = vec![b'a'; MAX_ESCAPE_INPUT_BYTES + 1];
        assert_eq!(
            json_escape_bytes(&input),
            Err(StorageError::EscapeInputTooLong {
                len: MAX_ESCAPE_INPUT_BYTES + 1,
                max: MAX_ESCAPE_INPUT_BYTES,
            })
        );
        let at_limit = vec![b'a'; MAX_ESCAPE_INPUT_BYTES];
        assert_eq!(
            json_escape_bytes(&at_limit).expect("escape").len(),
            MAX_ESCAPE_INPUT_BYTES
        );
    }

    #[test]
    fn unit_escaped_prefix_len_never_splits_an_escape() {
        assert_eq!(json_escaped_byte_len(b'a'), 1);
        assert_eq!(json_escaped_byte_len(b'"'), 2);
        assert_eq!(json_escaped_byte_len(0x01), 6);
        assert_eq!(escaped_prefix_len(b"ab\"cd", 3), 2);
        assert_eq!(escaped_prefix_len(b"ab\"cd", 4), 3);
        assert_eq!(escaped_prefix_len(&[b'x', 0xc3, 0xa9], 6), 1);
        assert_eq!(escaped_prefix_len(b"short", 64), 5);
    }

    proptest! {
        #[test]
        fn property_escaped_prefix_fits_room(
            input in proptest::collection::vec(any::<u8>(), 0..256),
            room in 0usize..512
        ) {
            let kept = escaped_prefix_len(&input, room);
            let escaped = json_escape_bytes(&input[..kept]).expect("escape");
            prop_assert!(escaped.len() <= room);
            if kept < input.len() {
                let longer = json_escape_bytes(&input[..kept + 1]).expect("escape");
                prop_assert!(longer.len() > room);
            }
        }

        #[test]
        fn property_output_has_no_raw_quotes_backslashes_or_controls(
            input in proptest::collection::vec(any::<u8>(), 0..512)
        ) {
            let escaped = json_escape_bytes(&input).expect("escape");
            let bytes = escaped.as_bytes();
            let mut index = 0;
            while index < bytes.len() {
                let byte = bytes[index];
                prop_assert!(byte >= 0x20 && byte <= 0x7f);
                prop_assert_ne!(byte, b'"');
                if byte == b'\\' {
                    prop_assert!(index + 1 < bytes.len());
                    let next = bytes[index + 1];
                    prop_assert!(b"bnrt\"\\u".contains(&next));
                    index += if next == b'u' { 6 } else { 2 };
                    continue;
                }
                index += 1;
            }
        }

        #[test]
        fn property_escaped_output_parses_as_json_string(
            input in proptest::collection::vec(0x00u8..0x80, 0..256)
        ) {
            let escaped = json_escape_bytes(&input).expect("escape");
            let decoded: String = serde_json::from_str(&format!("\"{escaped}\"")).expect("json");
            let expected: String = input.iter().copied().map(char::from).collect();
            prop_assert_eq!(decoded, expected);
        }

        #[test]
        fn property_escaping_is_deterministic(input in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(json_escape_bytes(&input), json_escape_bytes(&input));
        }
    }
}
