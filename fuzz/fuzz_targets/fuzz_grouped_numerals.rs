#![no_main]

use libfuzzer_sys::fuzz_target;
use iceflow::config::shape::{parse_grouped_integer, parse_grouped_real};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Some(n) = parse_grouped_integer(text) {
            assert!(text.contains('_'));
            assert_eq!(text.trim().replace('_', "").parse::<i128>().ok(), Some(n));
        }
        if let Some(x) = parse_grouped_real(text) {
            assert!(text.contains('_'));
            assert!(!x.is_nan());
        }
    }
});
