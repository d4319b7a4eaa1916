// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz fingerprinting and link extraction over arbitrary JSON.
//!
//! Fingerprints are 16 hex chars and deterministic for any value the
//! JSON parser accepts; link extraction never panics.
#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };

    let fields = vec!["status".to_string(), "state".to_string()];
    let first = sx_detect::fingerprint(&value, &fields);
    let second = sx_detect::fingerprint(&value, &fields);
    assert_eq!(first, second);
    assert_eq!(first.len(), 16);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit()));

    let _ = sx_detect::extract_link_actions(&value);
});
