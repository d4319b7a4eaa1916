// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz OpenAPI parsing with arbitrary text input.
//!
//! The parser must never panic: invalid documents fail with a typed
//! error, malformed path items degrade to skips, and unresolvable
//! `$ref`s become empty schemas.
#![no_main]
use libfuzzer_sys::fuzz_target;
use sx_core::ExplorationConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let config = ExplorationConfig::default();
    match sx_spec::parse_spec(text, &config) {
        Ok(actions) => {
            for action in &actions {
                // Emitted actions are internally consistent.
                assert!(action.endpoint.starts_with('/'));
                let _ = action.transition_label();
            }
        }
        Err(e) => {
            let _ = format!("{e}");
        }
    }
});
