// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz placeholder substitution and key normalization.
//!
//! Whatever the template and bindings, substitution either resolves to a
//! brace-free string or reports unresolved; it never panics.
#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sx_core::ExplorationContext;

#[derive(Debug, Arbitrary)]
struct SubstitutionInput {
    endpoint: String,
    bindings: Vec<(String, i64)>,
}

fuzz_target!(|input: SubstitutionInput| {
    let mut context = ExplorationContext::new();
    for (key, value) in input.bindings {
        context.insert(key, value.into());
    }

    let _ = sx_context::normalize_key(&input.endpoint);
    let placeholders = sx_context::placeholders_in(&input.endpoint);

    if let Some(resolved) = sx_context::substitute_path_params(&input.endpoint, &context) {
        // Every scanned placeholder was replaced.
        for name in &placeholders {
            assert!(!resolved.contains(&format!("{{{name}}}")));
        }
    }
});
