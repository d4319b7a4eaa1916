// SPDX-License-Identifier: MIT OR Apache-2.0
//! Human-readable state names from accumulated context.

use serde_json::Value;
use sx_core::{ExplorationContext, ScalarValue};

// Resource labels in presentation order.
const RESOURCE_ORDER: [(&str, &str); 9] = [
    ("order_id", "Order"),
    ("todo_id", "Todo"),
    ("item_id", "Item"),
    ("product_id", "Product"),
    ("cart_id", "Cart"),
    ("attachment_id", "Attachment"),
    ("file_id", "File"),
    ("comment_id", "Comment"),
    ("post_id", "Post"),
];

// Boolean status flags in presentation order.
const STATUS_FLAGS: [(&str, &str); 5] = [
    ("completed", "Completed"),
    ("active", "Active"),
    ("verified", "Verified"),
    ("deleted", "Deleted"),
    ("pending", "Pending"),
];

const AUTH_KEYS: [&str; 4] = ["auth_token", "access_token", "refresh_token", "api_key"];

/// Generate a `" | "`-joined state name from context and response.
///
/// The name starts with `Authenticated` or `Anonymous`, then `User:<id>`
/// if known, one segment per known resource id in a fixed order, boolean
/// status flags (response first, context second), and finally a
/// capitalized string `status` when present.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use sx_core::ExplorationContext;
/// use sx_context::generate_state_name;
///
/// let mut ctx = ExplorationContext::new();
/// ctx.insert("todo_id", 42i64.into());
/// let name = generate_state_name(&ctx, &json!({"completed": true}));
/// assert_eq!(name, "Anonymous | Todo:42 | Completed");
/// ```
#[must_use]
pub fn generate_state_name(context: &ExplorationContext, response: &Value) -> String {
    let mut parts: Vec<String> = Vec::new();

    if AUTH_KEYS.iter().any(|k| context.contains(k)) {
        parts.push("Authenticated".to_string());
    } else {
        parts.push("Anonymous".to_string());
    }

    if let Some(user_id) = context.get("user_id") {
        parts.push(format!("User:{user_id}"));
    }

    for (key, label) in RESOURCE_ORDER {
        if let Some(value) = context.get(key) {
            parts.push(format!("{label}:{value}"));
        }
    }

    for (key, label) in STATUS_FLAGS {
        if flag_set(context, response, key) {
            parts.push(label.to_string());
        }
    }

    if let Some(status) = string_status(context, response) {
        parts.push(capitalize(&status));
    }

    if parts.len() == 1 {
        return parts.remove(0);
    }
    parts.join(" | ")
}

// A flag counts only when literally `true`; the response wins over the
// context.
fn flag_set(context: &ExplorationContext, response: &Value, key: &str) -> bool {
    match response.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(_) => false,
        None => matches!(context.get(key), Some(ScalarValue::Bool(true))),
    }
}

fn string_status(context: &ExplorationContext, response: &Value) -> Option<String> {
    if let Some(Value::String(s)) = response.get("status") {
        return Some(s.clone());
    }
    if response.get("status").is_some() {
        return None;
    }
    match context.get("status") {
        Some(ScalarValue::Str(s)) => Some(s.clone()),
        _ => None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
