// SPDX-License-Identifier: MIT OR Apache-2.0
//! HATEOAS link extraction: HAL, link arrays, JSON:API, action arrays.

use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;
use sx_core::{Action, HttpMethod};
use tracing::debug;

/// Extract follow-up actions advertised inside a response body.
///
/// Four shapes are understood and applied in union: a HAL `_links`
/// mapping, a `links` array, a JSON:API `links` mapping, and
/// `actions`/`operations` arrays. The `self` relation is always
/// filtered out, and the result is deduplicated by `(method, endpoint)`.
#[must_use]
pub fn extract_link_actions(response: &Value) -> Vec<Action> {
    let mut actions: Vec<Action> = Vec::new();

    if let Some(links) = response.get("_links").and_then(Value::as_object) {
        actions.extend(parse_hal_links(links));
    }
    match response.get("links") {
        Some(Value::Array(links)) => actions.extend(parse_links_array(links)),
        Some(Value::Object(links)) => actions.extend(parse_jsonapi_links(links)),
        _ => {}
    }
    for key in ["actions", "operations"] {
        if let Some(items) = response.get(key).and_then(Value::as_array) {
            actions.extend(parse_actions_array(items));
        }
    }

    dedupe(actions)
}

fn dedupe(actions: Vec<Action>) -> Vec<Action> {
    let mut seen: HashSet<(HttpMethod, String)> = HashSet::new();
    actions
        .into_iter()
        .filter(|action| seen.insert((action.method, action.endpoint.clone())))
        .collect()
}

fn parse_method(raw: Option<&Value>, fallback: HttpMethod) -> Option<HttpMethod> {
    match raw.and_then(Value::as_str) {
        None => Some(fallback),
        Some(text) => match HttpMethod::from_str(text) {
            Ok(method) => Some(method),
            Err(_) => {
                debug!(method = text, "link with unrecognized method dropped");
                None
            }
        },
    }
}

// HAL: `_links` maps rel → link object (or array of link objects).
fn parse_hal_links(links: &serde_json::Map<String, Value>) -> Vec<Action> {
    let mut actions = Vec::new();
    for (rel, link) in links {
        if rel == "self" {
            continue;
        }
        match link {
            Value::Object(data) => {
                if let Some(action) = hal_link_action(rel, data) {
                    actions.push(action);
                }
            }
            Value::Array(items) => {
                for item in items {
                    if let Some(data) = item.as_object() {
                        if let Some(action) = hal_link_action(rel, data) {
                            actions.push(action);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    actions
}

fn hal_link_action(rel: &str, data: &serde_json::Map<String, Value>) -> Option<Action> {
    let href = data.get("href").and_then(Value::as_str)?;
    let method = parse_method(data.get("method"), HttpMethod::Get)?;
    let title = data
        .get("title")
        .or_else(|| data.get("name"))
        .and_then(Value::as_str)
        .unwrap_or(rel);
    Some(Action::new(method, href).with_description(title))
}

// Flat array of link objects with assorted key spellings.
fn parse_links_array(links: &[Value]) -> Vec<Action> {
    let mut actions = Vec::new();
    for link in links {
        let Some(data) = link.as_object() else {
            continue;
        };
        let href = data
            .get("href")
            .or_else(|| data.get("url"))
            .or_else(|| data.get("uri"))
            .and_then(Value::as_str);
        let rel = data
            .get("rel")
            .or_else(|| data.get("relation"))
            .or_else(|| data.get("name"))
            .and_then(Value::as_str);
        let (Some(href), rel) = (href, rel) else {
            continue;
        };
        if rel == Some("self") {
            continue;
        }
        let Some(method) = parse_method(data.get("method"), HttpMethod::Get) else {
            continue;
        };
        let mut action = Action::new(method, href);
        if let Some(rel) = rel {
            action = action.with_description(rel);
        }
        actions.push(action);
    }
    actions
}

// JSON:API: `links` maps rel → href string (or an object with `href`).
// Methods are inferred from the relation name.
fn parse_jsonapi_links(links: &serde_json::Map<String, Value>) -> Vec<Action> {
    let mut actions = Vec::new();
    for (rel, link) in links {
        if rel == "self" {
            continue;
        }
        let href = match link {
            Value::String(href) => Some(href.as_str()),
            Value::Object(data) => data.get("href").and_then(Value::as_str),
            _ => None,
        };
        let Some(href) = href else {
            continue;
        };
        let method = method_from_rel(rel);
        actions.push(Action::new(method, href).with_description(rel.as_str()));
    }
    actions
}

fn method_from_rel(rel: &str) -> HttpMethod {
    match rel {
        "create" | "add" | "new" => HttpMethod::Post,
        "update" | "edit" | "modify" => HttpMethod::Put,
        "delete" | "remove" | "destroy" => HttpMethod::Delete,
        _ => HttpMethod::Get,
    }
}

// `actions`/`operations`: arrays of operation descriptors.
fn parse_actions_array(items: &[Value]) -> Vec<Action> {
    let mut actions = Vec::new();
    for item in items {
        let Some(data) = item.as_object() else {
            continue;
        };
        let href = data
            .get("href")
            .or_else(|| data.get("url"))
            .or_else(|| data.get("uri"))
            .or_else(|| data.get("endpoint"))
            .and_then(Value::as_str);
        let Some(href) = href else {
            continue;
        };
        let Some(method) = parse_method(
            data.get("method").or_else(|| data.get("type")),
            HttpMethod::Get,
        ) else {
            continue;
        };
        let name = data
            .get("name")
            .or_else(|| data.get("title"))
            .or_else(|| data.get("description"))
            .or_else(|| data.get("action"))
            .and_then(Value::as_str);
        let mut action = Action::new(method, href);
        if let Some(name) = name {
            action = action.with_description(name);
        }
        actions.push(action);
    }
    actions
}
