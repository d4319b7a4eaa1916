// SPDX-License-Identifier: MIT OR Apache-2.0
//! `$ref` resolution and example synthesis from OpenAPI schemas.

use serde_json::{Map, Value, json};

/// Resolves `#/components/...` references against a cached components
/// tree and synthesizes example values from schemas.
///
/// The resolver is the parser's scratchpad: it is rebuilt for every spec
/// document, so references never leak between parses.
#[derive(Debug, Default)]
pub(crate) struct SchemaResolver {
    components: Value,
}

impl SchemaResolver {
    pub(crate) fn new(components: Value) -> Self {
        SchemaResolver { components }
    }

    /// Resolve a JSON `$ref` pointer to its target object.
    ///
    /// Only local `#/components/...` references resolve; external refs and
    /// missing targets degrade to an empty schema rather than an error.
    pub(crate) fn resolve_ref(&self, reference: &str) -> Value {
        let Some(path) = reference.strip_prefix("#/") else {
            return json!({});
        };

        let root = json!({ "components": &self.components });
        let mut current = &root;
        for part in path.split('/') {
            match current.get(part) {
                Some(next) => current = next,
                None => return json!({}),
            }
        }
        if current.is_object() {
            current.clone()
        } else {
            json!({})
        }
    }

    /// Resolve a parameter object, following `$ref` if present. An
    /// unresolvable reference falls back to the parameter as written.
    pub(crate) fn resolve_parameter(&self, param: &Value) -> Value {
        if let Some(reference) = param.get("$ref").and_then(Value::as_str) {
            let resolved = self.resolve_ref(reference);
            if resolved.as_object().is_some_and(|o| !o.is_empty()) {
                return resolved;
            }
        }
        param.clone()
    }

    /// Build an example value from a schema.
    ///
    /// Precedence: explicit `example` > `$ref` (cycle-safe) > `allOf`
    /// (merged object examples) > `oneOf`/`anyOf` (first) > explicit
    /// `default` > `enum[0]` > type-based synthesis.
    pub(crate) fn build_example(&self, schema: &Value) -> Value {
        let mut visited = Vec::new();
        self.build_example_inner(schema, &mut visited)
    }

    fn build_example_inner(&self, schema: &Value, visited: &mut Vec<String>) -> Value {
        let Some(obj) = schema.as_object() else {
            return Value::Null;
        };

        if let Some(example) = obj.get("example") {
            return example.clone();
        }

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            if visited.iter().any(|seen| seen == reference) {
                // Circular schema; cut the recursion with an empty object.
                return json!({});
            }
            visited.push(reference.to_string());
            let resolved = self.resolve_ref(reference);
            let example = self.build_example_inner(&resolved, visited);
            visited.pop();
            return example;
        }

        if let Some(all_of) = obj.get("allOf").and_then(Value::as_array) {
            let mut merged = Map::new();
            for sub in all_of {
                if let Value::Object(fields) = self.build_example_inner(sub, visited) {
                    merged.extend(fields);
                }
            }
            return Value::Object(merged);
        }

        for combinator in ["oneOf", "anyOf"] {
            if let Some(first) = obj
                .get(combinator)
                .and_then(Value::as_array)
                .and_then(|options| options.first())
            {
                return self.build_example_inner(first, visited);
            }
        }

        if let Some(default) = obj.get("default") {
            return default.clone();
        }
        if let Some(first) = obj.get("enum").and_then(Value::as_array).and_then(|e| e.first()) {
            return first.clone();
        }

        let schema_type = match obj.get("type").and_then(Value::as_str) {
            Some(t) => t.to_string(),
            None if obj.contains_key("properties") => "object".to_string(),
            None if obj.contains_key("items") => "array".to_string(),
            None => "object".to_string(),
        };

        match schema_type.as_str() {
            "object" => self.object_example(obj, visited),
            "array" => match obj.get("items") {
                Some(items) if items.as_object().is_some_and(|o| !o.is_empty()) => {
                    json!([self.build_example_inner(items, visited)])
                }
                _ => json!([]),
            },
            "string" => string_example(obj),
            "integer" => integer_example(obj),
            "number" => number_example(obj),
            "boolean" => json!(true),
            "null" => Value::Null,
            _ => Value::Null,
        }
    }

    fn object_example(&self, obj: &Map<String, Value>, visited: &mut Vec<String>) -> Value {
        let mut result = Map::new();
        if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
            for (name, prop_schema) in properties {
                if prop_schema.is_object() {
                    result.insert(name.clone(), self.build_example_inner(prop_schema, visited));
                }
            }
        }
        if result.is_empty() {
            if let Some(additional) = obj.get("additionalProperties") {
                if additional.is_object() {
                    result.insert(
                        "additionalProp1".to_string(),
                        self.build_example_inner(additional, visited),
                    );
                }
            }
        }
        Value::Object(result)
    }
}

fn string_example(obj: &Map<String, Value>) -> Value {
    let format = obj.get("format").and_then(Value::as_str).unwrap_or("");
    let fixed = match format {
        "email" => Some("user@example.com"),
        "date" => Some("2024-01-01"),
        "date-time" => Some("2024-01-01T00:00:00Z"),
        "uuid" => Some("123e4567-e89b-12d3-a456-426614174000"),
        "uri" | "url" => Some("https://example.com"),
        "hostname" => Some("example.com"),
        "ipv4" => Some("192.168.1.1"),
        "ipv6" => Some("::1"),
        "password" => Some("password123"),
        "byte" => Some("dGVzdA=="),
        "binary" => Some("binary_data"),
        "time" => Some("12:00:00"),
        "duration" => Some("P1D"),
        _ => None,
    };
    if let Some(value) = fixed {
        return json!(value);
    }

    let min_length = obj
        .get("minLength")
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize;
    if min_length > 0 {
        return json!("x".repeat(min_length));
    }
    json!("string")
}

fn integer_example(obj: &Map<String, Value>) -> Value {
    if let Some(minimum) = obj.get("minimum").and_then(Value::as_i64) {
        return json!(minimum);
    }
    if let Some(exclusive) = obj.get("exclusiveMinimum").and_then(Value::as_i64) {
        return json!(exclusive + 1);
    }
    json!(0)
}

fn number_example(obj: &Map<String, Value>) -> Value {
    if let Some(minimum) = obj.get("minimum").and_then(Value::as_f64) {
        return json!(minimum);
    }
    if let Some(exclusive) = obj.get("exclusiveMinimum").and_then(Value::as_f64) {
        return json!(exclusive + 1.0);
    }
    json!(0.0)
}
