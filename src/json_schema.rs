//! IR → JSON Schema, the shape LLM function-calling APIs expect for tool parameters.

use serde_json::{Map, Value, json};

use crate::ir::{SchemaField, SchemaKind};

/// Build a JSON Schema document for `field`.
///
/// Kinds with no JSON Schema counterpart (file, calculated, unsupported, a
/// union with fewer than two alternatives) become the empty schema `{}`.
pub fn json_schema(field: &SchemaField) -> Value {
    let mut o = match field.kind {
        SchemaKind::String => {
            let mut o = json!({ "type": "string" });
            if let Some(rules) = &field.validations {
                if let Some(len) = rules.min_length { o["minLength"] = Value::from(len); }
                if let Some(len) = rules.max_length { o["maxLength"] = Value::from(len); }
                if let Some(rx) = rules.regex_source() { o["pattern"] = Value::from(rx); }
            }
            o
        }
        SchemaKind::Number => {
            let mut o = json!({ "type": "number" });
            if let Some(rules) = &field.validations {
                if let Some(m) = rules.min { o["minimum"] = Value::from(m); }
                if let Some(m) = rules.max { o["maximum"] = Value::from(m); }
            }
            o
        }
        SchemaKind::Boolean => json!({ "type": "boolean" }),
        SchemaKind::Date => json!({ "type": "string", "format": "date-time" }),
        SchemaKind::Enum => match field.enum_literals() {
            Some(literals) => json!({ "type": "string", "enum": literals }),
            None => json!({ "type": "string" }),
        },
        SchemaKind::Array => match field.children.as_deref().and_then(<[SchemaField]>::first) {
            Some(item) => json!({ "type": "array", "items": json_schema(item) }),
            None => json!({ "type": "array" }),
        },
        SchemaKind::Object => object_schema(field.children.as_deref().unwrap_or_default()),
        SchemaKind::Union => match field.children.as_deref() {
            Some([first, second, ..]) => json!({ "anyOf": [json_schema(first), json_schema(second)] }),
            _ => json!({}),
        },
        SchemaKind::File | SchemaKind::Calculated | SchemaKind::Unsupported => json!({}),
    };

    if let Some(text) = &field.description {
        o["description"] = Value::from(text.clone());
    }
    if let Some(default) = field.validations.as_ref().and_then(|rules| rules.default.as_ref()) {
        o["default"] = default.clone();
    }
    o
}

fn object_schema(children: &[SchemaField]) -> Value {
    let mut properties = Map::new();
    for child in children {
        properties.insert(child.name.clone(), json_schema(child));
    }
    let required: Vec<Value> = children
        .iter()
        .filter(|c| c.is_required() && c.validations.as_ref().is_none_or(|rules| rules.default.is_none()))
        .map(|c| Value::from(c.name.clone()))
        .collect();

    let mut o = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        o["required"] = Value::Array(required);
    }
    o
}

/// `{ name, description, parameters }`, one function-calling tool declaration.
pub fn function_definition(name: &str, description: &str, parameters: &SchemaField) -> Value {
    json!({
        "name": name,
        "description": description,
        "parameters": json_schema(parameters),
    })
}

// ------------------------------- Tests ------------------------------------ //
