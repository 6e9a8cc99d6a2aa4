//! [`Validator`] → IR, best effort.
//!
//! Works on any validator, compiled or hand-built. Refinements, defaults and
//! calculated metadata do not survive; unrecognized kinds come back as `string`.

use crate::ir::{SchemaField, SchemaKind, Validations};
use crate::validator::{Check, Kind, Validator};

pub const DEFAULT_ROOT_NAME: &str = "root";
pub const ARRAY_ITEM_NAME: &str = "item";

pub fn introspect(validator: &Validator, name: Option<&str>) -> SchemaField {
    node(validator, name.unwrap_or(DEFAULT_ROOT_NAME))
}

fn node(validator: &Validator, name: &str) -> SchemaField {
    let mut field = match validator.kind() {
        Kind::Object { fields, .. } => SchemaField::new(name, SchemaKind::Object)
            .with_children(fields.iter().map(|(key, child)| node(child, key)).collect()),
        Kind::Array(item) => SchemaField::new(name, SchemaKind::Array).with_children(vec![node(item, ARRAY_ITEM_NAME)]),
        Kind::Enum(members) => SchemaField {
            enum_values: Some(members.clone()),
            ..SchemaField::new(name, SchemaKind::Enum)
        },
        Kind::Number { .. } => SchemaField::new(name, SchemaKind::Number),
        Kind::Boolean => SchemaField::new(name, SchemaKind::Boolean),
        Kind::Date { .. } => SchemaField::new(name, SchemaKind::Date),
        Kind::String | Kind::Any | Kind::Union(..) => SchemaField::new(name, SchemaKind::String),
    };

    let mut rules = Validations::default();
    if validator.accepts_missing() {
        rules.required = Some(false);
    }
    for check in validator.checks() {
        match (field.kind, check) {
            (SchemaKind::Number, Check::Min(min)) => rules.min = Some(*min),
            (SchemaKind::Number, Check::Max(max)) => rules.max = Some(*max),
            (SchemaKind::String, Check::MinLength(len)) => rules.min_length = Some(*len),
            (SchemaKind::String, Check::MaxLength(len)) => rules.max_length = Some(*len),
            (SchemaKind::String, Check::Pattern(rx)) => rules.regex = Some(rx.as_str().to_string()),
            (SchemaKind::String, Check::UnusablePattern(source)) => rules.regex = Some(source.clone()),
            _ => {}
        }
    }
    if !rules.is_empty() {
        field.validations = Some(rules);
    }
    field.description = validator.description().map(str::to_string);
    field
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use fancy_regex::Regex;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn hand_built_validator() {
        let v = Validator::object([
            ("name", Validator::string().min_length(1).describe("display name")),
            ("age", Validator::number().min(0.0).max(130.0).optional()),
            ("role", Validator::enumeration(["admin", "user"])),
            ("tags", Validator::array(Validator::string().pattern(Regex::new("^#").unwrap()))),
            ("joined", Validator::coerced_date()),
            ("active", Validator::boolean()),
        ]);
        let ir = introspect(&v, None);
        assert_eq!(ir.name, "root");
        assert_eq!(
            serde_json::to_value(&ir).unwrap(),
            json!({
                "name": "root",
                "type": "object",
                "children": [
                    {"name": "name", "type": "string", "description": "display name", "validations": {"minLength": 1}},
                    {"name": "age", "type": "number", "validations": {"required": false, "min": 0.0, "max": 130.0}},
                    {"name": "role", "type": "enum", "enumValues": ["admin", "user"]},
                    {"name": "tags", "type": "array", "children": [
                        {"name": "item", "type": "string", "validations": {"regex": "^#"}}
                    ]},
                    {"name": "joined", "type": "date"},
                    {"name": "active", "type": "boolean"}
                ]
            })
        );
    }

    #[test]
    fn unrecognized_kinds_fall_back_to_string() {
        let ir = introspect(&Validator::union(Validator::number(), Validator::boolean()), Some("u"));
        assert_eq!((ir.name.as_str(), ir.kind), ("u", SchemaKind::String));
        assert_eq!(introspect(&Validator::any(), None).kind, SchemaKind::String);
    }

    #[test]
    fn defaults_read_as_optional_but_are_not_recovered() {
        let v = Validator::string().with_default(json!("x"));
        let rules = introspect(&v, None).validations.unwrap();
        assert_eq!(rules.required, Some(false));
        assert_eq!(rules.default, None);
    }

    #[test]
    fn refinements_are_lost() {
        let v = Validator::string().refine("nonEmpty", Arc::new(|_: &serde_json::Value| true));
        assert_eq!(introspect(&v, None).validations, None);
    }

    #[test]
    fn compile_then_introspect() {
        let node: SchemaField = serde_json::from_value(json!({
            "name": "age", "type": "number",
            "validations": {"min": 0, "max": 130, "custom": "integer", "default": 18}
        }))
        .unwrap();
        let back = introspect(&compile(&node).unwrap(), Some("age"));
        let rules = back.validations.unwrap();
        assert_eq!((rules.min, rules.max), (Some(0.0), Some(130.0)));
        assert_eq!((rules.custom, rules.default), (None, None));
    }
}
