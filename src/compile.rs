//! IR → [`Validator`].
//!
//! One exhaustive `match` over [`SchemaKind`], then the validation set is layered
//! on top in a fixed order: optional, numeric bounds, length bounds and pattern,
//! custom predicate, default, description.
//!
//! Lenient mode (the default) keeps the compiler total over well-typed input:
//! malformed nodes degrade with a `warn!` instead of failing. Strict mode turns
//! each of those degradations into [`SchemaError::MalformedIr`]. An unknown
//! `custom` name fails in both modes.

use std::sync::Arc;

use fancy_regex::Regex;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::{CompileOptions, Shape};
use crate::error::{FieldPath, PathSegment, SchemaError};
use crate::flat::ToolParameters;
use crate::ir::{SchemaField, SchemaKind};
use crate::predicate::PredicateRegistry;
use crate::validator::{Check, UnknownKeys, Validator};

#[derive(Debug, Clone)]
pub struct Compiler {
    options: CompileOptions,
    predicates: Arc<PredicateRegistry>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

impl Compiler {
    /// Compiler with the built-in predicate set.
    pub fn new(options: CompileOptions) -> Self {
        Self { options, predicates: Arc::new(PredicateRegistry::with_builtins()) }
    }

    #[must_use]
    pub fn with_predicates(mut self, predicates: PredicateRegistry) -> Self {
        self.predicates = Arc::new(predicates);
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn predicates(&self) -> &PredicateRegistry {
        &self.predicates
    }

    pub fn compile(&self, root: &SchemaField) -> Result<Validator, SchemaError> {
        self.compile_shaped(root, Shape::Field)
    }

    /// Flat parameter maps lower to an `object` node first; they get the flat
    /// shape's coercion default.
    pub fn compile_parameters(&self, parameters: &ToolParameters) -> Result<Validator, SchemaError> {
        self.compile_shaped(&parameters.to_schema_field(), Shape::Flat)
    }

    pub(crate) fn compile_shaped(&self, root: &SchemaField, shape: Shape) -> Result<Validator, SchemaError> {
        let pass = Pass { compiler: self, coerce: self.options.coercion.resolve(shape) };
        let mut path = FieldPath::root();
        let validator = pass.node(root, &mut path)?;
        debug!(root = %root.name, kind = root.kind.as_str(), ?shape, "compiled schema");
        Ok(validator)
    }
}

/// Compile with default options and the built-in predicates.
pub fn compile(root: &SchemaField) -> Result<Validator, SchemaError> {
    Compiler::default().compile(root)
}

// ————————————————————————————————————————————————————————————————————————————
// TREE WALK
// ————————————————————————————————————————————————————————————————————————————

struct Pass<'a> {
    compiler: &'a Compiler,
    coerce: bool,
}

impl Pass<'_> {
    fn strict(&self) -> bool {
        self.compiler.options.strict
    }

    /// Warn and carry on, or fail when strict.
    fn degrade(&self, path: &FieldPath, reason: String) -> Result<(), SchemaError> {
        if self.strict() {
            return Err(SchemaError::MalformedIr { path: path.clone(), reason });
        }
        warn!(%path, "{reason}");
        Ok(())
    }

    fn node(&self, field: &SchemaField, path: &mut FieldPath) -> Result<Validator, SchemaError> {
        let base = self.kind(field, path)?;
        self.apply_validations(field, base, path)
    }

    fn kind(&self, field: &SchemaField, path: &mut FieldPath) -> Result<Validator, SchemaError> {
        let validator = match field.kind {
            SchemaKind::String => Validator::string(),
            SchemaKind::Number if self.coerce => Validator::coerced_number(),
            SchemaKind::Number => Validator::number(),
            SchemaKind::Boolean => Validator::boolean(),
            SchemaKind::Date if self.coerce => Validator::coerced_date(),
            SchemaKind::Date => Validator::date(),
            SchemaKind::Enum => match field.enum_literals() {
                Some(literals) => Validator::enumeration(literals.iter().cloned()),
                None => {
                    self.degrade(path, "enum has no enumValues, accepting any string".into())?;
                    Validator::string()
                }
            },
            SchemaKind::Array => match field.children.as_deref().and_then(<[SchemaField]>::first) {
                Some(item) => {
                    path.push(PathSegment::Index(0));
                    let item = self.node(item, path);
                    path.pop();
                    Validator::array(item?)
                }
                None => Validator::array(Validator::any()),
            },
            SchemaKind::Object => {
                let mut fields = IndexMap::new();
                for child in field.children.iter().flatten() {
                    path.push(PathSegment::Key(child.name.clone()));
                    let compiled = self.node(child, path);
                    path.pop();
                    if fields.insert(child.name.clone(), compiled?).is_some() {
                        self.degrade(path, format!("duplicate field `{}`, last definition wins", child.name))?;
                    }
                }
                // no declared children: any object, whatever the key policy
                let policy = match field.children {
                    Some(_) => self.compiler.options.unknown_keys,
                    None => UnknownKeys::Passthrough,
                };
                Validator::object(fields).unknown_keys(policy)
            }
            SchemaKind::Union => {
                let children = field.children.as_deref().unwrap_or_default();
                if children.len() != 2 {
                    let outcome = if children.len() < 2 { "accepting any value" } else { "using the first two" };
                    self.degrade(
                        path,
                        format!("union has {} alternative(s), {outcome}", children.len()),
                    )?;
                }
                match children {
                    [first, second, ..] => {
                        path.push(PathSegment::Index(0));
                        let first = self.node(first, path);
                        path.pop();
                        path.push(PathSegment::Index(1));
                        let second = self.node(second, path);
                        path.pop();
                        Validator::union(first?, second?)
                    }
                    _ => Validator::any(),
                }
            }
            // placeholders; a calculated formula is display text only
            SchemaKind::File | SchemaKind::Calculated => Validator::any(),
            SchemaKind::Unsupported => {
                warn!(%path, "unsupported field type, accepting any value");
                Validator::any()
            }
        };
        Ok(validator)
    }

    fn apply_validations(
        &self,
        field: &SchemaField,
        mut validator: Validator,
        path: &FieldPath,
    ) -> Result<Validator, SchemaError> {
        let Some(rules) = field.validations.as_ref() else {
            return Ok(describe(validator, field));
        };

        if !rules.is_required() {
            validator = validator.optional();
        }

        match field.kind {
            SchemaKind::Number => {
                if let Some(min) = rules.min {
                    validator = validator.min(min);
                }
                if let Some(max) = rules.max {
                    validator = validator.max(max);
                }
            }
            SchemaKind::String => {
                if let Some(len) = rules.min_length {
                    validator = validator.min_length(len);
                }
                if let Some(len) = rules.max_length {
                    validator = validator.max_length(len);
                }
                if let Some(source) = rules.regex_source() {
                    match Regex::new(source) {
                        Ok(rx) => validator = validator.pattern(rx),
                        Err(err) => {
                            self.degrade(path, format!("invalid regex /{source}/, rejecting every string: {err}"))?;
                            validator = validator.check(Check::UnusablePattern(source.to_string()));
                        }
                    }
                }
            }
            _ => {}
        }

        if let Some(name) = rules.custom_name() {
            let predicate = self.compiler.predicates.get(name).ok_or_else(|| SchemaError::UnknownPredicate {
                name: name.to_string(),
                path: path.clone(),
            })?;
            validator = validator.refine(name, predicate);
        }

        if let Some(default) = &rules.default {
            match validator.validate(default) {
                Ok(_) => validator = validator.with_default(default.clone()),
                Err(err) => self.degrade(path, format!("default {default} dropped: {err}"))?,
            }
        }

        Ok(describe(validator, field))
    }
}

fn describe(validator: Validator, field: &SchemaField) -> Validator {
    match &field.description {
        Some(text) => validator.describe(text.clone()),
        None => validator,
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoercionPolicy;
    use crate::ir::Validations;
    use crate::validator::{Kind, UnknownKeys};
    use serde_json::{Value, json};

    fn field(value: Value) -> SchemaField {
        serde_json::from_value(value).unwrap()
    }

    fn strict() -> Compiler {
        Compiler::new(CompileOptions::strict())
    }

    #[test]
    fn numbers_coerce_on_the_recursive_shape() {
        let v = compile(&field(json!({"name": "n", "type": "number"}))).unwrap();
        assert_eq!(v.validate(&json!("7")).unwrap(), json!(7));

        let never = Compiler::new(CompileOptions { coercion: CoercionPolicy::Never, ..Default::default() });
        assert!(!never.compile(&field(json!({"type": "number"}))).unwrap().accepts(&json!("7")));
    }

    #[test]
    fn numeric_bounds_ignore_non_numbers() {
        let v = compile(&field(json!({"type": "string", "validations": {"min": 5, "max": 6}}))).unwrap();
        assert!(v.accepts(&json!("ab")));
        assert!(v.checks().is_empty());
    }

    #[test]
    fn empty_enum_degrades_unless_strict() {
        let node = field(json!({"name": "e", "type": "enum", "enumValues": []}));
        let v = compile(&node).unwrap();
        assert!(matches!(v.kind(), Kind::String));
        assert!(v.accepts(&json!("anything")));

        let err = strict().compile(&node).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedIr { .. }));
    }

    #[test]
    fn union_arity() {
        let short = field(json!({"type": "union", "children": [{"type": "number"}]}));
        assert!(matches!(compile(&short).unwrap().kind(), Kind::Any));
        assert!(strict().compile(&short).is_err());

        let long = field(json!({"type": "union", "children": [
            {"type": "number"}, {"type": "boolean"}, {"type": "string"}
        ]}));
        let v = compile(&long).unwrap();
        assert!(v.accepts(&json!(true)));
        assert!(!v.accepts(&json!("third alternative is ignored")));
        assert!(strict().compile(&long).is_err());
    }

    #[test]
    fn array_uses_only_the_first_child() {
        let v = compile(&field(json!({"type": "array", "children": [{"type": "boolean"}, {"type": "string"}]})))
            .unwrap();
        assert!(v.accepts(&json!([true, false])));
        assert!(!v.accepts(&json!(["x"])));
        assert!(compile(&field(json!({"type": "array"}))).unwrap().accepts(&json!([1, "a", null])));
    }

    #[test]
    fn duplicate_siblings_keep_the_last_definition() {
        let node = field(json!({"type": "object", "children": [
            {"name": "a", "type": "string"},
            {"name": "a", "type": "number"}
        ]}));
        let v = compile(&node).unwrap();
        assert!(v.accepts(&json!({"a": 1})));
        assert!(!v.accepts(&json!({"a": "x"})));
        assert!(strict().compile(&node).is_err());
    }

    #[test]
    fn inert_kinds_accept_anything() {
        for tag in ["file", "calculated", "signature"] {
            let v = compile(&field(json!({"type": tag}))).unwrap();
            assert!(v.accepts(&json!({"whatever": [1, 2]})), "{tag}");
        }
    }

    #[test]
    fn invalid_regex_fails_closed() {
        let node = field(json!({"type": "string", "validations": {"regex": "(["}}));
        let v = compile(&node).unwrap();
        assert!(!v.accepts(&json!("x")));
        assert!(!v.accepts(&json!("")));
        assert!(strict().compile(&node).is_err());
    }

    #[test]
    fn lookahead_patterns_constrain_the_field() {
        let node = field(json!({"type": "string", "validations": {"regex": "^(?=.*\\d).{8,}$"}}));
        let v = compile(&node).unwrap();
        assert!(!v.accepts(&json!("x")));
        assert!(!v.accepts(&json!("longenough")));
        assert!(v.accepts(&json!("longenough1")));
        assert!(strict().compile(&node).is_ok());
    }

    #[test]
    fn custom_names_must_be_registered() {
        let node = field(json!({"type": "object", "children": [
            {"name": "code", "type": "string", "validations": {"custom": "isUpper"}}
        ]}));
        let err = compile(&node).unwrap_err();
        match err {
            SchemaError::UnknownPredicate { name, path } => {
                assert_eq!(name, "isUpper");
                assert_eq!(path.to_string(), "code");
            }
            other => panic!("unexpected error: {other}"),
        }

        let registry = PredicateRegistry::new()
            .with("isUpper", |v| v.as_str().is_some_and(|s| s.chars().all(|c| c.is_ascii_uppercase())));
        let v = Compiler::default().with_predicates(registry).compile(&node).unwrap();
        assert!(v.accepts(&json!({"code": "ABC"})));
        assert!(!v.accepts(&json!({"code": "abc"})));
    }

    #[test]
    fn custom_text_is_never_run_as_code() {
        let node = SchemaField::new("x", SchemaKind::String).with_validations(Validations {
            custom: Some("(v) => v.length > 3".into()),
            ..Validations::default()
        });
        assert!(matches!(compile(&node), Err(SchemaError::UnknownPredicate { .. })));
    }

    #[test]
    fn defaults_are_checked_once_at_compile_time() {
        let ok = field(json!({"type": "number", "validations": {"default": 3, "min": 0}}));
        let v = compile(&ok).unwrap();
        assert_eq!(v.validate_optional(None).unwrap(), Some(json!(3)));

        let bad = field(json!({"type": "number", "validations": {"default": -3, "min": 0}}));
        let v = compile(&bad).unwrap();
        assert!(v.default_value().is_none());
        assert!(strict().compile(&bad).is_err());
    }

    #[test]
    fn unknown_key_policy_reaches_nested_objects() {
        let compiler = Compiler::new(CompileOptions { unknown_keys: UnknownKeys::Reject, ..Default::default() });
        let node = field(json!({"type": "object", "children": [
            {"name": "inner", "type": "object", "children": []}
        ]}));
        let v = compiler.compile(&node).unwrap();
        let err = v.validate(&json!({"inner": {"x": 1}})).unwrap_err();
        assert_eq!(err.issues()[0].path.to_string(), "inner.x");
    }

    #[test]
    fn childless_objects_accept_any_object_under_every_policy() {
        let compiler = Compiler::new(CompileOptions { unknown_keys: UnknownKeys::Reject, ..Default::default() });
        let record = compiler.compile(&field(json!({"type": "object"}))).unwrap();
        assert_eq!(record.validate(&json!({"a": 1})).unwrap(), json!({"a": 1}));
        assert!(!record.accepts(&json!([1])));

        let empty = compiler.compile(&field(json!({"type": "object", "children": []}))).unwrap();
        assert!(!empty.accepts(&json!({"a": 1})));
        assert!(empty.accepts(&json!({})));
    }

    #[test]
    fn errors_carry_nested_paths() {
        let node = field(json!({"type": "object", "children": [
            {"name": "items", "type": "array", "children": [
                {"name": "item", "type": "enum", "enumValues": []}
            ]}
        ]}));
        match strict().compile(&node).unwrap_err() {
            SchemaError::MalformedIr { path, .. } => assert_eq!(path.to_string(), "items[0]"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
