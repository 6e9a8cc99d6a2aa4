// Schema IR: the recursive field tree the compiler, codegen and introspector share.
// Pure data; the only behavior here is load-time default resolution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Enum,
    Union,
    Date,
    File,
    Calculated,
    /// any tag we don't know; compiles to accept-any
    #[serde(other)]
    Unsupported,
}

impl SchemaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Enum => "enum",
            Self::Union => "union",
            Self::Date => "date",
            Self::File => "file",
            Self::Calculated => "calculated",
            Self::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SchemaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<Validations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// object: named fields; array: element template (first only); union: first two
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SchemaField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_field: Option<CalculatedField>,
}

/// Constraint set of a field.
///
/// `min`/`max` are numeric bounds and only mean something on `number`;
/// string lengths live in `min_length`/`max_length`. `custom` names a
/// predicate registered with the compiler, it is never evaluated as code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatedField {
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub formula: String,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaField {
    pub fn new(name: impl Into<String>, kind: SchemaKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            validations: None,
            enum_values: None,
            children: None,
            calculated_field: None,
        }
    }

    pub fn with_children(mut self, children: Vec<SchemaField>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_validations(mut self, validations: Validations) -> Self {
        self.validations = Some(validations);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.validations.as_ref().is_none_or(Validations::is_required)
    }

    /// Non-empty enum literals, if any.
    pub fn enum_literals(&self) -> Option<&[String]> {
        self.enum_values.as_deref().filter(|values| !values.is_empty())
    }

    /// Rewrite string-encoded default literals into typed JSON values, recursively.
    ///
    /// The builder stores every default as text; `"42"` on a number field becomes `42`,
    /// `"true"` on a boolean becomes `true`, and array/object/union defaults are read
    /// as JSON (`"[1, 2]"` becomes `[1, 2]`). Anything that doesn't parse is left alone
    /// and surfaces later when the compiler checks the default against the field.
    pub fn resolve_defaults(&mut self) {
        if let Some(rules) = self.validations.as_mut() {
            if let Some(Value::String(text)) = &rules.default {
                let typed = match self.kind {
                    SchemaKind::Number => text
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|n| n.is_finite())
                        .map(number_literal),
                    SchemaKind::Boolean => match text.trim() {
                        "true" => Some(Value::Bool(true)),
                        "false" => Some(Value::Bool(false)),
                        _ => None,
                    },
                    SchemaKind::Array | SchemaKind::Object | SchemaKind::Union => {
                        serde_json::from_str::<Value>(text.trim()).ok()
                    }
                    _ => None,
                };
                if let Some(typed) = typed {
                    rules.default = Some(typed);
                }
            }
        }
        for child in self.children.iter_mut().flatten() {
            child.resolve_defaults();
        }
    }
}

impl Validations {
    pub fn is_required(&self) -> bool {
        self.required != Some(false)
    }

    pub fn regex_source(&self) -> Option<&str> {
        self.regex.as_deref().filter(|s| !s.is_empty())
    }

    pub fn custom_name(&self) -> Option<&str> {
        self.custom.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Integral values become JSON integers so they print without a fraction.
pub(crate) fn number_literal(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

// ------------------------------- Tests ------------------------------------ //
