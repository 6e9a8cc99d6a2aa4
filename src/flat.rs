//! Legacy flat parameter maps (`{ type: "object", properties: {...} }`).
//!
//! The flat form is a restricted projection of the IR. It is never compiled on its
//! own: [`ToolParameters::to_schema_field`] lowers it into a [`SchemaField`] tree
//! and the regular compiler takes it from there.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ir::{SchemaField, SchemaKind, Validations};

pub const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
pub const URL_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9+.-]*://\S+$";

/// Name given to the object node a flat map lowers into.
pub const FLAT_ROOT_NAME: &str = "parameters";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectTag {
    #[default]
    Object,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type", default)]
    pub tag: ObjectTag,
    #[serde(default)]
    pub properties: IndexMap<String, ToolParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, ToolParameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ToolParameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ParameterValidation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// LOWERING
// ————————————————————————————————————————————————————————————————————————————

impl ToolParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, parameter: ToolParameter) -> Self {
        self.properties.insert(name.into(), parameter);
        self
    }

    /// Lower into an `object` node whose children are the properties, in map order.
    pub fn to_schema_field(&self) -> SchemaField {
        SchemaField::new(FLAT_ROOT_NAME, SchemaKind::Object).with_children(lower_properties(&self.properties))
    }
}

impl ToolParameter {
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            description: String::new(),
            required: false,
            enum_: None,
            properties: None,
            items: None,
            validation: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn to_schema_field(&self, name: &str) -> SchemaField {
        let rules = self.validation.clone().unwrap_or_default();
        let mut pattern = rules.pattern.filter(|p| !p.is_empty());

        let literals = self.enum_.as_ref().filter(|values| !values.is_empty());
        let kind = match self.ty.as_str() {
            "number" => SchemaKind::Number,
            "boolean" => SchemaKind::Boolean,
            "date" => SchemaKind::Date,
            "array" => SchemaKind::Array,
            "object" => SchemaKind::Object,
            "email" => {
                pattern.get_or_insert_with(|| EMAIL_PATTERN.to_string());
                SchemaKind::String
            }
            "url" => {
                pattern.get_or_insert_with(|| URL_PATTERN.to_string());
                SchemaKind::String
            }
            // "string" and anything unrecognized
            _ => SchemaKind::String,
        };
        let kind = match (kind, literals) {
            (SchemaKind::String, Some(_)) => SchemaKind::Enum,
            (kind, _) => kind,
        };

        let mut field = SchemaField::new(name, kind);
        if !self.description.is_empty() {
            field.description = Some(self.description.clone());
        }
        match kind {
            SchemaKind::Enum => field.enum_values = literals.cloned(),
            SchemaKind::Object => field.children = self.properties.as_ref().map(lower_properties),
            SchemaKind::Array => {
                field.children = self.items.as_ref().map(|item| vec![item.to_schema_field("item")]);
            }
            _ => {}
        }

        let mut validations = Validations {
            required: Some(self.required),
            ..Validations::default()
        };
        match kind {
            SchemaKind::Number => {
                validations.min = rules.min;
                validations.max = rules.max;
            }
            SchemaKind::String => {
                validations.min_length = rules.min_length;
                validations.max_length = rules.max_length;
                validations.regex = pattern;
            }
            _ => {}
        }
        field.validations = Some(validations);
        field
    }
}

fn lower_properties(properties: &IndexMap<String, ToolParameter>) -> Vec<SchemaField> {
    properties
        .iter()
        .map(|(name, parameter)| parameter.to_schema_field(name))
        .collect()
}

// ------------------------------- Tests ------------------------------------ //
