//! The bridge handed to the LLM integration layer.
//!
//! A [`CallableTool`] is a name, a description and a compiled validator. The
//! integration layer must run [`CallableTool::validate`] on every argument
//! payload before treating a call as fulfilled; [`ToolSet::dispatch`] does
//! exactly that and sorts failures into the three [`ToolCallError`] categories.

use std::borrow::Cow;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::compile::Compiler;
use crate::config::Shape;
use crate::error::{FieldPath, Issue, SchemaError, ToolCallError, ValidationError};
use crate::flat::ToolParameters;
use crate::ir::SchemaField;
use crate::json_schema::function_definition;
use crate::validator::Validator;

static TOOL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("tool name pattern is a valid regex"));

// ————————————————————————————————————————————————————————————————————————————
// PARAMETERS
// ————————————————————————————————————————————————————————————————————————————

/// Tool parameters in either accepted shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolParams {
    Flat(ToolParameters),
    Field(SchemaField),
}

impl ToolParams {
    /// An object carrying `properties` is the flat shape; anything else is an IR node.
    pub fn is_flat_document(value: &Value) -> bool {
        value.as_object().is_some_and(|map| map.contains_key("properties"))
    }

    /// Decode from JSON, resolving IR default literals on the way in.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if Self::is_flat_document(&value) {
            serde_json::from_value(value).map(Self::Flat)
        } else {
            let mut field: SchemaField = serde_json::from_value(value)?;
            field.resolve_defaults();
            Ok(Self::Field(field))
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::Flat(_) => Shape::Flat,
            Self::Field(_) => Shape::Field,
        }
    }

    /// The single IR tree both shapes converge on.
    pub fn schema_field(&self) -> Cow<'_, SchemaField> {
        match self {
            Self::Flat(params) => Cow::Owned(params.to_schema_field()),
            Self::Field(field) => Cow::Borrowed(field),
        }
    }
}

impl<'de> Deserialize<'de> for ToolParams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

impl From<ToolParameters> for ToolParams {
    fn from(params: ToolParameters) -> Self {
        Self::Flat(params)
    }
}

impl From<SchemaField> for ToolParams {
    fn from(field: SchemaField) -> Self {
        Self::Field(field)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CALLABLE TOOL
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct CallableTool {
    name: String,
    description: String,
    schema: SchemaField,
    validator: Validator,
}

impl CallableTool {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    /// IR the validator was compiled from (flat parameters already lowered).
    pub fn schema(&self) -> &SchemaField {
        &self.schema
    }
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn validate(&self, args: &Value) -> Result<Value, ValidationError> {
        self.validator.validate(args).inspect_err(|err| {
            debug!(tool = %self.name, issues = err.issues().len(), "rejected tool arguments");
        })
    }

    /// Function-calling declaration for this tool.
    pub fn definition(&self) -> Value {
        function_definition(&self.name, &self.description, &self.schema)
    }
}

impl Compiler {
    pub fn to_callable_tool(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: &ToolParams,
    ) -> Result<CallableTool, SchemaError> {
        let schema = parameters.schema_field().into_owned();
        let validator = self.compile_shaped(&schema, parameters.shape())?;
        Ok(CallableTool { name: name.into(), description: description.into(), schema, validator })
    }
}

/// [`Compiler::to_callable_tool`] with default options.
pub fn to_callable_tool(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: &ToolParams,
) -> Result<CallableTool, SchemaError> {
    Compiler::default().to_callable_tool(name, description, parameters)
}

// ————————————————————————————————————————————————————————————————————————————
// PERSISTED RECORDS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: ToolParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ToolRecord {
    /// Checks a record must pass before it is stored or exposed.
    pub fn check(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        if self.name.trim().is_empty() {
            issues.push(Issue::new(FieldPath::root().key("name"), "Tool name is required"));
        } else if !TOOL_NAME.is_match(&self.name) {
            issues.push(Issue::new(
                FieldPath::root().key("name"),
                "Tool name can only contain letters, numbers, underscores, and hyphens",
            ));
        }
        if self.description.trim().is_empty() {
            issues.push(Issue::new(FieldPath::root().key("description"), "Description is required"));
        }
        if issues.is_empty() { Ok(()) } else { Err(ValidationError::new(issues)) }
    }

    pub fn to_callable_tool(&self, compiler: &Compiler) -> Result<CallableTool, SchemaError> {
        self.check()
            .map_err(|source| SchemaError::InvalidRecord { name: self.name.clone(), source })?;
        compiler.to_callable_tool(self.name.clone(), self.description.clone(), &self.parameters)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TOOL SET
// ————————————————————————————————————————————————————————————————————————————

/// Callable tools by name, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: IndexMap<String, CallableTool>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a, I>(compiler: &Compiler, records: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = &'a ToolRecord>,
    {
        let mut set = Self::new();
        for record in records {
            set.insert(record.to_callable_tool(compiler)?);
        }
        Ok(set)
    }

    /// Returns the tool previously registered under the same name.
    pub fn insert(&mut self, tool: CallableTool) -> Option<CallableTool> {
        self.tools.insert(tool.name.clone(), tool)
    }

    pub fn get(&self, name: &str) -> Option<&CallableTool> {
        self.tools.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<Value> {
        self.tools.values().map(CallableTool::definition).collect()
    }

    pub fn validate_call(&self, name: &str, args: &Value) -> Result<Value, ToolCallError> {
        let tool = self.get(name).ok_or_else(|| ToolCallError::UnknownTool { name: name.to_string() })?;
        tool.validate(args)
            .map_err(|source| ToolCallError::InvalidArguments { tool: name.to_string(), source })
    }

    /// Validate, then hand the cleaned arguments to `execute`.
    pub fn dispatch<F, E>(&self, name: &str, args: &Value, execute: F) -> Result<Value, ToolCallError>
    where
        F: FnOnce(Value) -> Result<Value, E>,
        E: Display,
    {
        let args = self.validate_call(name, args)?;
        execute(args).map_err(|err| ToolCallError::Execution { tool: name.to_string(), message: err.to_string() })
    }
}

// ------------------------------- Tests ------------------------------------ //
