use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SchemaError;
use crate::ir::SchemaField;
use crate::tool::{ToolParams, ToolRecord};

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, SchemaError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(decode_error)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SchemaError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(decode_error)
}

pub fn from_value_with_path<T: DeserializeOwned>(value: Value) -> Result<T, SchemaError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(decode_error)
}

fn decode_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> SchemaError {
    let path = err.path().to_string();
    SchemaError::Decode { path, message: err.into_inner().to_string() }
}

/// An IR node with its default literals resolved.
pub fn load_schema_field(src: &str) -> Result<SchemaField, SchemaError> {
    let mut field: SchemaField = from_str_with_path(src)?;
    field.resolve_defaults();
    Ok(field)
}

/// Something a schema file may hold.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDocument {
    Record(ToolRecord),
    Params(ToolParams),
}

impl SchemaDocument {
    pub fn parameters(&self) -> &ToolParams {
        match self {
            Self::Record(record) => &record.parameters,
            Self::Params(params) => params,
        }
    }

    /// Name to declare the schema under: the record's tool name or the root field name.
    pub fn display_name(&self) -> String {
        match self {
            Self::Record(record) => record.name.clone(),
            Self::Params(params) => params.schema_field().name.clone(),
        }
    }
}

/// Sniff and decode a schema file: a tool record (has `parameters`), a flat
/// parameter map (has `properties`), or an IR node.
pub fn load_document(src: &str) -> Result<SchemaDocument, SchemaError> {
    let value: Value = from_str_with_path(src)?;
    if let Some(parameters) = value.get("parameters") {
        // decode the parameters first so a failure names the inner path
        let parameters = load_params(parameters.clone()).map_err(|err| match err {
            SchemaError::Decode { path, message } => {
                SchemaError::Decode { path: format!("parameters.{path}"), message }
            }
            other => other,
        })?;
        let mut record: ToolRecord = from_value_with_path(value)?;
        record.parameters = parameters;
        return Ok(SchemaDocument::Record(record));
    }
    load_params(value).map(SchemaDocument::Params)
}

fn load_params(value: Value) -> Result<ToolParams, SchemaError> {
    if ToolParams::is_flat_document(&value) {
        from_value_with_path(value).map(ToolParams::Flat)
    } else {
        let mut field: SchemaField = from_value_with_path(value)?;
        field.resolve_defaults();
        Ok(ToolParams::Field(field))
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_name_the_json_path() {
        let err = load_schema_field(r#"{"type": "object", "children": [{"name": "a", "type": "number", "validations": {"min": "low"}}]}"#)
            .unwrap_err();
        match err {
            SchemaError::Decode { path, .. } => assert_eq!(path, "children[0].validations.min"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sniffs_each_document_shape() {
        let record = load_document(r#"{"name": "t", "description": "d", "parameters": {"type": "object", "properties": {}}}"#)
            .unwrap();
        assert!(matches!(record, SchemaDocument::Record(_)));
        assert_eq!(record.display_name(), "t");

        let flat = load_document(r#"{"type": "object", "properties": {"x": {"type": "number"}}}"#).unwrap();
        assert!(matches!(flat.parameters(), ToolParams::Flat(_)));

        let ir = load_document(r#"{"name": "age", "type": "number"}"#).unwrap();
        assert!(matches!(ir.parameters(), ToolParams::Field(_)));
        assert_eq!(ir.display_name(), "age");
    }

    #[test]
    fn loaded_array_defaults_fill_missing_values() {
        let field = load_schema_field(r#"{"name": "ids", "type": "array", "validations": {"default": "[1, 2]"}}"#).unwrap();
        let validator = crate::compile(&field).unwrap();
        assert_eq!(validator.default_value(), Some(&serde_json::json!([1, 2])));
        assert_eq!(validator.validate_optional(None).unwrap(), Some(serde_json::json!([1, 2])));
    }

    #[test]
    fn record_parameter_failures_keep_their_prefix() {
        let err = load_document(r#"{"name": "t", "parameters": {"type": "number", "validations": {"required": "yes"}}}"#)
            .unwrap_err();
        match err {
            SchemaError::Decode { path, .. } => assert_eq!(path, "parameters.validations.required"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
