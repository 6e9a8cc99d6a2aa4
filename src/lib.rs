//! Schema IR for LLM tool definitions, compiled three ways: into runtime
//! validators, into zod-style source text, and back from a validator into IR.

pub mod codegen;
pub mod compile;
pub mod config;
pub mod error;
pub mod flat;
pub mod introspect;
pub mod ir;
pub mod json_schema;
pub mod path_de;
pub mod predicate;
pub mod tool;
pub mod validator;

pub use codegen::{Codegen, generate};
pub use compile::{Compiler, compile};
pub use config::{CoercionPolicy, CompileOptions};
pub use error::{ConfigError, FieldPath, Issue, SchemaError, ToolCallError, ValidationError};
pub use flat::{ParameterValidation, ToolParameter, ToolParameters};
pub use introspect::introspect;
pub use ir::{CalculatedField, SchemaField, SchemaKind, Validations};
pub use json_schema::{function_definition, json_schema};
pub use predicate::PredicateRegistry;
pub use tool::{CallableTool, ToolParams, ToolRecord, ToolSet, to_callable_tool};
pub use validator::{Predicate, UnknownKeys, Validator};
