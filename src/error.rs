//! Error types shared by the compiler, the validators and the tool adapter.

use std::fmt;

use thiserror::Error;

// ————————————————————————————————————————————————————————————————————————————
// FIELD PATHS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a value inside a nested object/array payload.
///
/// Renders as `user.tags[2].label`, or `(root)` for the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }
    pub fn pop(&mut self) {
        self.0.pop();
    }
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathSegment::Key(key.into()));
        self
    }
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(root)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION FAILURES
// ————————————————————————————————————————————————————————————————————————————

/// One rejected value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: FieldPath,
    pub message: String,
}

impl Issue {
    pub fn new(path: FieldPath, message: impl Into<String>) -> Self {
        Self { path, message: message.into() }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A runtime value was rejected by a validator. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    issues: Vec<Issue>,
}

impl ValidationError {
    pub fn new(issues: Vec<Issue>) -> Self {
        debug_assert!(!issues.is_empty());
        Self { issues }
    }
    pub fn single(path: FieldPath, message: impl Into<String>) -> Self {
        Self { issues: vec![Issue::new(path, message)] }
    }
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
    /// True if some issue sits exactly at `path`.
    pub fn has_issue_at(&self, path: &FieldPath) -> bool {
        self.issues.iter().any(|issue| &issue.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA & TOOL FAILURES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("malformed schema at {path}: {reason}")]
    MalformedIr { path: FieldPath, reason: String },

    #[error("custom check `{name}` at {path} is not a registered predicate")]
    UnknownPredicate { name: String, path: FieldPath },

    #[error("failed to decode schema document at {path}: {message}")]
    Decode { path: String, message: String },

    #[error("tool record `{name}` is invalid: {source}")]
    InvalidRecord {
        name: String,
        #[source]
        source: ValidationError,
    },
}

/// Why a model-proposed tool call could not be fulfilled.
#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("unknown tool `{name}`")]
    UnknownTool { name: String },

    #[error("invalid arguments for tool `{tool}`: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: ValidationError,
    },

    #[error("tool `{tool}` failed: {message}")]
    Execution { tool: String, message: String },
}

impl ToolCallError {
    /// Text surfaced to the model-facing layer.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "The model tried to call an unknown tool.",
            Self::InvalidArguments { .. } => "The model called a tool with invalid arguments.",
            Self::Execution { .. } => "An error occurred during tool execution.",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}")]
    InvalidValue { var: &'static str, value: String },
}

// ------------------------------- Tests ------------------------------------ //
