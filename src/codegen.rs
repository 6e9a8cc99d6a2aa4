//! IR → zod-flavoured TypeScript source.
//!
//! Pure formatting: the same tree always yields byte-identical text. The
//! per-kind switch mirrors [`crate::compile`], and modifiers chain in the same
//! fixed order (optional, min, max, regex, refine, default, describe).

use std::fmt::Write as _;

use serde_json::Value;

use crate::ir::{SchemaField, SchemaKind};
use crate::validator::UnknownKeys;

const INDENT: &str = "  ";

#[derive(Debug, Clone)]
pub struct Codegen {
    out: String,
    coerce: bool,
    unknown_keys: UnknownKeys,
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

impl Codegen {
    pub fn new() -> Self {
        Self { out: String::new(), coerce: true, unknown_keys: UnknownKeys::default() }
    }

    /// Emit `z.number()` / `z.date()` instead of the coercing variants.
    pub fn without_coercion() -> Self {
        Self::new().with_coercion(false)
    }

    #[must_use]
    pub fn with_coercion(mut self, coerce: bool) -> Self {
        self.coerce = coerce;
        self
    }

    /// `Reject` marks objects with declared fields `.strict()`.
    #[must_use]
    pub fn with_unknown_keys(mut self, policy: UnknownKeys) -> Self {
        self.unknown_keys = policy;
        self
    }

    /// Append a full module (import, declaration, export) for `root`.
    pub fn emit(&mut self, root: &SchemaField) {
        let ident = identifier(&root.name);
        let expr = self.expression(root);
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        let _ = write!(
            self.out,
            "import {{ z }} from 'zod';\n\nconst {ident}Schema = {expr};\n\nexport default {ident}Schema;\n"
        );
    }

    /// The bare validator expression for `field`.
    pub fn expression(&self, field: &SchemaField) -> String {
        let mut out = String::new();
        self.node(field, 0, &mut out);
        out
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn node(&self, field: &SchemaField, depth: usize, out: &mut String) {
        self.base(field, depth, out);
        self.modifiers(field, out);
    }

    fn base(&self, field: &SchemaField, depth: usize, out: &mut String) {
        match field.kind {
            SchemaKind::String => out.push_str("z.string()"),
            SchemaKind::Number if self.coerce => out.push_str("z.coerce.number()"),
            SchemaKind::Number => out.push_str("z.number()"),
            SchemaKind::Boolean => out.push_str("z.boolean()"),
            SchemaKind::Date if self.coerce => out.push_str("z.coerce.date()"),
            SchemaKind::Date => out.push_str("z.date()"),
            SchemaKind::Enum => match field.enum_literals() {
                Some(literals) => {
                    let quoted: Vec<String> = literals.iter().map(|s| single_quoted(s)).collect();
                    let _ = write!(out, "z.enum([{}])", quoted.join(", "));
                }
                None => out.push_str("z.string()"),
            },
            SchemaKind::Object => match field.children.as_deref() {
                None => out.push_str("z.record(z.any())"),
                Some([]) => {
                    out.push_str("z.object({})");
                    self.strictness(out);
                }
                Some(children) => {
                    let inner = INDENT.repeat(depth + 1);
                    out.push_str("z.object({\n");
                    for (i, child) in children.iter().enumerate() {
                        if i > 0 {
                            out.push_str(",\n");
                        }
                        let _ = write!(out, "{inner}{}: ", object_key(&child.name));
                        self.node(child, depth + 1, out);
                    }
                    let _ = write!(out, "\n{}}})", INDENT.repeat(depth));
                    self.strictness(out);
                }
            },
            SchemaKind::Array => {
                out.push_str("z.array(");
                match field.children.as_deref().and_then(<[SchemaField]>::first) {
                    Some(item) => self.node(item, depth, out),
                    None => out.push_str("z.any()"),
                }
                out.push(')');
            }
            SchemaKind::Union => match field.children.as_deref() {
                Some([first, second, ..]) => {
                    out.push_str("z.union([");
                    self.node(first, depth, out);
                    out.push_str(", ");
                    self.node(second, depth, out);
                    out.push_str("])");
                }
                _ => out.push_str("z.any()"),
            },
            SchemaKind::Calculated => match &field.calculated_field {
                Some(calc) => {
                    let _ = write!(
                        out,
                        "z.function().implement(({}) => {})",
                        calc.dependencies.join(", "),
                        calc.formula
                    );
                }
                None => out.push_str("z.any()"),
            },
            SchemaKind::File | SchemaKind::Unsupported => out.push_str("z.any()"),
        }
    }

    fn strictness(&self, out: &mut String) {
        if self.unknown_keys == UnknownKeys::Reject {
            out.push_str(".strict()");
        }
    }

    fn modifiers(&self, field: &SchemaField, out: &mut String) {
        if let Some(rules) = &field.validations {
            if !rules.is_required() {
                out.push_str(".optional()");
            }
            match field.kind {
                SchemaKind::Number => {
                    if let Some(min) = rules.min {
                        let _ = write!(out, ".min({min})");
                    }
                    if let Some(max) = rules.max {
                        let _ = write!(out, ".max({max})");
                    }
                }
                SchemaKind::String => {
                    if let Some(len) = rules.min_length {
                        let _ = write!(out, ".min({len})");
                    }
                    if let Some(len) = rules.max_length {
                        let _ = write!(out, ".max({len})");
                    }
                    if let Some(source) = rules.regex_source() {
                        let _ = write!(out, ".regex(/{}/)", regex_literal_body(source));
                    }
                }
                _ => {}
            }
            if let Some(name) = rules.custom_name() {
                let _ = write!(out, ".refine({name})");
            }
            if let Some(default) = &rules.default {
                let _ = write!(out, ".default({default})");
            }
        }
        if let Some(text) = &field.description {
            let _ = write!(out, ".describe({})", Value::String(text.clone()));
        }
    }
}

/// Render `root` as a standalone module using the coercing number/date forms.
pub fn generate(root: &SchemaField) -> String {
    let mut codegen = Codegen::new();
    codegen.emit(root);
    codegen.into_string()
}

// ————————————————————————————————————————————————————————————————————————————
// TEXT HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Declaration name for a root field; `root` when nothing usable is left.
pub fn identifier(name: &str) -> String {
    let mut ident: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if ident.chars().all(|c| c == '_') {
        return "root".to_string();
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn object_key(name: &str) -> String {
    if is_identifier(name) { name.to_string() } else { Value::String(name.to_string()).to_string() }
}

fn single_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Escape bare `/` so the source survives inside a `/…/` literal.
fn regex_literal_body(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut escaped = false;
    for c in source.chars() {
        if c == '/' && !escaped {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out
}

// ------------------------------- Tests ------------------------------------ //
