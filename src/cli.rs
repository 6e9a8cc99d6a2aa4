//! CLI: schema file → (code | json schema | validation report | reconstructed IR)
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use toolshape::config::Shape;
use toolshape::path_de::{SchemaDocument, load_document};
use toolshape::{
    CallableTool, CoercionPolicy, Codegen, CompileOptions, Compiler, SchemaField, UnknownKeys, function_definition,
    introspect, json_schema,
};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile tool schemas into validators, zod source, or JSON Schema
#[derive(Parser, Debug)]
#[command(name = "toolshape", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// emit zod-style source for a schema
    Codegen(CodegenOut),
    /// emit a JSON Schema function definition for a schema
    JsonSchema(JsonSchemaOut),
    /// validate argument documents against a schema
    Validate(ValidateCmd),
    /// load and compile many schema files
    Check(CheckCmd),
    /// compile, then introspect back into IR
    Roundtrip(RoundtripOut),
}

#[derive(Args, Debug, Clone)]
struct CompileSettings {
    /// coercion of numeric/date strings (overrides TOOLSHAPE_COERCE)
    #[arg(long, value_enum)]
    coerce: Option<CoercionPolicy>,

    /// what objects do with undeclared keys (overrides TOOLSHAPE_UNKNOWN_KEYS)
    #[arg(long, value_enum)]
    unknown_keys: Option<UnknownKeys>,

    /// fail on malformed schemas instead of degrading them
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[derive(clap::Parser, Debug)]
struct CodegenOut {
    /// schema file: IR node, flat parameter map, or tool record
    #[arg(long, short)]
    schema: PathBuf,

    /// emit z.number()/z.date() instead of the coercing forms
    #[arg(long, default_value_t = false)]
    no_coerce: bool,

    /// coercion policy the emitted numbers/dates follow (overrides TOOLSHAPE_COERCE)
    #[arg(long, value_enum, conflicts_with = "no_coerce")]
    coerce: Option<CoercionPolicy>,

    /// `reject` marks declared objects .strict() (overrides TOOLSHAPE_UNKNOWN_KEYS)
    #[arg(long, value_enum)]
    unknown_keys: Option<UnknownKeys>,

    /// output .ts file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct JsonSchemaOut {
    #[arg(long, short)]
    schema: PathBuf,

    /// function name (defaults to the tool or root field name)
    #[arg(long)]
    name: Option<String>,

    /// function description (defaults to the tool or root field description)
    #[arg(long)]
    description: Option<String>,

    /// print only the parameters schema, without the function wrapper
    #[arg(long, default_value_t = false)]
    bare: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ValidateCmd {
    #[arg(long, short)]
    schema: PathBuf,

    /// JSON Pointer to select the arguments in each document (e.g. /tool_calls/0/arguments)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more argument documents. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    #[command(flatten)]
    compile_settings: CompileSettings,
}

#[derive(clap::Parser, Debug)]
struct CheckCmd {
    /// One or more schema files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    #[command(flatten)]
    compile_settings: CompileSettings,
}

#[derive(clap::Parser, Debug)]
struct RoundtripOut {
    #[arg(long, short)]
    schema: PathBuf,

    #[command(flatten)]
    compile_settings: CompileSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CompileSettings {
    fn compiler(&self) -> Result<Compiler> {
        let mut options = CompileOptions::from_env().context("invalid compile settings in environment")?;
        if let Some(coercion) = self.coerce {
            options.coercion = coercion;
        }
        if let Some(unknown_keys) = self.unknown_keys {
            options.unknown_keys = unknown_keys;
        }
        if self.strict {
            options.strict = true;
        }
        Ok(Compiler::new(options))
    }
}

impl CodegenOut {
    fn codegen(&self, shape: Shape) -> Result<Codegen> {
        let options = CompileOptions::from_env().context("invalid compile settings in environment")?;
        let policy = self.coerce.unwrap_or(options.coercion);
        Ok(Codegen::new()
            .with_coercion(!self.no_coerce && policy.resolve(shape))
            .with_unknown_keys(self.unknown_keys.unwrap_or(options.unknown_keys)))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Codegen(target) => {
                let document = read_document(&target.schema)?;
                let field = declared_field(&document);
                let mut codegen = target.codegen(document.parameters().shape())?;
                codegen.emit(&field);
                write_output(target.out.as_deref(), &codegen.into_string())?;
            }
            Command::JsonSchema(target) => {
                let document = read_document(&target.schema)?;
                let field = declared_field(&document);
                let schema = if target.bare {
                    json_schema(&field)
                } else {
                    let name = target.name.clone().unwrap_or_else(|| field.name.clone());
                    let description = target
                        .description
                        .clone()
                        .unwrap_or_else(|| default_description(&document, &field));
                    function_definition(&name, &description, &field)
                };
                write_output(target.out.as_deref(), &to_pretty(&schema)?)?;
            }
            Command::Validate(target) => {
                let compiler = target.compile_settings.compiler()?;
                let tool = load_tool(&compiler, &target.schema)?;
                let mut rejected = 0usize;
                for source_path in resolve_file_path_patterns(&target.input)? {
                    let label = source_path.to_string_lossy().to_string();
                    let args = read_arguments(&source_path, target.json_pointer.as_deref())?;
                    match tool.validate(&args) {
                        Ok(_) => println!("{} {label}", "✅".green()),
                        Err(error) => {
                            rejected += 1;
                            println!("{} {label}", "❌".red());
                            for issue in error.issues() {
                                let at = format!("{}:", issue.path);
                                println!("    {} {}", at.as_str().yellow(), issue.message);
                            }
                        }
                    }
                }
                if rejected > 0 {
                    eprintln!("{} document(s) rejected by `{}`", rejected, tool.name());
                    return Ok(ExitCode::FAILURE);
                }
            }
            Command::Check(target) => {
                let compiler = target.compile_settings.compiler()?;
                let source_paths = resolve_file_path_patterns(&target.input)?;
                let results: Vec<(PathBuf, Result<CallableTool>)> = source_paths
                    .into_par_iter()
                    .map(|path| {
                        let result = load_tool(&compiler, &path);
                        (path, result)
                    })
                    .collect();
                let mut failed = 0usize;
                for (path, result) in &results {
                    let label = path.to_string_lossy();
                    match result {
                        Ok(tool) => println!("{} {label} ({})", "✅".green(), tool.name()),
                        Err(error) => {
                            failed += 1;
                            println!("{} {label}: {error:#}", "❌".red());
                        }
                    }
                }
                if failed > 0 {
                    eprintln!("{failed} of {} schema file(s) failed", results.len());
                    return Ok(ExitCode::FAILURE);
                }
            }
            Command::Roundtrip(target) => {
                let compiler = target.compile_settings.compiler()?;
                let tool = load_tool(&compiler, &target.schema)?;
                let field = introspect(tool.validator(), Some(&tool.schema().name));
                write_output(target.out.as_deref(), &to_pretty(&field)?)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_document(path: &Path) -> Result<SchemaDocument> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema file {}", path.display()))?;
    load_document(&source).with_context(|| format!("failed to load schema file {}", path.display()))
}

/// The schema's IR, declared under the tool name when the file is a record.
fn declared_field(document: &SchemaDocument) -> SchemaField {
    let mut field = document.parameters().schema_field().into_owned();
    if let SchemaDocument::Record(record) = document {
        field.name = record.name.clone();
    }
    field
}

fn default_description(document: &SchemaDocument, field: &SchemaField) -> String {
    match document {
        SchemaDocument::Record(record) => record.description.clone(),
        SchemaDocument::Params(_) => field.description.clone().unwrap_or_default(),
    }
}

fn load_tool(compiler: &Compiler, path: &Path) -> Result<CallableTool> {
    let document = read_document(path)?;
    let tool = match &document {
        SchemaDocument::Record(record) => record.to_callable_tool(compiler)?,
        SchemaDocument::Params(params) => {
            let name = params.schema_field().name.clone();
            let description = params.schema_field().description.clone().unwrap_or_default();
            compiler.to_callable_tool(name, description, params)?
        }
    };
    Ok(tool)
}

fn read_arguments(path: &Path, json_pointer: Option<&str>) -> Result<Value> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("failed to read arguments file {}", path.display()))?;
    let value = serde_json::from_str::<Value>(&source)
        .with_context(|| format!("failed to parse JSON arguments file {}", path.display()))?;
    match json_pointer {
        None => Ok(value),
        Some(pointer) => value
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {}", path.display())),
    }
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize output")
}

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{contents}");
        return Ok(());
    };
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //
