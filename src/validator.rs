//! Runtime validators.
//!
//! A [`Validator`] is a small tree mirroring the IR kinds, plus modifiers
//! (optional, checks, refinements, default, description). It can be built
//! by hand with the constructors below or produced by [`crate::compile`];
//! either way it stays introspectable, which is what [`crate::introspect`]
//! relies on.
//!
//! Validation never fails fast: every issue in the payload is collected with
//! its path, objects in declared field order and arrays in index order.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use fancy_regex::Regex;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FieldPath, Issue, PathSegment, ValidationError};
use crate::ir::number_literal;

pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// What an object validator does with keys it has no field for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeys {
    /// keep them in the output untouched
    #[default]
    Passthrough,
    /// accept, but drop from the output
    Strip,
    /// reject with an issue per key
    Reject,
}

#[derive(Debug, Clone)]
pub enum Kind {
    Any,
    String,
    Number { coerce: bool },
    Boolean,
    Date { coerce: bool },
    Enum(Vec<String>),
    Array(Box<Validator>),
    Object { fields: IndexMap<String, Validator>, unknown_keys: UnknownKeys },
    Union(Box<Validator>, Box<Validator>),
}

#[derive(Debug, Clone)]
pub enum Check {
    Min(f64),
    Max(f64),
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    /// a pattern that failed to compile; rejects every string
    UnusablePattern(String),
}

#[derive(Clone)]
pub struct Refinement {
    name: String,
    predicate: Predicate,
}

impl Refinement {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refinement").field("name", &self.name).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    kind: Kind,
    optional: bool,
    checks: Vec<Check>,
    refinements: Vec<Refinement>,
    default: Option<Value>,
    description: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

impl Validator {
    fn of(kind: Kind) -> Self {
        Self {
            kind,
            optional: false,
            checks: Vec::new(),
            refinements: Vec::new(),
            default: None,
            description: None,
        }
    }

    pub fn any() -> Self {
        Self::of(Kind::Any)
    }
    pub fn string() -> Self {
        Self::of(Kind::String)
    }
    pub fn number() -> Self {
        Self::of(Kind::Number { coerce: false })
    }
    /// Also accepts numeric-looking strings.
    pub fn coerced_number() -> Self {
        Self::of(Kind::Number { coerce: true })
    }
    pub fn boolean() -> Self {
        Self::of(Kind::Boolean)
    }
    /// RFC 3339 strings only.
    pub fn date() -> Self {
        Self::of(Kind::Date { coerce: false })
    }
    /// RFC 3339, plain dates, naive date-times and epoch milliseconds.
    pub fn coerced_date() -> Self {
        Self::of(Kind::Date { coerce: true })
    }
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::of(Kind::Enum(values.into_iter().map(Into::into).collect()))
    }
    pub fn array(item: Validator) -> Self {
        Self::of(Kind::Array(Box::new(item)))
    }
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Validator)>,
        K: Into<String>,
    {
        Self::of(Kind::Object {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            unknown_keys: UnknownKeys::default(),
        })
    }
    pub fn union(first: Validator, second: Validator) -> Self {
        Self::of(Kind::Union(Box::new(first), Box::new(second)))
    }

    // -------------------------------- Modifiers ------------------------------ //

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
    #[must_use]
    pub fn min(self, min: f64) -> Self {
        self.check(Check::Min(min))
    }
    #[must_use]
    pub fn max(self, max: f64) -> Self {
        self.check(Check::Max(max))
    }
    #[must_use]
    pub fn min_length(self, len: usize) -> Self {
        self.check(Check::MinLength(len))
    }
    #[must_use]
    pub fn max_length(self, len: usize) -> Self {
        self.check(Check::MaxLength(len))
    }
    #[must_use]
    pub fn pattern(self, rx: Regex) -> Self {
        self.check(Check::Pattern(rx))
    }
    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }
    #[must_use]
    pub fn refine(mut self, name: impl Into<String>, predicate: Predicate) -> Self {
        self.refinements.push(Refinement { name: name.into(), predicate });
        self
    }
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
    /// No-op on anything but objects.
    #[must_use]
    pub fn unknown_keys(mut self, policy: UnknownKeys) -> Self {
        if let Kind::Object { unknown_keys, .. } = &mut self.kind {
            *unknown_keys = policy;
        }
        self
    }

    // ------------------------------- Accessors ------------------------------- //

    pub fn kind(&self) -> &Kind {
        &self.kind
    }
    pub fn is_optional(&self) -> bool {
        self.optional
    }
    /// A missing value passes: optional, or a default fills it in.
    pub fn accepts_missing(&self) -> bool {
        self.optional || self.default.is_some()
    }
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }
    pub fn refinements(&self) -> &[Refinement] {
        &self.refinements
    }
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

impl Validator {
    /// Validate a present value, returning the coerced/defaulted copy.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        match self.validate_optional(Some(value))? {
            Some(out) => Ok(out),
            None => Err(ValidationError::single(FieldPath::root(), "required")),
        }
    }

    /// Like [`Validator::validate`] but `None` stands for a missing value.
    pub fn validate_optional(&self, value: Option<&Value>) -> Result<Option<Value>, ValidationError> {
        let mut path = FieldPath::root();
        let mut issues = Vec::new();
        let out = self.run(value, &mut path, &mut issues);
        if issues.is_empty() { Ok(out) } else { Err(ValidationError::new(issues)) }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    /// `Some(out)` on success, `None` when absent-and-allowed or when issues were pushed.
    fn run(&self, value: Option<&Value>, path: &mut FieldPath, issues: &mut Vec<Issue>) -> Option<Value> {
        match value {
            Some(value) => self.run_present(value, path, issues),
            None => {
                if let Some(default) = &self.default {
                    return self.run_present(default, path, issues);
                }
                if !self.optional {
                    issues.push(Issue::new(path.clone(), "required"));
                }
                None
            }
        }
    }

    fn run_present(&self, value: &Value, path: &mut FieldPath, issues: &mut Vec<Issue>) -> Option<Value> {
        let before = issues.len();
        let parsed = self.parse_kind(value, path, issues)?;
        for check in &self.checks {
            check.apply(&parsed, path, issues);
        }
        if issues.len() == before {
            for refinement in &self.refinements {
                if !(refinement.predicate)(&parsed) {
                    issues.push(Issue::new(
                        path.clone(),
                        format!("failed custom check `{}`", refinement.name),
                    ));
                }
            }
        }
        (issues.len() == before).then_some(parsed)
    }

    fn parse_kind(&self, value: &Value, path: &mut FieldPath, issues: &mut Vec<Issue>) -> Option<Value> {
        match &self.kind {
            Kind::Any => Some(value.clone()),
            Kind::String => match value {
                Value::String(_) => Some(value.clone()),
                other => mismatch(path, issues, "string", other),
            },
            Kind::Number { coerce } => match coerce_number(value, *coerce) {
                Some(n) => Some(n),
                None => mismatch(path, issues, "number", value),
            },
            Kind::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                other => mismatch(path, issues, "boolean", other),
            },
            Kind::Date { coerce } => match parse_date(value, *coerce) {
                Some(at) => Some(Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
                None => mismatch(path, issues, "date", value),
            },
            Kind::Enum(members) => {
                let Value::String(s) = value else {
                    return mismatch(path, issues, "string", value);
                };
                if members.iter().any(|m| m == s) {
                    Some(value.clone())
                } else {
                    let expected = members.iter().map(|m| format!("'{m}'")).collect::<Vec<_>>().join(", ");
                    issues.push(Issue::new(path.clone(), format!("expected one of {expected}, received '{s}'")));
                    None
                }
            }
            Kind::Array(item) => {
                let Value::Array(xs) = value else {
                    return mismatch(path, issues, "array", value);
                };
                let mut out = Vec::with_capacity(xs.len());
                let mut ok = true;
                for (i, x) in xs.iter().enumerate() {
                    path.push(PathSegment::Index(i));
                    match item.run(Some(x), path, issues) {
                        Some(v) => out.push(v),
                        None => ok = false,
                    }
                    path.pop();
                }
                ok.then_some(Value::Array(out))
            }
            Kind::Object { fields, unknown_keys } => {
                let Value::Object(map) = value else {
                    return mismatch(path, issues, "object", value);
                };
                let mut out = Map::new();
                let mut ok = true;
                for (key, field) in fields {
                    path.push(PathSegment::Key(key.clone()));
                    let before = issues.len();
                    match field.run(map.get(key), path, issues) {
                        Some(v) => {
                            out.insert(key.clone(), v);
                        }
                        None => ok &= issues.len() == before,
                    }
                    path.pop();
                }
                for (key, v) in map {
                    if fields.contains_key(key) {
                        continue;
                    }
                    match unknown_keys {
                        UnknownKeys::Passthrough => {
                            out.insert(key.clone(), v.clone());
                        }
                        UnknownKeys::Strip => {}
                        UnknownKeys::Reject => {
                            issues.push(Issue::new(path.clone().key(key.clone()), "unrecognized key"));
                            ok = false;
                        }
                    }
                }
                ok.then_some(Value::Object(out))
            }
            Kind::Union(first, second) => {
                // issues from a losing alternative are not reported
                let mut scratch = Vec::new();
                if let Some(v) = first.run(Some(value), path, &mut scratch) {
                    return Some(v);
                }
                scratch.clear();
                if let Some(v) = second.run(Some(value), path, &mut scratch) {
                    return Some(v);
                }
                issues.push(Issue::new(path.clone(), "value did not match either union alternative"));
                None
            }
        }
    }
}

impl Check {
    fn apply(&self, value: &Value, path: &FieldPath, issues: &mut Vec<Issue>) {
        let failure = match self {
            Check::Min(min) => value
                .as_f64()
                .filter(|n| n < min)
                .map(|_| format!("must be greater than or equal to {min}")),
            Check::Max(max) => value
                .as_f64()
                .filter(|n| n > max)
                .map(|_| format!("must be less than or equal to {max}")),
            Check::MinLength(len) => value
                .as_str()
                .filter(|s| s.chars().count() < *len)
                .map(|_| format!("must contain at least {len} character(s)")),
            Check::MaxLength(len) => value
                .as_str()
                .filter(|s| s.chars().count() > *len)
                .map(|_| format!("must contain at most {len} character(s)")),
            // a match that aborts (backtrack limit) counts as a mismatch
            Check::Pattern(rx) => value
                .as_str()
                .filter(|s| !rx.is_match(s).unwrap_or(false))
                .map(|_| format!("does not match pattern /{}/", rx.as_str())),
            Check::UnusablePattern(source) => value
                .as_str()
                .map(|_| format!("pattern /{source}/ could not be compiled")),
        };
        if let Some(message) = failure {
            issues.push(Issue::new(path.clone(), message));
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn mismatch(path: &FieldPath, issues: &mut Vec<Issue>, expected: &str, received: &Value) -> Option<Value> {
    issues.push(Issue::new(
        path.clone(),
        format!("expected {expected}, received {}", json_type_name(received)),
    ));
    None
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn coerce_number(value: &Value, coerce: bool) -> Option<Value> {
    match value {
        Value::Number(n) if n.as_f64().is_some_and(f64::is_finite) => Some(value.clone()),
        Value::String(s) if coerce => {
            let n: f64 = s.trim().parse().ok()?;
            n.is_finite().then(|| number_literal(n))
        }
        _ => None,
    }
}

fn parse_date(value: &Value, coerce: bool) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(at) = DateTime::parse_from_rfc3339(s) {
                return Some(at.with_timezone(&Utc));
            }
            if !coerce {
                return None;
            }
            if let Ok(at) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(at.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|at| at.and_utc())
        }
        Value::Number(n) if coerce => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(err: &ValidationError) -> Vec<String> {
        err.issues().iter().map(|i| i.path.to_string()).collect()
    }

    #[test]
    fn strings_and_booleans_are_strict() {
        assert!(Validator::string().accepts(&json!("x")));
        assert!(!Validator::string().accepts(&json!(1)));
        assert!(Validator::boolean().accepts(&json!(false)));
        assert!(!Validator::boolean().accepts(&json!("true")));
    }

    #[test]
    fn number_coercion_is_opt_in() {
        assert!(!Validator::number().accepts(&json!("12")));
        assert_eq!(Validator::coerced_number().validate(&json!(" 12 ")).unwrap(), json!(12));
        assert_eq!(Validator::coerced_number().validate(&json!("2.5")).unwrap(), json!(2.5));
        assert!(!Validator::coerced_number().accepts(&json!("abc")));
        assert!(!Validator::coerced_number().accepts(&json!("")));
        assert!(!Validator::coerced_number().accepts(&json!("NaN")));
        assert!(!Validator::coerced_number().accepts(&json!(true)));
    }

    #[test]
    fn dates_normalize_to_rfc3339() {
        let strict = Validator::date();
        assert_eq!(
            strict.validate(&json!("2024-03-01T10:00:00+02:00")).unwrap(),
            json!("2024-03-01T08:00:00Z")
        );
        assert!(!strict.accepts(&json!("2024-03-01")));

        let loose = Validator::coerced_date();
        assert_eq!(loose.validate(&json!("2024-03-01")).unwrap(), json!("2024-03-01T00:00:00Z"));
        assert_eq!(loose.validate(&json!("2024-03-01T12:30:00")).unwrap(), json!("2024-03-01T12:30:00Z"));
        assert_eq!(loose.validate(&json!(0)).unwrap(), json!("1970-01-01T00:00:00Z"));
        assert!(!loose.accepts(&json!("yesterday")));
    }

    #[test]
    fn bounds_and_patterns() {
        let n = Validator::number().min(0.0).max(10.0);
        assert!(n.accepts(&json!(0)) && n.accepts(&json!(10)));
        let err = n.validate(&json!(11)).unwrap_err();
        assert_eq!(err.issues()[0].message, "must be less than or equal to 10");

        let s = Validator::string().min_length(2).max_length(3).pattern(Regex::new("^[a-z]+$").unwrap());
        assert!(s.accepts(&json!("abc")));
        assert!(!s.accepts(&json!("a")));
        assert!(!s.accepts(&json!("abcd")));
        let err = s.validate(&json!("AB")).unwrap_err();
        assert_eq!(err.issues()[0].message, "does not match pattern /^[a-z]+$/");
    }

    #[test]
    fn patterns_support_lookaround() {
        let password = Validator::string().pattern(Regex::new(r"^(?=.*\d).{8,}$").unwrap());
        assert!(password.accepts(&json!("hunter22")));
        assert!(!password.accepts(&json!("hunterxx")));
        assert!(!password.accepts(&json!("x")));
    }

    #[test]
    fn unusable_patterns_reject_every_string() {
        let v = Validator::string().check(Check::UnusablePattern("([".into()));
        let err = v.validate(&json!("anything")).unwrap_err();
        assert_eq!(err.issues()[0].message, "pattern /([/ could not be compiled");
        assert!(!v.accepts(&json!(1)));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let s = Validator::string().max_length(3);
        assert!(s.accepts(&json!("αβγ")));
    }

    #[test]
    fn enum_membership() {
        let e = Validator::enumeration(["red", "green"]);
        assert!(e.accepts(&json!("red")));
        let err = e.validate(&json!("blue")).unwrap_err();
        assert_eq!(err.issues()[0].message, "expected one of 'red', 'green', received 'blue'");
        assert!(!e.accepts(&json!(1)));
    }

    #[test]
    fn collects_every_issue_with_paths() {
        let v = Validator::object([
            ("name", Validator::string()),
            ("tags", Validator::array(Validator::string())),
            ("age", Validator::number()),
        ]);
        let err = v.validate(&json!({"tags": ["a", 2, "c", false], "age": "x"})).unwrap_err();
        assert_eq!(paths(&err), ["name", "tags[1]", "tags[3]", "age"]);
    }

    #[test]
    fn optional_and_default() {
        let v = Validator::object([
            ("nick", Validator::string().optional()),
            ("lang", Validator::string().with_default(json!("en"))),
        ]);
        assert_eq!(v.validate(&json!({})).unwrap(), json!({"lang": "en"}));
        // null is a value, not a missing key
        assert!(!v.accepts(&json!({"nick": null})));
        assert_eq!(
            Validator::string().optional().validate_optional(None).unwrap(),
            None
        );
        assert!(Validator::string().validate_optional(None).is_err());
    }

    #[test]
    fn unknown_key_policies() {
        let base = || Validator::object([("a", Validator::number())]);
        let input = json!({"a": 1, "extra": true});
        assert_eq!(base().validate(&input).unwrap(), input);
        assert_eq!(base().unknown_keys(UnknownKeys::Strip).validate(&input).unwrap(), json!({"a": 1}));
        let err = base().unknown_keys(UnknownKeys::Reject).validate(&input).unwrap_err();
        assert_eq!(paths(&err), ["extra"]);
    }

    #[test]
    fn union_tries_both_alternatives() {
        let v = Validator::union(Validator::number(), Validator::string().min_length(2));
        assert!(v.accepts(&json!(3)));
        assert!(v.accepts(&json!("ok")));
        let err = v.validate(&json!("x")).unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert_eq!(err.issues()[0].message, "value did not match either union alternative");
    }

    #[test]
    fn refinements_run_after_structural_checks() {
        let even: Predicate = Arc::new(|v: &Value| v.as_i64().is_some_and(|n| n % 2 == 0));
        let v = Validator::coerced_number().min(0.0).refine("even", even);
        assert!(v.accepts(&json!("4")));
        let err = v.validate(&json!(3)).unwrap_err();
        assert_eq!(err.issues()[0].message, "failed custom check `even`");
        // a failed bound short-circuits the predicate
        let err = v.validate(&json!(-3)).unwrap_err();
        assert_eq!(err.issues().len(), 1);
    }

    #[test]
    fn validators_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Validator>();
    }
}
