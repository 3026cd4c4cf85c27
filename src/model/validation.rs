//! Rule-driven field validation: `field => "required|length:3,50|unique"` declarations checked
//! against an input record, first failing rule per field wins.

use crate::db::Database;
use crate::error::DbError;
use crate::record::Record;
use async_trait::async_trait;
use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, OnceLock};

/// One named rule with its comma-separated arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub args: Vec<String>,
}

impl Rule {
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((name, args)) => Rule {
                name: name.trim().to_string(),
                args: args.split(',').map(|a| a.trim().to_string()).collect(),
            },
            None => Rule {
                name: text.trim().to_string(),
                args: Vec::new(),
            },
        }
    }
}

/// Ordered field declarations, parsed once.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    fields: Vec<(String, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `rules` (pipe-separated) for `field`.
    pub fn field(mut self, field: &str, rules: &str) -> Self {
        let rules = rules
            .split('|')
            .filter(|r| !r.trim().is_empty())
            .map(Rule::parse)
            .collect();
        self.fields.push((field.to_string(), rules));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.fields.iter().map(|(f, r)| (f.as_str(), r.as_slice()))
    }

    pub fn rules_for(&self, field: &str) -> Option<&[Rule]> {
        self.fields
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, r)| r.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Field name to the message of its first failing rule.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(IndexMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Re-key every field as `{prefix}.{field}`, e.g. for one item of a batch.
    pub fn prefixed(self, prefix: impl std::fmt::Display) -> Self {
        ValidationErrors(
            self.0
                .into_iter()
                .map(|(field, message)| (format!("{}.{}", prefix, field), message))
                .collect(),
        )
    }
}

/// Create validates every declared field; update only the fields present in the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Full,
    Partial,
}

/// Everything a check can look at for one field.
pub struct CheckContext<'a> {
    pub field: &'a str,
    pub value: &'a Value,
    pub args: &'a [String],
    pub table: &'a str,
    pub primary_key: &'a str,
    /// Id of the record being updated (partial mode).
    pub record_id: Option<&'a Value>,
    pub mode: Mode,
}

/// A validation rule. Returns the failure message, or `None` when the value passes.
#[async_trait]
pub trait Check: Send + Sync {
    async fn check(&self, ctx: &CheckContext<'_>, db: &mut Database) -> Result<Option<String>, DbError>;
}

/// Adapter for checks that never touch the database.
struct FnCheck<F>(F);

#[async_trait]
impl<F> Check for FnCheck<F>
where
    F: Fn(&CheckContext<'_>) -> Option<String> + Send + Sync,
{
    async fn check(&self, ctx: &CheckContext<'_>, _db: &mut Database) -> Result<Option<String>, DbError> {
        Ok((self.0)(ctx))
    }
}

/// Counts existing rows with the same value, excluding one id when given.
struct UniqueCheck;

#[async_trait]
impl Check for UniqueCheck {
    async fn check(&self, ctx: &CheckContext<'_>, db: &mut Database) -> Result<Option<String>, DbError> {
        let except = ctx
            .args
            .first()
            .filter(|a| !a.is_empty())
            .map(|a| a.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::String(a.clone())))
            .or_else(|| match ctx.mode {
                Mode::Partial => ctx.record_id.cloned(),
                Mode::Full => None,
            });
        let mut sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE {} = :value",
            ctx.table, ctx.field
        );
        let mut params = Record::new().with("value", ctx.value.clone());
        if let Some(id) = except {
            sql.push_str(&format!(" AND {} != :id", ctx.primary_key));
            params.insert("id", id);
        }
        let count = db
            .execute(&sql, params)
            .await?
            .fetch_one()
            .and_then(|row| row.get_i64("count"))
            .unwrap_or(0);
        Ok((count > 0).then(|| format!("{} must be unique", ctx.field)))
    }
}

/// Registry from rule name to check.
#[derive(Clone, Default)]
pub struct Validator {
    checks: HashMap<String, Arc<dyn Check>>,
}

impl Validator {
    /// Validator without any rules registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validator with the built-in rules.
    pub fn with_builtin_rules() -> Self {
        let mut v = Self::empty();
        v.register_fn("required", |c| {
            is_empty(c.value).then(|| format!("{} is required", c.field))
        });
        v.register_fn("length", |c| {
            let min: usize = c.args.first().and_then(|a| a.parse().ok()).unwrap_or(0);
            let max: usize = c.args.get(1).and_then(|a| a.parse().ok()).unwrap_or(usize::MAX);
            let len = text(c.value).chars().count();
            (len < min || len > max).then(|| {
                let max_text = c.args.get(1).cloned().unwrap_or_else(|| max.to_string());
                format!("{} must be between {} and {} characters", c.field, min, max_text)
            })
        });
        v.register_fn("email", |c| {
            (!EMAIL_RE.is_match(&text(c.value)))
                .then(|| format!("{} must be a valid email address", c.field))
        });
        v.register_fn("numeric", |c| {
            (!is_numeric(c.value)).then(|| format!("{} must be a number", c.field))
        });
        v.register_fn("date", |c| {
            (!is_date(&text(c.value)))
                .then(|| format!("{} must be a valid date (YYYY-MM-DD)", c.field))
        });
        v.register_fn("json", |c| {
            (!is_json(c.value)).then(|| format!("{} must be valid JSON", c.field))
        });
        v.register_fn("in", |c| {
            let value = text(c.value);
            (!c.args.iter().any(|a| *a == value))
                .then(|| format!("{} must be one of: {}", c.field, c.args.join(", ")))
        });
        v.register("unique", Arc::new(UniqueCheck));
        v
    }

    /// Shared validator with the built-in rules.
    pub fn builtin() -> &'static Validator {
        static BUILTIN: OnceLock<Validator> = OnceLock::new();
        BUILTIN.get_or_init(Validator::with_builtin_rules)
    }

    pub fn register(&mut self, name: &str, check: Arc<dyn Check>) {
        self.checks.insert(name.to_string(), check);
    }

    pub fn register_fn<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&CheckContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnCheck(f)));
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    /// Check `data` against `rules`. Unknown rule names are skipped.
    pub async fn validate(
        &self,
        db: &mut Database,
        target: Target<'_>,
        rules: &RuleSet,
        data: &Record,
        mode: Mode,
    ) -> Result<ValidationErrors, DbError> {
        let mut errors = ValidationErrors::new();
        for (field, field_rules) in rules.iter() {
            let value = data.get(field);
            let present = matches!(value, Some(v) if !v.is_null());
            match mode {
                Mode::Partial if value.is_none() => continue,
                Mode::Full if !present && !field_rules.iter().any(|r| r.name == "required") => continue,
                _ => {}
            }
            let value = value.unwrap_or(&Value::Null);
            for rule in field_rules {
                let Some(check) = self.checks.get(&rule.name) else {
                    continue;
                };
                let ctx = CheckContext {
                    field,
                    value,
                    args: &rule.args,
                    table: target.table,
                    primary_key: target.primary_key,
                    record_id: target.record_id,
                    mode,
                };
                if let Some(message) = check.check(&ctx, db).await? {
                    errors.add(field, message);
                    break;
                }
            }
        }
        Ok(errors)
    }
}

/// Table and record a validation run is about.
#[derive(Clone, Copy, Debug)]
pub struct Target<'a> {
    pub table: &'a str,
    pub primary_key: &'a str,
    pub record_id: Option<&'a Value>,
}

/// Text form of a scalar, the way it would be stored.
fn text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".into(),
        Value::Bool(false) => String::new(),
        other => other.to_string(),
    }
}

/// Missing, null, false, zero, "0", empty string or empty collection.
fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?\s*$").unwrap());

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .unwrap()
});

fn is_numeric(v: &Value) -> bool {
    match v {
        Value::Number(_) => true,
        Value::String(s) => NUMERIC_RE.is_match(s),
        _ => false,
    }
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string() == s)
        .unwrap_or(false)
}

fn is_json(v: &Value) -> bool {
    match v {
        Value::String(s) => serde_json::from_str::<Value>(s).is_ok(),
        Value::Array(_) | Value::Object(_) => true,
        _ => false,
    }
}
