//! Parameterized SQL for the ClickHouse HTTP interface.
//!
//! Values never get spliced into SQL text. Each one is bound as a typed
//! placeholder `{pN:Type}` and travels as a `param_pN` URL parameter.

use chrono::NaiveDate;
use std::fmt::Write;

use super::QueryError;

/// A typed query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    String(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Date(NaiveDate),
    Bool(bool),
}

impl SqlParam {
    /// ClickHouse type used in the placeholder.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "String",
            Self::Int(_) => "Int64",
            Self::UInt(_) => "UInt64",
            Self::Float(_) => "Float64",
            Self::Date(_) => "Date",
            Self::Bool(_) => "Bool",
        }
    }

    /// Value as sent in the URL. ClickHouse reads it in escaped (TSV) form.
    pub fn to_url_value(&self) -> String {
        match self {
            Self::String(s) => escape_tsv(s),
            Self::Int(v) => v.to_string(),
            Self::UInt(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for SqlParam {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<u32> for SqlParam {
    fn from(v: u32) -> Self {
        Self::UInt(v as u64)
    }
}

impl From<u16> for SqlParam {
    fn from(v: u16) -> Self {
        Self::UInt(v as u64)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

fn escape_tsv(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Ordered set of bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: Vec<(String, SqlParam)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder.
    pub fn bind(&mut self, value: impl Into<SqlParam>) -> String {
        let value = value.into();
        let name = format!("p{}", self.values.len());
        let placeholder = format!("{{{}:{}}}", name, value.type_name());
        self.values.push((name, value));
        placeholder
    }

    /// Bind a float, rejecting NaN and infinities.
    pub fn bind_float(&mut self, field: &str, value: f64) -> Result<String, QueryError> {
        if !value.is_finite() {
            return Err(QueryError::Validation(format!("{field} must be a finite number")));
        }
        Ok(self.bind(value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SqlParam> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// `param_<name>` URL pairs.
    pub fn to_url_pairs(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|(name, value)| (format!("param_{name}"), value.to_url_value()))
            .collect()
    }
}

/// Conjunction of WHERE conditions.
#[derive(Debug, Clone, Default)]
pub struct WhereClause {
    conditions: Vec<String>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: impl Into<String>) {
        self.conditions.push(condition.into());
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// `""` when empty, else `WHERE a AND b`.
    pub fn to_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }
}

/// SQL text plus its bound parameters; one HTTP request's worth of query.
#[derive(Debug, Clone)]
pub struct ParameterizedQuery {
    pub sql: String,
    pub params: Params,
}

impl ParameterizedQuery {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Stable key for result caching.
    pub fn cache_key(&self) -> String {
        let mut pairs = self.params.to_url_pairs();
        pairs.sort();
        let mut key = self.sql.clone();
        for (name, value) in pairs {
            let _ = write!(key, "|{name}={value}");
        }
        key
    }
}
