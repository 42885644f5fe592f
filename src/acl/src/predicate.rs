//! Filter predicates produced by rules and combined by the scope compiler
//!
//! A [`Predicate`] is the logical structure of a bulk-query filter. It is not
//! bound to any particular data store: callers translate it into their own
//! query language, render it with [`fmt::Display`] as a SQL-like `WHERE`
//! fragment, or evaluate it in memory with [`Predicate::matches`].

use crate::types::Resource;
use crate::value::{loose_cmp, loose_contains, loose_eq, unwrap_enum};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator of a single-column condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
}

impl CompareOp {
    /// Operator symbol
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    /// Apply the operator using loose comparison
    pub fn evaluate(&self, left: &Value, right: &Value) -> bool {
        match self {
            Self::Eq => loose_eq(left, right),
            Self::Ne => !loose_eq(left, right),
            Self::Gt => loose_cmp(left, right) == Some(Ordering::Greater),
            Self::Ge => matches!(loose_cmp(left, right), Some(Ordering::Greater | Ordering::Equal)),
            Self::Lt => loose_cmp(left, right) == Some(Ordering::Less),
            Self::Le => matches!(loose_cmp(left, right), Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical filter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// No restriction
    True,

    /// Matches nothing
    False,

    /// `column <op> value`
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },

    /// `column IN (values)`
    In { column: String, values: Vec<Value> },

    /// `column NOT IN (values)`
    NotIn { column: String, values: Vec<Value> },

    /// `column BETWEEN low AND high` (inclusive)
    Between {
        column: String,
        low: Value,
        high: Value,
    },

    /// Conjunction
    And(Vec<Predicate>),

    /// Disjunction
    Or(Vec<Predicate>),
}

impl Predicate {
    /// `column <op> value`
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// `column IN (values)`; an empty list matches nothing
    pub fn in_list(column: impl Into<String>, values: Vec<Value>) -> Self {
        if values.is_empty() {
            return Self::False;
        }
        Self::In {
            column: column.into(),
            values,
        }
    }

    /// `column NOT IN (values)`; an empty list excludes nothing
    pub fn not_in_list(column: impl Into<String>, values: Vec<Value>) -> Self {
        if values.is_empty() {
            return Self::True;
        }
        Self::NotIn {
            column: column.into(),
            values,
        }
    }

    /// `column BETWEEN low AND high`
    pub fn between(column: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    /// Conjunction of all parts.
    ///
    /// Nested conjunctions are flattened, `True` parts dropped, and any
    /// `False` part collapses the whole group.
    pub fn all(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Self::True => {}
                Self::False => return Self::False,
                Self::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => Self::True,
            1 => flat.swap_remove(0),
            _ => Self::And(flat),
        }
    }

    /// Disjunction of all parts.
    ///
    /// Each part stays a self-contained branch. Nested disjunctions are
    /// flattened, `False` parts dropped, and any `True` part makes the whole
    /// group unrestricted.
    pub fn any(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Self::True => return Self::True,
                Self::False => {}
                Self::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => Self::False,
            1 => flat.swap_remove(0),
            _ => Self::Or(flat),
        }
    }

    /// `self AND other`
    pub fn and(self, other: Predicate) -> Self {
        Self::all([self, other])
    }

    /// `self OR other`
    pub fn or(self, other: Predicate) -> Self {
        Self::any([self, other])
    }

    /// Whether this predicate places no restriction at all
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Evaluate the predicate against an in-memory resource.
    ///
    /// Missing or null columns never satisfy a condition, mirroring SQL
    /// `NULL` semantics.
    pub fn matches(&self, resource: &Resource) -> bool {
        let field = |column: &str| {
            resource
                .attribute(column)
                .map(unwrap_enum)
                .filter(|value| !value.is_null())
        };

        match self {
            Self::True => true,
            Self::False => false,
            Self::Compare { column, op, value } => {
                field(column.as_str()).map_or(false, |actual| op.evaluate(actual, value))
            }
            Self::In { column, values } => {
                field(column.as_str()).map_or(false, |actual| loose_contains(values, actual))
            }
            Self::NotIn { column, values } => {
                field(column.as_str()).map_or(false, |actual| !loose_contains(values, actual))
            }
            Self::Between { column, low, high } => field(column.as_str()).map_or(false, |actual| {
                CompareOp::Ge.evaluate(actual, low) && CompareOp::Le.evaluate(actual, high)
            }),
            Self::And(parts) => parts.iter().all(|p| p.matches(resource)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(resource)),
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("NULL"),
        Value::Bool(true) => f.write_str("TRUE"),
        Value::Bool(false) => f.write_str("FALSE"),
        Value::Number(n) => write!(f, "{}", n),
        Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        other => write!(f, "'{}'", other.to_string().replace('\'', "''")),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    f.write_str("(")?;
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write_literal(f, value)?;
    }
    f.write_str(")")
}

fn write_group(f: &mut fmt::Formatter<'_>, parts: &[Predicate], joiner: &str) -> fmt::Result {
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            f.write_str(joiner)?;
        }
        match part {
            Predicate::And(_) | Predicate::Or(_) => write!(f, "({})", part)?,
            _ => write!(f, "{}", part)?,
        }
    }
    Ok(())
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("1 = 1"),
            Self::False => f.write_str("1 = 0"),
            Self::Compare { column, op, value } => {
                write!(f, "{} {} ", column, op)?;
                write_literal(f, value)
            }
            Self::In { column, values } => {
                write!(f, "{} IN ", column)?;
                write_list(f, values)
            }
            Self::NotIn { column, values } => {
                write!(f, "{} NOT IN ", column)?;
                write_list(f, values)
            }
            Self::Between { column, low, high } => {
                write!(f, "{} BETWEEN ", column)?;
                write_literal(f, low)?;
                f.write_str(" AND ")?;
                write_literal(f, high)
            }
            Self::And(parts) => write_group(f, parts, " AND "),
            Self::Or(parts) => write_group(f, parts, " OR "),
        }
    }
}
