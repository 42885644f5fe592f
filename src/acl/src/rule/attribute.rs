//! Attribute comparison rule
//!
//! Compares a resource field against either a principal attribute or a static
//! value, e.g. `ticket.department_id = principal.department_id`.

use super::{AccessRule, RuleEffect, RuleMeta};
use crate::error::Result;
use crate::predicate::{CompareOp, Predicate};
use crate::types::{Principal, Resource};
use crate::value::loose_contains;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Comparison operator of an attribute rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
}

impl Operator {
    /// Parse an operator symbol; unknown symbols fall back to `=`
    pub fn parse_lenient(symbol: &str) -> Self {
        match symbol.trim() {
            "=" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            other => {
                warn!("Unknown attribute operator '{}', falling back to '='", other);
                Self::Eq
            }
        }
    }

    /// Operator symbol
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::NotIn => "not_in",
            other => other.compare_op().map_or("=", |op| op.as_str()),
        }
    }

    fn compare_op(&self) -> Option<CompareOp> {
        match self {
            Self::Eq => Some(CompareOp::Eq),
            Self::Ne => Some(CompareOp::Ne),
            Self::Gt => Some(CompareOp::Gt),
            Self::Ge => Some(CompareOp::Ge),
            Self::Lt => Some(CompareOp::Lt),
            Self::Le => Some(CompareOp::Le),
            Self::In | Self::NotIn => None,
        }
    }

    /// Compare a resource value against the rule's target value.
    ///
    /// `in` / `not_in` need a list on the right-hand side and fail otherwise.
    pub fn compare(&self, left: &Value, right: &Value) -> bool {
        match (self, right) {
            (Self::In, Value::Array(items)) => loose_contains(items, left),
            (Self::NotIn, Value::Array(items)) => !loose_contains(items, left),
            (Self::In | Self::NotIn, _) => false,
            (op, _) => op
                .compare_op()
                .map_or(false, |cmp| cmp.evaluate(left, right)),
        }
    }

    /// Filter predicate for `column <op> value`
    pub fn to_predicate(&self, column: &str, value: Value) -> Predicate {
        match self {
            Self::In => Predicate::in_list(column, as_list(value)),
            Self::NotIn => Predicate::not_in_list(column, as_list(value)),
            op => Predicate::compare(column, op.compare_op().unwrap_or(CompareOp::Eq), value),
        }
    }
}

fn as_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    }
}

impl From<String> for Operator {
    fn from(symbol: String) -> Self {
        Self::parse_lenient(&symbol)
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of an attribute rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSettings {
    /// Resource field to compare; unset means the rule does not restrict
    #[serde(default)]
    pub model_attribute: Option<String>,

    /// Principal attribute to compare against
    #[serde(default)]
    pub user_attribute: Option<String>,

    /// Static value to compare against when no principal attribute is set
    #[serde(default)]
    pub static_value: Option<Value>,

    /// Comparison operator
    #[serde(default)]
    pub operator: Operator,
}

/// Rule comparing a resource attribute with a principal attribute or a static value
#[derive(Debug, Clone)]
pub struct AttributeRule {
    settings: AttributeSettings,
    meta: RuleMeta,
}

impl AttributeRule {
    /// Rule on the given resource attribute, compared with `=` until configured otherwise
    pub fn new(model_attribute: impl Into<String>) -> Self {
        Self::from_settings(
            AttributeSettings {
                model_attribute: Some(model_attribute.into()),
                ..Default::default()
            },
            RuleMeta::default(),
        )
    }

    /// Build from typed settings
    pub fn from_settings(settings: AttributeSettings, meta: RuleMeta) -> Self {
        Self { settings, meta }
    }

    /// Compare against a principal attribute
    pub fn against_user(mut self, user_attribute: impl Into<String>) -> Self {
        self.settings.user_attribute = Some(user_attribute.into());
        self
    }

    /// Compare against a static value
    pub fn against_value(mut self, value: impl Into<Value>) -> Self {
        self.settings.static_value = Some(value.into());
        self
    }

    /// Set the comparison operator
    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.settings.operator = operator;
        self
    }

    /// Set priority and effect
    pub fn with_meta(mut self, meta: RuleMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Settings this rule was built from
    pub fn settings(&self) -> &AttributeSettings {
        &self.settings
    }

    /// Right-hand side of the comparison, `None` when the rule has no target
    fn target(&self, principal: &Principal) -> Option<Value> {
        if let Some(user_attribute) = &self.settings.user_attribute {
            return Some(principal.attribute(user_attribute).unwrap_or(Value::Null));
        }
        self.settings.static_value.clone()
    }

    /// A principal without the compared attribute never matches
    fn principal_value_missing(&self, target: &Value) -> bool {
        self.settings.user_attribute.is_some() && target.is_null()
    }
}

impl AccessRule for AttributeRule {
    fn passes(&self, principal: &Principal, resource: &Resource) -> Result<bool> {
        let Some(model_attribute) = &self.settings.model_attribute else {
            return Ok(true);
        };
        let Some(target) = self.target(principal) else {
            return Ok(true);
        };
        if self.principal_value_missing(&target) {
            return Ok(false);
        }

        let actual = resource
            .attribute(model_attribute)
            .cloned()
            .unwrap_or(Value::Null);

        Ok(self.settings.operator.compare(&actual, &target))
    }

    fn filter(&self, principal: &Principal) -> Result<Predicate> {
        let (Some(model_attribute), Some(target)) =
            (&self.settings.model_attribute, self.target(principal))
        else {
            return Ok(Predicate::True);
        };
        if self.principal_value_missing(&target) {
            return Ok(Predicate::False);
        }

        Ok(self.settings.operator.to_predicate(model_attribute, target))
    }

    fn priority(&self) -> i32 {
        self.meta.priority
    }

    fn effect(&self) -> RuleEffect {
        self.meta.effect
    }
}
