//! Access rule contract and built-in rule kinds
//!
//! A rule is a self-contained unit of authorization logic. It answers two
//! questions independently:
//!
//! - does this principal pass for this particular resource? ([`AccessRule::passes`])
//! - which rows would this principal pass for? ([`AccessRule::filter`])
//!
//! Rules carry a priority (higher evaluated first) and an effect. A passing
//! deny rule vetoes access under the `any` and `all` resolution strategies.
//!
//! # Example
//!
//! ```rust
//! use cretoai_acl::rule::{AccessRule, RuleMeta, StatusRule};
//! use cretoai_acl::{Principal, Resource};
//!
//! let rule = StatusRule::new(vec!["open".into()], "status").with_meta(RuleMeta::allow(10));
//! let ticket = Resource::new("ticket").with_attribute("status", "open");
//!
//! assert!(rule.passes(&Principal::new("42"), &ticket).unwrap());
//! assert_eq!(rule.filter(&Principal::new("42")).unwrap().to_string(), "status IN ('open')");
//! ```

pub mod attribute;
pub mod custom;
pub mod date_range;
pub mod expression;
pub mod ownership;
pub mod status;

pub use attribute::{AttributeRule, AttributeSettings, Operator};
pub use custom::CustomRule;
pub use date_range::{DateRangeRule, DateRangeSettings};
pub use expression::{ExpressionRule, ExpressionSettings};
pub use ownership::{OwnershipRule, OwnershipSettings};
pub use status::{StatusRule, StatusSettings};

use crate::error::Result;
use crate::predicate::Predicate;
use crate::types::{Principal, Resource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Rule effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleEffect {
    /// Grant access when the rule passes
    #[default]
    Allow,
    /// Veto access when the rule passes
    Deny,
}

impl fmt::Display for RuleEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("ALLOW"),
            Self::Deny => f.write_str("DENY"),
        }
    }
}

/// Priority and effect shared by every built-in rule kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMeta {
    /// Higher priority rules are evaluated first
    #[serde(default)]
    pub priority: i32,

    /// Allow or deny
    #[serde(default)]
    pub effect: RuleEffect,
}

impl RuleMeta {
    /// Allow rule with the given priority
    pub fn allow(priority: i32) -> Self {
        Self {
            priority,
            effect: RuleEffect::Allow,
        }
    }

    /// Deny rule with the given priority
    pub fn deny(priority: i32) -> Self {
        Self {
            priority,
            effect: RuleEffect::Deny,
        }
    }
}

/// Contract every rule kind implements
pub trait AccessRule: Send + Sync + fmt::Debug {
    /// Whether the rule passes for this principal and resource instance
    fn passes(&self, principal: &Principal, resource: &Resource) -> Result<bool>;

    /// The rule's contribution to a bulk-query filter for this principal
    fn filter(&self, principal: &Principal) -> Result<Predicate>;

    /// Evaluation priority (higher first)
    fn priority(&self) -> i32;

    /// Allow or deny
    fn effect(&self) -> RuleEffect;

    /// Whether this is a deny (negative) rule
    fn is_deny(&self) -> bool {
        self.effect() == RuleEffect::Deny
    }
}

/// Shared handle to a rule instance
pub type RuleRef = Arc<dyn AccessRule>;
