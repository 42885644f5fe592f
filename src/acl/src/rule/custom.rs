//! Host-defined rules built from closures
//!
//! Kinds that need host logic can either implement [`AccessRule`] directly or
//! wrap a pair of closures in a [`CustomRule`] and register a factory for it
//! with the [`RuleRegistry`](crate::registry::RuleRegistry).

use super::{AccessRule, RuleEffect, RuleMeta};
use crate::error::Result;
use crate::predicate::Predicate;
use crate::types::{Principal, Resource};
use std::fmt;
use std::sync::Arc;

type PassesFn = Arc<dyn Fn(&Principal, &Resource) -> Result<bool> + Send + Sync>;
type FilterFn = Arc<dyn Fn(&Principal) -> Result<Predicate> + Send + Sync>;

/// Rule whose predicate and filter contribution are supplied by the host
#[derive(Clone)]
pub struct CustomRule {
    name: String,
    passes: PassesFn,
    filter: FilterFn,
    meta: RuleMeta,
}

impl CustomRule {
    /// Custom rule with a predicate; its filter contribution defaults to no restriction
    pub fn new<F>(name: impl Into<String>, passes: F) -> Self
    where
        F: Fn(&Principal, &Resource) -> Result<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            passes: Arc::new(passes),
            filter: Arc::new(|_: &Principal| Ok(Predicate::True)),
            meta: RuleMeta::default(),
        }
    }

    /// Set the filter contribution
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Principal) -> Result<Predicate> + Send + Sync + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// Set priority and effect
    pub fn with_meta(mut self, meta: RuleMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule")
            .field("name", &self.name)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl AccessRule for CustomRule {
    fn passes(&self, principal: &Principal, resource: &Resource) -> Result<bool> {
        (self.passes)(principal, resource)
    }

    fn filter(&self, principal: &Principal) -> Result<Predicate> {
        (self.filter)(principal)
    }

    fn priority(&self) -> i32 {
        self.meta.priority
    }

    fn effect(&self) -> RuleEffect {
        self.meta.effect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AclError;

    #[test]
    fn test_closures_drive_the_rule() {
        let rule = CustomRule::new("vip", |principal, _| Ok(principal.roles.iter().any(|r| r == "vip")))
            .with_filter(|_| Ok(Predicate::eq("tier", "gold")))
            .with_meta(RuleMeta::deny(3));

        let vip = Principal::new("1").with_role("vip");
        assert!(rule.passes(&vip, &Resource::new("ticket")).unwrap());
        assert!(!rule.passes(&Principal::new("2"), &Resource::new("ticket")).unwrap());
        assert_eq!(rule.filter(&vip).unwrap().to_string(), "tier = 'gold'");
        assert_eq!(rule.priority(), 3);
        assert!(rule.is_deny());
        assert_eq!(rule.name(), "vip");
    }

    #[test]
    fn test_errors_surface() {
        let rule = CustomRule::new("broken", |_, _| Err(AclError::Evaluation("boom".to_string())));
        let result = rule.passes(&Principal::new("1"), &Resource::new("ticket"));
        assert!(matches!(result, Err(AclError::Evaluation(_))));
    }
}
