//! Rule resolution: many rules, one decision
//!
//! ```text
//! rules ──sort by priority──┬── Any ────── deny veto → first passing allow
//!                           ├── All ────── deny veto → every allow passes
//!                           └── Priority ─ first passing rule decides
//! ```

use crate::error::Result;
use crate::rule::RuleRef;
use crate::types::{Principal, Resource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// How a rule collection combines into one decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResolutionStrategy {
    /// Any passing allow grants, unless a deny passes
    #[default]
    Any,
    /// Every allow must pass, unless a deny passes
    All,
    /// The highest-priority passing rule decides
    Priority,
}

impl ResolutionStrategy {
    /// Parse a strategy name; unknown names fall back to `any`
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown resolution strategy '{}', falling back to 'any'", name);
            Self::default()
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
            Self::Priority => "priority",
        }
    }
}

impl FromStr for ResolutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "all" => Ok(Self::All),
            "priority" => Ok(Self::Priority),
            other => Err(format!("unknown resolution strategy '{}'", other)),
        }
    }
}

impl From<String> for ResolutionStrategy {
    fn from(name: String) -> Self {
        Self::parse_lenient(&name)
    }
}

impl From<ResolutionStrategy> for String {
    fn from(strategy: ResolutionStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless resolver
pub struct RuleResolver;

impl RuleResolver {
    /// Rules ordered by descending priority; equal priorities keep their input order
    pub fn sort_by_priority(rules: &[RuleRef]) -> Vec<RuleRef> {
        let mut sorted = rules.to_vec();
        sorted.sort_by(|a, b| b.priority().cmp(&a.priority()));
        sorted
    }

    /// Resolve a rule collection to a single decision.
    ///
    /// An empty collection denies. Predicate errors propagate unchanged.
    pub fn resolve(
        rules: &[RuleRef],
        principal: &Principal,
        resource: &Resource,
        strategy: ResolutionStrategy,
    ) -> Result<bool> {
        if rules.is_empty() {
            debug!(principal = %principal.id, "No rules apply, denying");
            return Ok(false);
        }

        let sorted = Self::sort_by_priority(rules);

        let decision = match strategy {
            ResolutionStrategy::Any => Self::resolve_any(&sorted, principal, resource)?,
            ResolutionStrategy::All => Self::resolve_all(&sorted, principal, resource)?,
            ResolutionStrategy::Priority => Self::resolve_priority(&sorted, principal, resource)?,
        };

        debug!(
            principal = %principal.id,
            resource_type = %resource.resource_type,
            %strategy,
            rules = rules.len(),
            decision,
            "Resolved rules"
        );

        Ok(decision)
    }

    /// Whether any deny rule passes
    fn deny_vetoes(sorted: &[RuleRef], principal: &Principal, resource: &Resource) -> Result<bool> {
        for rule in sorted.iter().filter(|r| r.is_deny()) {
            if rule.passes(principal, resource)? {
                debug!(priority = rule.priority(), "Deny rule passed");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn resolve_any(sorted: &[RuleRef], principal: &Principal, resource: &Resource) -> Result<bool> {
        if Self::deny_vetoes(sorted, principal, resource)? {
            return Ok(false);
        }

        for rule in sorted.iter().filter(|r| !r.is_deny()) {
            if rule.passes(principal, resource)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn resolve_all(sorted: &[RuleRef], principal: &Principal, resource: &Resource) -> Result<bool> {
        if Self::deny_vetoes(sorted, principal, resource)? {
            return Ok(false);
        }

        let mut allows = sorted.iter().filter(|r| !r.is_deny()).peekable();
        if allows.peek().is_none() {
            return Ok(false);
        }

        for rule in allows {
            if !rule.passes(principal, resource)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn resolve_priority(sorted: &[RuleRef], principal: &Principal, resource: &Resource) -> Result<bool> {
        for rule in sorted {
            if rule.passes(principal, resource)? {
                debug!(priority = rule.priority(), effect = %rule.effect(), "Deciding rule");
                return Ok(!rule.is_deny());
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AclError;
    use crate::rule::{CustomRule, RuleMeta};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn rule(priority: i32, deny: bool, passes: bool) -> RuleRef {
        let meta = if deny {
            RuleMeta::deny(priority)
        } else {
            RuleMeta::allow(priority)
        };
        Arc::new(CustomRule::new("fixed", move |_, _| Ok(passes)).with_meta(meta))
    }

    fn resolve(rules: &[RuleRef], strategy: ResolutionStrategy) -> bool {
        RuleResolver::resolve(rules, &Principal::new("1"), &Resource::new("ticket"), strategy).unwrap()
    }

    #[test]
    fn test_empty_rules_deny() {
        for strategy in [ResolutionStrategy::Any, ResolutionStrategy::All, ResolutionStrategy::Priority] {
            assert!(!resolve(&[], strategy));
        }
    }

    #[test]
    fn test_passing_deny_vetoes_any_and_all() {
        let rules = vec![rule(1, false, true), rule(0, true, true)];
        assert!(!resolve(&rules, ResolutionStrategy::Any));
        assert!(!resolve(&rules, ResolutionStrategy::All));
    }

    #[test]
    fn test_any_needs_one_passing_allow() {
        let rules = vec![rule(5, false, false), rule(1, false, true), rule(9, true, false)];
        assert!(resolve(&rules, ResolutionStrategy::Any));
        assert!(!resolve(&rules, ResolutionStrategy::All));
    }

    #[test]
    fn test_all_with_only_deny_rules_denies() {
        let rules = vec![rule(5, true, false)];
        assert!(!resolve(&rules, ResolutionStrategy::All));
    }

    #[test]
    fn test_priority_first_passing_rule_decides() {
        let rules = vec![rule(5, false, true), rule(10, true, true)];
        assert!(!resolve(&rules, ResolutionStrategy::Priority));

        let rules = vec![rule(5, false, false), rule(1, false, true)];
        assert!(resolve(&rules, ResolutionStrategy::Priority));

        let rules = vec![rule(5, true, false), rule(1, false, false)];
        assert!(!resolve(&rules, ResolutionStrategy::Priority));
    }

    #[test]
    fn test_equal_priorities_keep_input_order() {
        let first = rule(3, false, true);
        let second = rule(3, true, true);
        let sorted = RuleResolver::sort_by_priority(&[first.clone(), second.clone(), rule(7, false, false)]);

        assert_eq!(sorted[0].priority(), 7);
        assert!(Arc::ptr_eq(&sorted[1], &first));
        assert!(Arc::ptr_eq(&sorted[2], &second));
        assert!(resolve(&[first, second], ResolutionStrategy::Priority));
    }

    #[test]
    fn test_any_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counted: RuleRef = Arc::new(
            CustomRule::new("counted", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            })
            .with_meta(RuleMeta::allow(0)),
        );

        assert!(resolve(&[rule(1, false, true), counted], ResolutionStrategy::Any));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_errors_propagate() {
        let failing: RuleRef = Arc::new(CustomRule::new("failing", |_, _| {
            Err(AclError::Evaluation("boom".to_string()))
        }));
        let result = RuleResolver::resolve(
            &[failing],
            &Principal::new("1"),
            &Resource::new("ticket"),
            ResolutionStrategy::Any,
        );
        assert!(matches!(result, Err(AclError::Evaluation(_))));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("ALL".parse::<ResolutionStrategy>().unwrap(), ResolutionStrategy::All);
        assert_eq!(ResolutionStrategy::parse_lenient("priority"), ResolutionStrategy::Priority);
        assert_eq!(ResolutionStrategy::parse_lenient("majority"), ResolutionStrategy::Any);

        let parsed: ResolutionStrategy = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(parsed, ResolutionStrategy::Any);
        assert_eq!(serde_json::to_string(&ResolutionStrategy::All).unwrap(), "\"all\"");
    }
}
