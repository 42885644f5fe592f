//! Scope compilation: many rules, one bulk-query filter

use crate::error::Result;
use crate::predicate::Predicate;
use crate::resolver::RuleResolver;
use crate::rule::RuleRef;
use crate::types::Principal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// How rule contributions combine into one filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GroupingStrategy {
    /// Every contribution must hold
    #[default]
    And,
    /// Any contribution may hold; each is a self-contained branch
    Or,
}

impl GroupingStrategy {
    /// Parse a grouping name; unknown names fall back to `and`
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown scope grouping '{}', falling back to 'and'", name);
            Self::default()
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl FromStr for GroupingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(format!("unknown scope grouping '{}'", other)),
        }
    }
}

impl From<String> for GroupingStrategy {
    fn from(name: String) -> Self {
        Self::parse_lenient(&name)
    }
}

impl From<GroupingStrategy> for String {
    fn from(grouping: GroupingStrategy) -> Self {
        grouping.as_str().to_string()
    }
}

impl fmt::Display for GroupingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless scope compiler
pub struct ScopeCompiler;

impl ScopeCompiler {
    /// Compile allow rules into one filter.
    ///
    /// Deny rules never contribute. With no allow rule the fallback filter is
    /// returned instead.
    pub fn compile(
        rules: &[RuleRef],
        principal: &Principal,
        grouping: GroupingStrategy,
        fallback_column: Option<&str>,
    ) -> Result<Predicate> {
        let allows: Vec<RuleRef> = RuleResolver::sort_by_priority(rules)
            .into_iter()
            .filter(|rule| !rule.is_deny())
            .collect();

        if allows.is_empty() {
            debug!(principal = %principal.id, "No allow rules, applying fallback filter");
            return Ok(Self::fallback(principal, fallback_column));
        }

        let contributions = allows
            .iter()
            .map(|rule| rule.filter(principal))
            .collect::<Result<Vec<_>>>()?;

        let predicate = match grouping {
            GroupingStrategy::And => Predicate::all(contributions),
            GroupingStrategy::Or => Predicate::any(contributions),
        };

        debug!(
            principal = %principal.id,
            %grouping,
            rules = allows.len(),
            filter = %predicate,
            "Compiled scope"
        );

        Ok(predicate)
    }

    /// Filter applied when no allow rule exists: rows owned by the principal
    /// through `fallback_column`, or no restriction when no column is configured.
    pub fn fallback(principal: &Principal, fallback_column: Option<&str>) -> Predicate {
        match fallback_column {
            Some(column) => Predicate::eq(column, principal.id.as_str()),
            None => {
                warn!(
                    principal = %principal.id,
                    "No fallback column configured, bulk query passes through unrestricted"
                );
                Predicate::True
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{CustomRule, RuleMeta};
    use std::sync::Arc;

    fn contributing(priority: i32, deny: bool, predicate: Predicate) -> RuleRef {
        let meta = if deny {
            RuleMeta::deny(priority)
        } else {
            RuleMeta::allow(priority)
        };
        Arc::new(
            CustomRule::new("fixed", |_, _| Ok(true))
                .with_filter(move |_| Ok(predicate.clone()))
                .with_meta(meta),
        )
    }

    #[test]
    fn test_and_grouping_in_priority_order() {
        let rules = vec![
            contributing(1, false, Predicate::eq("owner", 42)),
            contributing(5, false, Predicate::eq("status", "open")),
        ];
        let filter = ScopeCompiler::compile(&rules, &Principal::new("42"), GroupingStrategy::And, None).unwrap();
        assert_eq!(filter.to_string(), "status = 'open' AND owner = 42");
    }

    #[test]
    fn test_or_grouping_keeps_branches_separate() {
        let rules = vec![
            contributing(5, false, Predicate::eq("status", "open")),
            contributing(1, false, Predicate::eq("owner", 42)),
        ];
        let filter = ScopeCompiler::compile(&rules, &Principal::new("42"), GroupingStrategy::Or, None).unwrap();
        assert_eq!(filter.to_string(), "status = 'open' OR owner = 42");

        let rules = vec![
            contributing(5, false, Predicate::eq("status", "open")),
            contributing(1, false, Predicate::eq("a", 1).and(Predicate::eq("b", 2))),
        ];
        let filter = ScopeCompiler::compile(&rules, &Principal::new("42"), GroupingStrategy::Or, None).unwrap();
        assert_eq!(filter.to_string(), "status = 'open' OR (a = 1 AND b = 2)");
    }

    #[test]
    fn test_deny_rules_do_not_contribute() {
        let rules = vec![
            contributing(10, true, Predicate::eq("status", "closed")),
            contributing(1, false, Predicate::eq("owner", 42)),
        ];
        let filter = ScopeCompiler::compile(&rules, &Principal::new("42"), GroupingStrategy::And, None).unwrap();
        assert_eq!(filter, Predicate::eq("owner", 42));
    }

    #[test]
    fn test_fallback_when_no_allow_rules() {
        let principal = Principal::new("42");

        let filter = ScopeCompiler::compile(&[], &principal, GroupingStrategy::And, Some("user_id")).unwrap();
        assert_eq!(filter.to_string(), "user_id = '42'");

        let only_deny = vec![contributing(1, true, Predicate::eq("status", "closed"))];
        let filter = ScopeCompiler::compile(&only_deny, &principal, GroupingStrategy::Or, None).unwrap();
        assert_eq!(filter, Predicate::True);
    }

    #[test]
    fn test_grouping_parsing() {
        assert_eq!(GroupingStrategy::parse_lenient("OR"), GroupingStrategy::Or);
        assert_eq!(GroupingStrategy::parse_lenient("xor"), GroupingStrategy::And);
    }
}
