//! Status rule

use super::{AccessRule, RuleEffect, RuleMeta};
use crate::error::Result;
use crate::predicate::Predicate;
use crate::types::{Principal, Resource};
use crate::value::{loose_contains, unwrap_enum};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_status_column() -> String {
    "status".to_string()
}

/// Settings of a status rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSettings {
    /// Allowed status values; empty means any status
    #[serde(default)]
    pub statuses: Vec<Value>,

    #[serde(default = "default_status_column")]
    pub status_column: String,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            status_column: default_status_column(),
        }
    }
}

/// Rule restricting access to resources in one of the listed statuses
#[derive(Debug, Clone)]
pub struct StatusRule {
    settings: StatusSettings,
    meta: RuleMeta,
}

impl StatusRule {
    pub fn new(statuses: Vec<Value>, status_column: impl Into<String>) -> Self {
        Self::from_settings(
            StatusSettings {
                statuses,
                status_column: status_column.into(),
            },
            RuleMeta::default(),
        )
    }

    pub fn from_settings(settings: StatusSettings, meta: RuleMeta) -> Self {
        Self { settings, meta }
    }

    /// Set priority and effect
    pub fn with_meta(mut self, meta: RuleMeta) -> Self {
        self.meta = meta;
        self
    }
}

impl AccessRule for StatusRule {
    fn passes(&self, _principal: &Principal, resource: &Resource) -> Result<bool> {
        if self.settings.statuses.is_empty() {
            return Ok(true);
        }

        Ok(resource
            .attribute(&self.settings.status_column)
            .map(unwrap_enum)
            .map_or(false, |status| loose_contains(&self.settings.statuses, status)))
    }

    fn filter(&self, _principal: &Principal) -> Result<Predicate> {
        if self.settings.statuses.is_empty() {
            return Ok(Predicate::True);
        }

        Ok(Predicate::in_list(
            self.settings.status_column.as_str(),
            self.settings.statuses.clone(),
        ))
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
    use serde_json::json;

    #[test]
    fn test_listed_statuses() {
        let rule = StatusRule::new(vec![json!("open"), json!("pending")], "status");
        let principal = Principal::new("1");

        let open = Resource::new("ticket").with_attribute("status", "open");
        let closed = Resource::new("ticket").with_attribute("status", "closed");

        assert!(rule.passes(&principal, &open).unwrap());
        assert!(!rule.passes(&principal, &closed).unwrap());
        assert!(!rule.passes(&principal, &Resource::new("ticket")).unwrap());
        assert_eq!(
            rule.filter(&principal).unwrap().to_string(),
            "status IN ('open', 'pending')"
        );
    }

    #[test]
    fn test_enum_values_unwrap() {
        let rule = StatusRule::new(vec![json!(2)], "state");
        let ticket = Resource::new("ticket").with_attribute("state", json!({"value": 2, "label": "Active"}));

        assert!(rule.passes(&Principal::new("1"), &ticket).unwrap());
    }

    #[test]
    fn test_empty_list_does_not_restrict() {
        let rule = StatusRule::from_settings(StatusSettings::default(), RuleMeta::default());
        let principal = Principal::new("1");

        assert!(rule.passes(&principal, &Resource::new("ticket")).unwrap());
        assert_eq!(rule.filter(&principal).unwrap(), Predicate::True);
    }
}
