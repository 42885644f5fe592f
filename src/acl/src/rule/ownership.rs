//! Ownership rule

use super::{AccessRule, RuleEffect, RuleMeta};
use crate::error::Result;
use crate::predicate::Predicate;
use crate::types::{Principal, Resource};
use crate::value::loose_eq;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_owner_column() -> String {
    "user_id".to_string()
}

fn default_user_id_column() -> String {
    "id".to_string()
}

/// Settings of an ownership rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipSettings {
    /// Resource field naming the owner
    #[serde(default = "default_owner_column")]
    pub owner_column: String,

    /// Principal attribute the owner field is matched against
    #[serde(default = "default_user_id_column")]
    pub user_id_column: String,
}

impl Default for OwnershipSettings {
    fn default() -> Self {
        Self {
            owner_column: default_owner_column(),
            user_id_column: default_user_id_column(),
        }
    }
}

/// Rule granting access to resources the principal owns
#[derive(Debug, Clone)]
pub struct OwnershipRule {
    settings: OwnershipSettings,
    meta: RuleMeta,
}

impl OwnershipRule {
    pub fn new(owner_column: impl Into<String>, user_id_column: impl Into<String>) -> Self {
        Self::from_settings(
            OwnershipSettings {
                owner_column: owner_column.into(),
                user_id_column: user_id_column.into(),
            },
            RuleMeta::default(),
        )
    }

    pub fn from_settings(settings: OwnershipSettings, meta: RuleMeta) -> Self {
        Self { settings, meta }
    }

    /// Set priority and effect
    pub fn with_meta(mut self, meta: RuleMeta) -> Self {
        self.meta = meta;
        self
    }

    fn principal_value(&self, principal: &Principal) -> Value {
        principal
            .attribute(&self.settings.user_id_column)
            .unwrap_or(Value::Null)
    }
}

impl Default for OwnershipRule {
    fn default() -> Self {
        Self::from_settings(OwnershipSettings::default(), RuleMeta::default())
    }
}

impl AccessRule for OwnershipRule {
    fn passes(&self, principal: &Principal, resource: &Resource) -> Result<bool> {
        let owner = resource
            .attribute(&self.settings.owner_column)
            .unwrap_or(&Value::Null);

        Ok(loose_eq(owner, &self.principal_value(principal)))
    }

    fn filter(&self, principal: &Principal) -> Result<Predicate> {
        Ok(Predicate::eq(
            self.settings.owner_column.as_str(),
            self.principal_value(principal),
        ))
    }

    fn priority(&self) -> i32 {
        self.meta.priority
    }

    fn effect(&self) -> RuleEffect {
        self.meta.effect
    }
}
