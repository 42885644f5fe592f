//! In-memory rule store with principal and role assignments

use super::RuleSetProvider;
use crate::error::{AclError, Result};
use crate::registry::{RuleDefinition, RuleRegistry};
use crate::rule::RuleRef;
use crate::types::{Action, Principal};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Who a rule is assigned to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignee {
    /// A single principal, by id
    Principal(String),
    /// Every principal holding the role
    Role(String),
}

/// A rule assigned to a principal or role
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub rule_id: u64,
    pub assignee: Assignee,
}

/// Seed data: rule definitions and their assignments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSeed {
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,

    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl RuleSeed {
    /// Read a JSON seed file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&contents)
            .map_err(|e| AclError::Provider(format!("Invalid rule seed: {}", e)))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    rules: BTreeMap<u64, RuleDefinition>,
    assignments: BTreeSet<Assignment>,
}

/// In-memory rule store.
///
/// Rules are kept as definitions and instantiated through the registry on
/// every lookup.
pub struct InMemoryRuleStore {
    state: Arc<RwLock<StoreState>>,
    registry: RuleRegistry,
    role_inheritance: bool,
}

impl InMemoryRuleStore {
    /// Empty store using the built-in rule kinds, with role inheritance
    pub fn new() -> Self {
        Self::with_registry(RuleRegistry::with_builtins())
    }

    /// Empty store using a custom registry
    pub fn with_registry(registry: RuleRegistry) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            registry,
            role_inheritance: true,
        }
    }

    /// Whether rules assigned to a role apply to its members
    pub fn with_role_inheritance(mut self, enabled: bool) -> Self {
        self.role_inheritance = enabled;
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Insert or replace a rule definition
    pub async fn put_rule(&self, rule: RuleDefinition) {
        let mut state = self.state.write().await;
        state.rules.insert(rule.id, rule);
    }

    pub async fn get_rule(&self, id: u64) -> Option<RuleDefinition> {
        self.state.read().await.rules.get(&id).cloned()
    }

    /// Remove a rule and its assignments
    pub async fn remove_rule(&self, id: u64) -> Option<RuleDefinition> {
        let mut state = self.state.write().await;
        state.assignments.retain(|a| a.rule_id != id);
        state.rules.remove(&id)
    }

    /// All rule definitions, ordered by id
    pub async fn list_rules(&self) -> Vec<RuleDefinition> {
        self.state.read().await.rules.values().cloned().collect()
    }

    /// Assign a rule; assigning twice has no further effect
    pub async fn assign(&self, rule_id: u64, assignee: Assignee) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.rules.contains_key(&rule_id) {
            return Err(AclError::InvalidInput(format!("Unknown rule id {}", rule_id)));
        }
        state.assignments.insert(Assignment { rule_id, assignee });
        Ok(())
    }

    /// Remove an assignment; returns whether it existed
    pub async fn unassign(&self, rule_id: u64, assignee: &Assignee) -> bool {
        let mut state = self.state.write().await;
        state.assignments.remove(&Assignment {
            rule_id,
            assignee: assignee.clone(),
        })
    }

    /// Replace the full rule set of an assignee
    pub async fn sync_assignments(&self, assignee: &Assignee, rule_ids: &[u64]) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(missing) = rule_ids.iter().find(|id| !state.rules.contains_key(*id)) {
            return Err(AclError::InvalidInput(format!("Unknown rule id {}", missing)));
        }

        state.assignments.retain(|a| &a.assignee != assignee);
        for &rule_id in rule_ids {
            state.assignments.insert(Assignment {
                rule_id,
                assignee: assignee.clone(),
            });
        }
        Ok(())
    }

    /// Whether a rule is assigned directly to the assignee
    pub async fn has_rule(&self, assignee: &Assignee, rule_id: u64) -> bool {
        self.state.read().await.assignments.contains(&Assignment {
            rule_id,
            assignee: assignee.clone(),
        })
    }

    /// Rule definitions assigned directly to the assignee
    pub async fn assigned_rules(&self, assignee: &Assignee) -> Vec<RuleDefinition> {
        let state = self.state.read().await;
        state
            .assignments
            .iter()
            .filter(|a| &a.assignee == assignee)
            .filter_map(|a| state.rules.get(&a.rule_id).cloned())
            .collect()
    }

    /// Load rules and assignments from seed data.
    ///
    /// Assignments may reference rules already in the store or rules in the
    /// same seed. The store is left untouched when any reference is unknown.
    pub async fn load_seed(&self, seed: RuleSeed) -> Result<()> {
        let mut state = self.state.write().await;
        let rule_count = seed.rules.len();

        let seeded: BTreeSet<u64> = seed.rules.iter().map(|rule| rule.id).collect();
        if let Some(dangling) = seed
            .assignments
            .iter()
            .find(|a| !state.rules.contains_key(&a.rule_id) && !seeded.contains(&a.rule_id))
        {
            return Err(AclError::Provider(format!(
                "Assignment references unknown rule id {}",
                dangling.rule_id
            )));
        }

        for rule in seed.rules {
            state.rules.insert(rule.id, rule);
        }
        state.assignments.extend(seed.assignments);

        info!(
            "Loaded {} rules ({} assignments in store)",
            rule_count,
            state.assignments.len()
        );
        Ok(())
    }

    /// Definitions applying to a request, ordered by priority then id
    async fn applicable_definitions(
        &self,
        principal: &Principal,
        action: &Action,
        resource_type: &str,
    ) -> Vec<RuleDefinition> {
        let state = self.state.read().await;

        let rule_ids: BTreeSet<u64> = state
            .assignments
            .iter()
            .filter(|a| match &a.assignee {
                Assignee::Principal(id) => id == &principal.id,
                Assignee::Role(role) => self.role_inheritance && principal.roles.contains(role),
            })
            .map(|a| a.rule_id)
            .collect();

        let mut definitions: Vec<RuleDefinition> = rule_ids
            .iter()
            .filter_map(|id| state.rules.get(id))
            .filter(|rule| rule.active)
            .filter(|rule| rule.applies_to_action(&action.name))
            .filter(|rule| rule.applies_to_type(resource_type))
            .cloned()
            .collect();

        definitions.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        definitions
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleSetProvider for InMemoryRuleStore {
    async fn applicable_rules(
        &self,
        principal: &Principal,
        action: &Action,
        resource_type: &str,
    ) -> Result<Vec<RuleRef>> {
        let definitions = self
            .applicable_definitions(principal, action, resource_type)
            .await;

        debug!(
            principal = %principal.id,
            %action,
            resource_type,
            rules = definitions.len(),
            "Found applicable rules"
        );

        definitions
            .iter()
            .map(|definition| self.registry.instantiate(definition))
            .collect()
    }
}
