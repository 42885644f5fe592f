//! Rule registry and stored rule definitions
//!
//! Providers store rules as data ([`RuleDefinition`]): a kind tag plus a JSON
//! settings blob. The registry turns a definition into a live rule by looking
//! up the factory registered for its kind. Built-in kinds are registered by
//! [`RuleRegistry::with_builtins`]; hosts add their own with
//! [`RuleRegistry::register`].

use crate::cel::Engine;
use crate::error::{AclError, Result};
use crate::rule::{
    AttributeRule, DateRangeRule, ExpressionRule, OwnershipRule, RuleEffect, RuleMeta, RuleRef,
    StatusRule,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A rule as stored by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: u64,

    /// Human readable name
    pub name: String,

    /// Action key, e.g. `view_ticket`
    pub key: String,

    /// Registered kind tag
    pub kind: String,

    /// Kind-specific settings
    #[serde(default)]
    pub settings: Value,

    /// Resource type the rule is limited to; `None` applies to every type
    #[serde(default)]
    pub resource_type: Option<String>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub is_deny: bool,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl RuleDefinition {
    /// Active allow rule with empty settings
    pub fn new(id: u64, key: impl Into<String>, kind: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            id,
            name: key.clone(),
            key,
            kind: kind.into(),
            settings: Value::Object(Default::default()),
            resource_type: None,
            priority: 0,
            is_deny: false,
            active: true,
        }
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    pub fn for_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn deny(mut self) -> Self {
        self.is_deny = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Priority and effect of the definition
    pub fn meta(&self) -> RuleMeta {
        RuleMeta {
            priority: self.priority,
            effect: if self.is_deny {
                RuleEffect::Deny
            } else {
                RuleEffect::Allow
            },
        }
    }

    /// Whether the rule's key covers an action: `view` matches `view` and `view_ticket`
    pub fn applies_to_action(&self, action: &str) -> bool {
        self.key == action
            || self
                .key
                .strip_prefix(action)
                .map_or(false, |rest| rest.starts_with('_'))
    }

    /// Whether the rule applies to a resource type (global rules apply to all)
    pub fn applies_to_type(&self, resource_type: &str) -> bool {
        self.resource_type
            .as_deref()
            .map_or(true, |own| own == resource_type)
    }
}

/// Parameters handed to a rule factory
#[derive(Debug, Clone, Default)]
pub struct RuleParams {
    pub settings: Value,
    pub meta: RuleMeta,
}

impl RuleParams {
    /// Deserialize the settings blob into a kind's typed settings.
    ///
    /// `null` settings are read as an empty object so every field takes its default.
    pub fn typed<T: DeserializeOwned>(&self, kind: &str) -> Result<T> {
        let settings = match &self.settings {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };

        serde_json::from_value(settings).map_err(|e| {
            AclError::RuleInstantiation(format!("Invalid settings for '{}' rule: {}", kind, e))
        })
    }
}

/// Factory building a rule from its parameters
pub type RuleFactory = Arc<dyn Fn(&RuleParams) -> Result<RuleRef> + Send + Sync>;

/// Map of kind tag to rule factory
#[derive(Clone, Default)]
pub struct RuleRegistry {
    factories: HashMap<String, RuleFactory>,
}

impl RuleRegistry {
    /// Registry without any kinds
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in kinds: attribute, date_range, ownership,
    /// status and expression
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let engine = Arc::new(Engine::new());

        registry.register("attribute", |params| {
            let settings = params.typed("attribute")?;
            Ok(Arc::new(AttributeRule::from_settings(settings, params.meta)) as RuleRef)
        });
        registry.register("date_range", |params| {
            let settings = params.typed("date_range")?;
            Ok(Arc::new(DateRangeRule::from_settings(settings, params.meta)?) as RuleRef)
        });
        registry.register("ownership", |params| {
            let settings = params.typed("ownership")?;
            Ok(Arc::new(OwnershipRule::from_settings(settings, params.meta)) as RuleRef)
        });
        registry.register("status", |params| {
            let settings = params.typed("status")?;
            Ok(Arc::new(StatusRule::from_settings(settings, params.meta)) as RuleRef)
        });
        registry.register("expression", move |params| {
            let settings = params.typed("expression")?;
            let rule = ExpressionRule::from_settings(settings, params.meta, engine.clone())?;
            Ok(Arc::new(rule) as RuleRef)
        });

        registry
    }

    /// Register (or replace) the factory for a kind tag
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&RuleParams) -> Result<RuleRef> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    /// Whether a kind tag is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kind tags, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Instantiate a rule from its kind tag and parameters
    pub fn build(&self, kind: &str, params: &RuleParams) -> Result<RuleRef> {
        let factory = self.factories.get(kind).ok_or_else(|| {
            AclError::RuleInstantiation(format!("Unknown rule kind '{}'", kind))
        })?;

        factory(params)
    }

    /// Instantiate a stored definition
    pub fn instantiate(&self, definition: &RuleDefinition) -> Result<RuleRef> {
        debug!(rule_id = definition.id, kind = %definition.kind, "Instantiating rule");

        self.build(
            &definition.kind,
            &RuleParams {
                settings: definition.settings.clone(),
                meta: definition.meta(),
            },
        )
        .map_err(|e| match e {
            AclError::RuleInstantiation(msg) => {
                AclError::RuleInstantiation(format!("rule {} ('{}'): {}", definition.id, definition.name, msg))
            }
            other => other,
        })
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
