//! CEL expression rule
//!
//! The condition decides single-instance checks. CEL has no general
//! translation into a bulk filter, so the rule's filter contribution comes
//! from an optional attribute-rule block; without one the rule does not
//! narrow bulk queries.

use super::attribute::{AttributeRule, AttributeSettings};
use super::{AccessRule, RuleEffect, RuleMeta};
use crate::cel::{Engine, EvalContext};
use crate::error::{AclError, Result};
use crate::predicate::Predicate;
use crate::types::{Principal, Resource};
use cel_interpreter::Program;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Settings of an expression rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionSettings {
    /// CEL condition over `principal` / `P` and `resource` / `R`
    pub condition: String,

    /// Filter contribution for bulk queries
    #[serde(default)]
    pub filter: Option<AttributeSettings>,
}

/// Rule evaluating a CEL condition
#[derive(Clone)]
pub struct ExpressionRule {
    condition: String,
    program: Arc<Program>,
    engine: Arc<Engine>,
    filter: Option<AttributeRule>,
    meta: RuleMeta,
}

impl ExpressionRule {
    /// Compile a condition with a private engine
    pub fn new(condition: &str) -> Result<Self> {
        Self::from_settings(
            ExpressionSettings {
                condition: condition.to_string(),
                filter: None,
            },
            RuleMeta::default(),
            Arc::new(Engine::new()),
        )
    }

    /// Build from typed settings; the condition is compiled here
    pub fn from_settings(settings: ExpressionSettings, meta: RuleMeta, engine: Arc<Engine>) -> Result<Self> {
        if settings.condition.trim().is_empty() {
            return Err(AclError::RuleInstantiation(
                "Expression rule requires a condition".to_string(),
            ));
        }

        let program = engine.compile(&settings.condition)?;
        let filter = settings
            .filter
            .map(|filter| AttributeRule::from_settings(filter, RuleMeta::default()));

        Ok(Self {
            condition: settings.condition,
            program,
            engine,
            filter,
            meta,
        })
    }

    /// Set priority and effect
    pub fn with_meta(mut self, meta: RuleMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }
}

impl fmt::Debug for ExpressionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionRule")
            .field("condition", &self.condition)
            .field("filter", &self.filter)
            .field("meta", &self.meta)
            .finish()
    }
}

impl AccessRule for ExpressionRule {
    fn passes(&self, principal: &Principal, resource: &Resource) -> Result<bool> {
        let ctx = EvalContext::new(principal, resource);
        Ok(self.engine.evaluate(&self.program, &ctx)?)
    }

    fn filter(&self, principal: &Principal) -> Result<Predicate> {
        match &self.filter {
            Some(rule) => rule.filter(principal),
            None => Ok(Predicate::True),
        }
    }

    fn priority(&self) -> i32 {
        self.meta.priority
    }

    fn effect(&self) -> RuleEffect {
        self.meta.effect
    }
}
