//! Access control service
//!
//! Thin orchestrator: fetch the applicable rules from the provider, then hand
//! them to the resolver (single check) or the scope compiler (bulk filter),
//! using the settings of the resource type involved.

use crate::config::{AclConfig, ResourceTypeConfig};
use crate::error::{AclError, Result};
use crate::predicate::Predicate;
use crate::provider::RuleSetProvider;
use crate::query::Query;
use crate::resolver::RuleResolver;
use crate::scope::ScopeCompiler;
use crate::types::{Action, Principal, Resource};
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point for access checks and bulk-query filtering
#[derive(Clone)]
pub struct AccessControlService {
    provider: Arc<dyn RuleSetProvider>,
    config: Arc<AclConfig>,
}

impl AccessControlService {
    pub fn new(provider: Arc<dyn RuleSetProvider>, config: AclConfig) -> Self {
        info!(
            "AccessControlService initialized with resolution={}, grouping={}, {} configured resource types",
            config.default_resolution,
            config.default_scope_grouping,
            config.resource_types.len()
        );

        Self {
            provider,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    /// Whether the principal may perform the action on the resource.
    ///
    /// No applicable rule means no access.
    pub async fn can(&self, principal: &Principal, action: &Action, resource: &Resource) -> Result<bool> {
        self.can_with(principal, action, resource, None).await
    }

    /// [`can`](Self::can) with an explicit per-call override of the
    /// resource type's settings
    pub async fn can_with(
        &self,
        principal: &Principal,
        action: &Action,
        resource: &Resource,
        overrides: Option<&ResourceTypeConfig>,
    ) -> Result<bool> {
        let settings = self.config.effective(&resource.resource_type, overrides);
        let rules = self
            .provider
            .applicable_rules(principal, action, &resource.resource_type)
            .await?;

        let allowed = RuleResolver::resolve(&rules, principal, resource, settings.resolution)?;

        info!(
            principal = %principal.id,
            %action,
            resource_type = %resource.resource_type,
            strategy = %settings.resolution,
            rules = rules.len(),
            allowed,
            "Access check"
        );

        Ok(allowed)
    }

    /// Composite filter for the rows of a resource type the principal may act on
    pub async fn scope_for(&self, principal: &Principal, action: &Action, resource_type: &str) -> Result<Predicate> {
        self.scope_for_with(principal, action, resource_type, None).await
    }

    /// [`scope_for`](Self::scope_for) with an explicit per-call override
    pub async fn scope_for_with(
        &self,
        principal: &Principal,
        action: &Action,
        resource_type: &str,
        overrides: Option<&ResourceTypeConfig>,
    ) -> Result<Predicate> {
        let settings = self.config.effective(resource_type, overrides);
        let rules = self
            .provider
            .applicable_rules(principal, action, resource_type)
            .await?;

        ScopeCompiler::compile(
            &rules,
            principal,
            settings.scope_grouping,
            settings.fallback_column.as_deref(),
        )
    }

    /// Narrow a bulk query to what the principal may act on.
    ///
    /// The resource type comes from `base` when given, otherwise from
    /// `resource_type`; with neither the call fails with
    /// [`AclError::InvalidInput`].
    pub async fn filter_query(
        &self,
        principal: &Principal,
        action: &Action,
        base: Option<Query>,
        resource_type: Option<&str>,
    ) -> Result<Query> {
        self.filter_query_with(principal, action, base, resource_type, None)
            .await
    }

    /// [`filter_query`](Self::filter_query) with an explicit per-call override
    pub async fn filter_query_with(
        &self,
        principal: &Principal,
        action: &Action,
        base: Option<Query>,
        resource_type: Option<&str>,
        overrides: Option<&ResourceTypeConfig>,
    ) -> Result<Query> {
        let query = match (base, resource_type) {
            (Some(query), _) => query,
            (None, Some(resource_type)) => Query::new(resource_type),
            (None, None) => {
                return Err(AclError::InvalidInput(
                    "filter_query needs a base query or a resource type".to_string(),
                ))
            }
        };

        let predicate = self
            .scope_for_with(principal, action, query.resource_type(), overrides)
            .await?;

        debug!(
            principal = %principal.id,
            %action,
            resource_type = query.resource_type(),
            filter = %predicate,
            "Filtering query"
        );

        Ok(query.and_where(predicate))
    }
}
