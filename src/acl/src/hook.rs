//! Before-authorization hook
//!
//! Lets a host authorization framework consult the rules before its own
//! checks run. The outcome is tri-state: the hook may grant, deny, or step
//! aside and let the host decide.

use crate::service::AccessControlService;
use crate::types::{Action, Principal, Resource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Result of the before-authorization hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookOutcome {
    /// Access granted; the host should stop checking
    Grant,
    /// Access denied; the host should stop checking
    Deny,
    /// No opinion; the host continues with its own checks
    Abstain,
}

impl HookOutcome {
    /// `Some(decision)` for a final outcome, `None` when abstaining
    pub fn decision(self) -> Option<bool> {
        match self {
            Self::Grant => Some(true),
            Self::Deny => Some(false),
            Self::Abstain => None,
        }
    }
}

/// Hook consulted before the host framework's own authorization
#[async_trait]
pub trait BeforeAuthorization: Send + Sync {
    async fn before_authorization(
        &self,
        principal: &Principal,
        ability: &Action,
        resource: Option<&Resource>,
    ) -> HookOutcome;
}

#[async_trait]
impl BeforeAuthorization for AccessControlService {
    async fn before_authorization(
        &self,
        principal: &Principal,
        ability: &Action,
        resource: Option<&Resource>,
    ) -> HookOutcome {
        let config = self.config();

        if !config.integrations.authorization_hook {
            return HookOutcome::Abstain;
        }
        let Some(resource) = resource else {
            return HookOutcome::Abstain;
        };
        if !config.is_configured(&resource.resource_type) {
            debug!(resource_type = %resource.resource_type, "Resource type not configured, hook abstains");
            return HookOutcome::Abstain;
        }
        if !config.effective(&resource.resource_type, None).integrate_with_policies {
            return HookOutcome::Abstain;
        }

        let authoritative = config.integrations.authoritative_hook;
        match self.can(principal, ability, resource).await {
            Ok(true) => HookOutcome::Grant,
            Ok(false) if authoritative => HookOutcome::Deny,
            Ok(false) => HookOutcome::Abstain,
            Err(e) => {
                error!(
                    principal = %principal.id,
                    %ability,
                    resource_type = %resource.resource_type,
                    "Access check failed in authorization hook: {}",
                    e
                );
                if authoritative {
                    HookOutcome::Deny
                } else {
                    HookOutcome::Abstain
                }
            }
        }
    }
}
