//! Rule set providers
//!
//! A provider answers one question: which rules apply to this principal,
//! action and resource type? The access control core never fetches or caches
//! rules itself.

pub mod cache;
pub mod memory;

pub use cache::{CacheStats, CachedRuleProvider};
pub use memory::{Assignee, Assignment, InMemoryRuleStore, RuleSeed};

use crate::error::Result;
use crate::rule::RuleRef;
use crate::types::{Action, Principal};
use async_trait::async_trait;

/// Source of the rules that apply to a request
#[async_trait]
pub trait RuleSetProvider: Send + Sync {
    /// Deduplicated rules for a principal, action and resource type
    async fn applicable_rules(
        &self,
        principal: &Principal,
        action: &Action,
        resource_type: &str,
    ) -> Result<Vec<RuleRef>>;
}
