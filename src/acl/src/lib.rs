//! # CretoAI Access Control
//!
//! Per-resource access control driven by pluggable rules.
//!
//! ## Features
//!
//! - **Rule resolution** with `any`, `all` and `priority` strategies
//! - **Scope compilation** of rules into a bulk-query filter (`and` / `or` grouping)
//! - **Built-in rule kinds**: attribute, date range, ownership, status and CEL expressions
//! - **Rule registry** for host-defined kinds
//! - **Async rule providers** with an in-memory store and a TTL cache decorator
//! - **Before-authorization hook** with a grant / deny / abstain outcome
//!
//! ## Example
//!
//! ```rust
//! use cretoai_acl::provider::{Assignee, InMemoryRuleStore};
//! use cretoai_acl::{AccessControlService, AclConfig, Action, Principal, Resource, RuleDefinition};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryRuleStore::new();
//!     store
//!         .put_rule(
//!             RuleDefinition::new(1, "view_ticket", "status")
//!                 .with_settings(json!({"statuses": ["open"]})),
//!         )
//!         .await;
//!     store.assign(1, Assignee::Role("agent".into())).await?;
//!
//!     let service = AccessControlService::new(Arc::new(store), AclConfig::default());
//!     let agent = Principal::new("42").with_role("agent");
//!     let ticket = Resource::new("ticket").with_attribute("status", "open");
//!
//!     assert!(service.can(&agent, &Action::new("view"), &ticket).await?);
//!
//!     let query = service
//!         .filter_query(&agent, &Action::new("view"), None, Some("ticket"))
//!         .await?;
//!     assert_eq!(query.where_clause(), "status IN ('open')");
//!
//!     Ok(())
//! }
//! ```

pub mod cel;
pub mod config;
pub mod error;
pub mod hook;
pub mod predicate;
pub mod provider;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod rule;
pub mod scope;
pub mod service;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use config::{AclConfig, EffectiveConfig, ResourceTypeConfig};
pub use error::{AclError, Result};
pub use hook::{BeforeAuthorization, HookOutcome};
pub use predicate::{CompareOp, Predicate};
pub use provider::RuleSetProvider;
pub use query::Query;
pub use registry::{RuleDefinition, RuleParams, RuleRegistry};
pub use resolver::{ResolutionStrategy, RuleResolver};
pub use rule::{AccessRule, RuleEffect, RuleMeta, RuleRef};
pub use scope::{GroupingStrategy, ScopeCompiler};
pub use service::AccessControlService;
pub use types::{Action, Principal, Resource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
