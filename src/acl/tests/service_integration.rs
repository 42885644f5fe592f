//! End-to-end tests through the access control service

use cretoai_acl::provider::{Assignee, CachedRuleProvider, InMemoryRuleStore, RuleSeed};
use cretoai_acl::rule::CustomRule;
use cretoai_acl::{
    AccessControlService, AclConfig, AclError, Action, BeforeAuthorization, GroupingStrategy,
    HookOutcome, Predicate, Principal, Query, ResolutionStrategy, Resource, ResourceTypeConfig,
    RuleDefinition, RuleRef, RuleRegistry,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// FIXTURES
// ============================================================================

fn config() -> AclConfig {
    AclConfig::from_toml_str(
        r#"
[resource_types.ticket]
fallback_column = "owner_id"
"#,
    )
    .unwrap()
}

fn seed() -> RuleSeed {
    serde_json::from_value(json!({
        "rules": [
            {"id": 1, "name": "Open tickets", "key": "view_ticket", "kind": "status",
             "settings": {"statuses": ["open", "pending"]}, "resource_type": "ticket", "priority": 5},
            {"id": 2, "name": "Own tickets", "key": "view_ticket", "kind": "ownership",
             "settings": {"owner_column": "owner_id"}, "resource_type": "ticket", "priority": 1},
            {"id": 3, "name": "No archived tickets", "key": "view_ticket", "kind": "status",
             "settings": {"statuses": ["archived"]}, "resource_type": "ticket", "priority": 10,
             "is_deny": true},
            {"id": 4, "name": "Same department", "key": "update_ticket", "kind": "attribute",
             "settings": {"model_attribute": "department_id", "user_attribute": "department_id"},
             "resource_type": "ticket"}
        ],
        "assignments": [
            {"rule_id": 1, "assignee": {"role": "agent"}},
            {"rule_id": 2, "assignee": {"role": "agent"}},
            {"rule_id": 3, "assignee": {"role": "agent"}},
            {"rule_id": 4, "assignee": {"principal": "42"}}
        ]
    }))
    .unwrap()
}

async fn service_with(config: AclConfig) -> (Arc<InMemoryRuleStore>, AccessControlService) {
    let store = Arc::new(InMemoryRuleStore::new());
    store.load_seed(seed()).await.unwrap();
    let service = AccessControlService::new(store.clone(), config);
    (store, service)
}

fn agent() -> Principal {
    Principal::new("42")
        .with_role("agent")
        .with_attribute("department_id", 7)
}

fn ticket(status: &str, owner: u64) -> Resource {
    Resource::new("ticket")
        .with_attribute("status", status)
        .with_attribute("owner_id", owner)
        .with_attribute("department_id", 7)
}

// ============================================================================
// SINGLE CHECKS
// ============================================================================

#[tokio::test]
async fn test_any_strategy_grants_on_one_passing_rule() {
    let (_, service) = service_with(config()).await;
    let view = Action::new("view");

    assert!(service.can(&agent(), &view, &ticket("open", 7)).await.unwrap());
    assert!(service.can(&agent(), &view, &ticket("closed", 42)).await.unwrap());
    assert!(!service.can(&agent(), &view, &ticket("closed", 7)).await.unwrap());
}

#[tokio::test]
async fn test_deny_rule_vetoes() {
    let (_, service) = service_with(config()).await;
    let view = Action::new("view");

    assert!(!service.can(&agent(), &view, &ticket("archived", 42)).await.unwrap());
}

#[tokio::test]
async fn test_no_rules_means_no_access() {
    let (_, service) = service_with(config()).await;
    let outsider = Principal::new("99");

    assert!(!service.can(&outsider, &Action::new("view"), &ticket("open", 99)).await.unwrap());
    assert!(!service.can(&agent(), &Action::new("delete"), &ticket("open", 42)).await.unwrap());
}

#[tokio::test]
async fn test_configured_strategy_and_call_override() {
    let config = AclConfig::from_toml_str(
        r#"
[resource_types.ticket]
resolution = "all"
"#,
    )
    .unwrap();
    let (_, service) = service_with(config).await;
    let view = Action::new("view");
    let open_not_mine = ticket("open", 7);

    assert!(!service.can(&agent(), &view, &open_not_mine).await.unwrap());

    let overrides = ResourceTypeConfig {
        resolution: Some(ResolutionStrategy::Any),
        ..Default::default()
    };
    assert!(service
        .can_with(&agent(), &view, &open_not_mine, Some(&overrides))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_direct_assignment_and_action_prefix() {
    let (_, service) = service_with(config()).await;
    let update = Action::new("update");

    assert!(service.can(&agent(), &update, &ticket("open", 7)).await.unwrap());

    let other_department = ticket("open", 7).with_attribute("department_id", 8);
    assert!(!service.can(&agent(), &update, &other_department).await.unwrap());

    let colleague = Principal::new("43").with_role("agent");
    assert!(!service.can(&colleague, &update, &ticket("open", 7)).await.unwrap());
}

#[tokio::test]
async fn test_evaluation_errors_propagate() {
    let store = InMemoryRuleStore::new();
    store
        .put_rule(
            RuleDefinition::new(1, "view", "date_range")
                .with_settings(json!({"from": "2024-01-01", "date_column": "created_at"})),
        )
        .await;
    store.assign(1, Assignee::Principal("42".into())).await.unwrap();
    let service = AccessControlService::new(Arc::new(store), AclConfig::default());

    let undated = Resource::new("ticket");
    let result = service.can(&agent(), &Action::new("view"), &undated).await;
    assert!(matches!(result, Err(AclError::Evaluation(_))));
}

#[tokio::test]
async fn test_unknown_rule_kind_fails_loudly() {
    let store = InMemoryRuleStore::new();
    store.put_rule(RuleDefinition::new(1, "view", "geofence")).await;
    store.assign(1, Assignee::Principal("42".into())).await.unwrap();
    let service = AccessControlService::new(Arc::new(store), AclConfig::default());

    let result = service.can(&agent(), &Action::new("view"), &ticket("open", 42)).await;
    assert!(matches!(result, Err(AclError::RuleInstantiation(_))));
}

#[tokio::test]
async fn test_host_registered_kind() {
    let mut registry = RuleRegistry::with_builtins();
    registry.register("business_hours", |params| {
        let open = params.settings.get("open").and_then(|v| v.as_bool()).unwrap_or(false);
        Ok(Arc::new(CustomRule::new("business_hours", move |_, _| Ok(open)).with_meta(params.meta)) as RuleRef)
    });

    let store = InMemoryRuleStore::with_registry(registry);
    store
        .put_rule(RuleDefinition::new(1, "view", "business_hours").with_settings(json!({"open": true})))
        .await;
    store.assign(1, Assignee::Role("agent".into())).await.unwrap();
    let service = AccessControlService::new(Arc::new(store), AclConfig::default());

    assert!(service.can(&agent(), &Action::new("view"), &ticket("open", 1)).await.unwrap());
}

#[tokio::test]
async fn test_expression_rule_end_to_end() {
    let store = InMemoryRuleStore::new();
    store
        .put_rule(RuleDefinition::new(1, "view", "expression").with_settings(json!({
            "condition": "'supervisor' in P.roles || R.region == P.region",
            "filter": {"model_attribute": "region", "user_attribute": "region"}
        })))
        .await;
    store.assign(1, Assignee::Principal("5".into())).await.unwrap();
    let service = AccessControlService::new(Arc::new(store), AclConfig::default());

    let principal = Principal::new("5").with_attribute("region", "eu");
    let view = Action::new("view");
    let eu = Resource::new("ticket").with_attribute("region", "eu");
    let us = Resource::new("ticket").with_attribute("region", "us");

    assert!(service.can(&principal, &view, &eu).await.unwrap());
    assert!(!service.can(&principal, &view, &us).await.unwrap());
    assert_eq!(
        service.scope_for(&principal, &view, "ticket").await.unwrap().to_string(),
        "region = 'eu'"
    );
}

// ============================================================================
// BULK FILTERS
// ============================================================================

#[tokio::test]
async fn test_filter_query_and_grouping() {
    let (_, service) = service_with(config()).await;

    let query = service
        .filter_query(&agent(), &Action::new("view"), None, Some("ticket"))
        .await
        .unwrap();

    assert_eq!(
        query.where_clause(),
        "status IN ('open', 'pending') AND owner_id = '42'"
    );
}

#[tokio::test]
async fn test_filter_query_or_grouping_and_in_memory_apply() {
    let config = AclConfig::from_toml_str(
        r#"
[resource_types.ticket]
scope_grouping = "or"
"#,
    )
    .unwrap();
    let (_, service) = service_with(config).await;

    let query = service
        .filter_query(&agent(), &Action::new("view"), None, Some("ticket"))
        .await
        .unwrap();
    assert_eq!(
        query.where_clause(),
        "status IN ('open', 'pending') OR owner_id = '42'"
    );

    let rows = vec![ticket("open", 7), ticket("closed", 42), ticket("closed", 7)];
    assert_eq!(query.apply(&rows).len(), 2);
}

#[tokio::test]
async fn test_filter_query_keeps_base_conditions() {
    let (_, service) = service_with(config()).await;
    let base = Query::new("ticket").and_where(Predicate::eq("team", "support"));

    let query = service
        .filter_query(&agent(), &Action::new("view"), Some(base), Some("invoice"))
        .await
        .unwrap();

    assert_eq!(query.resource_type(), "ticket");
    assert_eq!(
        query.where_clause(),
        "team = 'support' AND status IN ('open', 'pending') AND owner_id = '42'"
    );
}

#[tokio::test]
async fn test_filter_query_fallbacks() {
    let (_, service) = service_with(config()).await;
    let outsider = Principal::new("99");

    let query = service
        .filter_query(&outsider, &Action::new("view"), None, Some("ticket"))
        .await
        .unwrap();
    assert_eq!(query.where_clause(), "owner_id = '99'");

    let query = service
        .filter_query(&outsider, &Action::new("view"), None, Some("invoice"))
        .await
        .unwrap();
    assert!(query.predicate().is_unrestricted());
}

#[tokio::test]
async fn test_filter_query_needs_a_resource_type() {
    let (_, service) = service_with(config()).await;

    let result = service
        .filter_query(&agent(), &Action::new("view"), None, None)
        .await;
    assert!(matches!(result, Err(AclError::InvalidInput(_))));
}

#[tokio::test]
async fn test_grouping_override_per_call() {
    let (_, service) = service_with(config()).await;
    let overrides = ResourceTypeConfig {
        scope_grouping: Some(GroupingStrategy::Or),
        ..Default::default()
    };

    let query = service
        .filter_query_with(&agent(), &Action::new("view"), None, Some("ticket"), Some(&overrides))
        .await
        .unwrap();
    assert!(matches!(query.predicate(), Predicate::Or(_)));
}

// ============================================================================
// ROLE INHERITANCE AND CACHING
// ============================================================================

#[tokio::test]
async fn test_rules_reached_twice_count_once() {
    let (store, service) = service_with(config()).await;
    store.assign(1, Assignee::Principal("42".into())).await.unwrap();
    store.assign(1, Assignee::Role("lead".into())).await.unwrap();

    let principal = agent().with_role("lead");
    let query = service
        .filter_query(&principal, &Action::new("view"), None, Some("ticket"))
        .await
        .unwrap();

    assert_eq!(
        query.where_clause(),
        "status IN ('open', 'pending') AND owner_id = '42'"
    );
}

#[tokio::test]
async fn test_cached_provider_behind_service() {
    let store = InMemoryRuleStore::new();
    store.load_seed(seed()).await.unwrap();
    let cached = Arc::new(CachedRuleProvider::new(store, Duration::from_secs(60), 100));
    let service = AccessControlService::new(cached.clone(), config());
    let view = Action::new("view");

    assert!(service.can(&agent(), &view, &ticket("open", 7)).await.unwrap());
    assert!(service.can(&agent(), &view, &ticket("open", 7)).await.unwrap());
    assert_eq!(cached.stats().hits, 1);

    cached.inner().sync_assignments(&Assignee::Role("agent".into()), &[]).await.unwrap();
    assert!(service.can(&agent(), &view, &ticket("open", 7)).await.unwrap());

    cached.invalidate();
    assert!(!service.can(&agent(), &view, &ticket("open", 7)).await.unwrap());
}

// ============================================================================
// AUTHORIZATION HOOK
// ============================================================================

#[tokio::test]
async fn test_hook_grants_or_abstains() {
    let (_, service) = service_with(config()).await;
    let view = Action::new("view");

    assert_eq!(
        service.before_authorization(&agent(), &view, Some(&ticket("open", 7))).await,
        HookOutcome::Grant
    );
    assert_eq!(
        service.before_authorization(&agent(), &view, Some(&ticket("closed", 7))).await,
        HookOutcome::Abstain
    );
    assert_eq!(service.before_authorization(&agent(), &view, None).await, HookOutcome::Abstain);

    let invoice = Resource::new("invoice").with_attribute("status", "open");
    assert_eq!(
        service.before_authorization(&agent(), &view, Some(&invoice)).await,
        HookOutcome::Abstain
    );
}

#[tokio::test]
async fn test_authoritative_hook_denies() {
    let mut config = config();
    config.integrations.authoritative_hook = true;
    let (_, service) = service_with(config).await;

    let outcome = service
        .before_authorization(&agent(), &Action::new("view"), Some(&ticket("closed", 7)))
        .await;
    assert_eq!(outcome, HookOutcome::Deny);
    assert_eq!(outcome.decision(), Some(false));
}

#[tokio::test]
async fn test_hook_respects_integration_switches() {
    let mut disabled = config();
    disabled.integrations.authorization_hook = false;
    let (_, service) = service_with(disabled).await;
    assert_eq!(
        service
            .before_authorization(&agent(), &Action::new("view"), Some(&ticket("open", 7)))
            .await,
        HookOutcome::Abstain
    );

    let opted_out = AclConfig::from_toml_str(
        r#"
[resource_types.ticket]
integrate_with_policies = false
"#,
    )
    .unwrap();
    let (_, service) = service_with(opted_out).await;
    assert_eq!(
        service
            .before_authorization(&agent(), &Action::new("view"), Some(&ticket("open", 7)))
            .await,
        HookOutcome::Abstain
    );
}

#[tokio::test]
async fn test_hook_swallows_errors_unless_authoritative() {
    let store = InMemoryRuleStore::new();
    store.put_rule(RuleDefinition::new(1, "view", "geofence")).await;
    store.assign(1, Assignee::Principal("42".into())).await.unwrap();
    let store = Arc::new(store);

    let service = AccessControlService::new(store.clone(), config());
    let outcome = service
        .before_authorization(&agent(), &Action::new("view"), Some(&ticket("open", 42)))
        .await;
    assert_eq!(outcome, HookOutcome::Abstain);

    let mut authoritative = config();
    authoritative.integrations.authoritative_hook = true;
    let service = AccessControlService::new(store, authoritative);
    let outcome = service
        .before_authorization(&agent(), &Action::new("view"), Some(&ticket("open", 42)))
        .await;
    assert_eq!(outcome, HookOutcome::Deny);
}
