//! Evaluation context for CEL expressions

use crate::types::{Principal, Resource};
use serde_json::{Map, Value};

/// Variables visible to a condition.
///
/// `principal` (alias `P`) exposes `id`, `roles` and every principal
/// attribute; `resource` (alias `R`) exposes `type` and every resource field.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    principal: Map<String, Value>,
    resource: Map<String, Value>,
}

impl EvalContext {
    /// Build the context for one principal/resource pair
    pub fn new(principal: &Principal, resource: &Resource) -> Self {
        let mut principal_vars = principal.attributes.clone();
        principal_vars.insert("id".to_string(), Value::String(principal.id.clone()));
        principal_vars.insert("roles".to_string(), Value::from(principal.roles.clone()));

        let mut resource_vars = resource.attributes.clone();
        resource_vars
            .entry("type")
            .or_insert_with(|| Value::String(resource.resource_type.clone()));

        Self {
            principal: principal_vars,
            resource: resource_vars,
        }
    }

    /// Variables as name/value pairs, aliases included
    pub fn variables(&self) -> [(&'static str, Value); 4] {
        let principal = Value::Object(self.principal.clone());
        let resource = Value::Object(self.resource.clone());

        [
            ("principal", principal.clone()),
            ("P", principal),
            ("resource", resource.clone()),
            ("R", resource),
        ]
    }
}
