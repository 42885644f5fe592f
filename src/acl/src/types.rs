//! Core access control types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Look up a dotted path (`department.id`) inside an attribute map.
pub(crate) fn lookup_path<'a>(attributes: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = attributes.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Principal (user, role, service account) being checked for access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier (e.g., "42", "user:alice@example.com")
    pub id: String,

    /// Roles the principal holds; rules assigned to a role apply to its members
    #[serde(default)]
    pub roles: Vec<String>,

    /// Additional attributes (e.g., department_id, region)
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Principal {
    /// Create a new principal
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Add a role to the principal
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Add an attribute to the principal
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Resolve an attribute by dotted path.
    ///
    /// `id` falls back to the principal identifier when no attribute of that
    /// name is set.
    pub fn attribute(&self, path: &str) -> Option<Value> {
        if let Some(value) = lookup_path(&self.attributes, path) {
            return Some(value.clone());
        }

        match path {
            "id" => Some(Value::String(self.id.clone())),
            "roles" => Some(Value::from(self.roles.clone())),
            _ => None,
        }
    }
}

/// Resource being accessed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type (e.g., "ticket", "invoice")
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Resource fields (e.g., owner, status, created_at)
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Resource {
    /// Create a new resource of the given type
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: Map::new(),
        }
    }

    /// Add an attribute to the resource
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Resolve an attribute by dotted path
    pub fn attribute(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.attributes, path)
    }
}

/// Action being performed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    /// Action name (view, update, delete, etc.)
    pub name: String,
}

impl Action {
    /// Create a new action
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_principal_attribute_lookup() {
        let principal = Principal::new("42")
            .with_role("support")
            .with_attribute("department", json!({"id": 7, "name": "billing"}));

        assert_eq!(principal.attribute("department.id"), Some(json!(7)));
        assert_eq!(principal.attribute("id"), Some(json!("42")));
        assert_eq!(principal.attribute("roles"), Some(json!(["support"])));
        assert_eq!(principal.attribute("missing"), None);
    }

    #[test]
    fn test_principal_id_attribute_overrides_identifier() {
        let principal = Principal::new("user:alice").with_attribute("id", 42);
        assert_eq!(principal.attribute("id"), Some(json!(42)));
    }

    #[test]
    fn test_resource_creation() {
        let resource = Resource::new("ticket")
            .with_attribute("owner_id", 42)
            .with_attribute("tags", json!(["urgent", "vip"]));

        assert_eq!(resource.resource_type, "ticket");
        assert_eq!(resource.attribute("owner_id"), Some(&json!(42)));
        assert_eq!(resource.attribute("tags.1"), Some(&json!("vip")));
        assert_eq!(resource.attribute("owner_id.nested"), None);
    }

    #[test]
    fn test_resource_deserializes_type_field() {
        let resource: Resource =
            serde_json::from_value(json!({"type": "ticket", "attributes": {"status": "open"}}))
                .unwrap();
        assert_eq!(resource.resource_type, "ticket");
        assert_eq!(resource.attribute("status"), Some(&json!("open")));
    }
}
