//! Access control configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! default_resolution = "any"
//! default_scope_grouping = "and"
//!
//! [integrations]
//! authorization_hook = true
//! authoritative_hook = false
//!
//! [cache]
//! enabled = true
//! ttl_secs = 3600
//!
//! [resource_types.ticket]
//! resolution = "priority"
//! fallback_column = "assignee_id"
//! ```

use crate::error::{AclError, Result};
use crate::resolver::ResolutionStrategy;
use crate::scope::GroupingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_capacity() -> usize {
    10_000
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AclConfig {
    /// Resolution strategy for resource types without their own
    #[serde(default)]
    pub default_resolution: ResolutionStrategy,

    /// Scope grouping for resource types without their own
    #[serde(default)]
    pub default_scope_grouping: GroupingStrategy,

    #[serde(default)]
    pub integrations: IntegrationsSection,

    #[serde(default)]
    pub cache: CacheSection,

    /// Per resource type settings, keyed by resource type
    #[serde(default)]
    pub resource_types: HashMap<String, ResourceTypeConfig>,
}

/// Host framework integration switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationsSection {
    /// Whether the before-authorization hook participates at all
    #[serde(default = "default_true")]
    pub authorization_hook: bool,

    /// Default for resource types that don't set `integrate_with_policies`
    #[serde(default = "default_true")]
    pub integrate_with_policies: bool,

    /// Whether rules assigned to a role apply to its members
    #[serde(default = "default_true")]
    pub role_inheritance: bool,

    /// Whether a denied hook check is final instead of abstaining
    #[serde(default)]
    pub authoritative_hook: bool,
}

impl Default for IntegrationsSection {
    fn default() -> Self {
        Self {
            authorization_hook: true,
            integrate_with_policies: true,
            role_inheritance: true,
            authoritative_hook: false,
        }
    }
}

/// Rule lookup cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry time-to-live in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of cached lookups
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
        }
    }
}

/// Per resource type settings.
///
/// Every field is optional; unset fields fall through to the global
/// defaults. The same shape is accepted as an explicit per-call override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceTypeConfig {
    #[serde(default)]
    pub resolution: Option<ResolutionStrategy>,

    #[serde(default)]
    pub scope_grouping: Option<GroupingStrategy>,

    /// Column matched against the principal id when no rule applies
    #[serde(default)]
    pub fallback_column: Option<String>,

    #[serde(default)]
    pub integrate_with_policies: Option<bool>,
}

impl ResourceTypeConfig {
    /// Fields set in `other` win over fields set here
    fn layered(&self, other: &ResourceTypeConfig) -> ResourceTypeConfig {
        ResourceTypeConfig {
            resolution: other.resolution.or(self.resolution),
            scope_grouping: other.scope_grouping.or(self.scope_grouping),
            fallback_column: other
                .fallback_column
                .clone()
                .or_else(|| self.fallback_column.clone()),
            integrate_with_policies: other.integrate_with_policies.or(self.integrate_with_policies),
        }
    }
}

/// Fully resolved settings for one resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub resolution: ResolutionStrategy,
    pub scope_grouping: GroupingStrategy,
    pub fallback_column: Option<String>,
    pub integrate_with_policies: bool,
}

impl AclConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        info!(
            "Loaded access control config from {} ({} resource types)",
            path.display(),
            config.resource_types.len()
        );
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| AclError::Config(e.to_string()))
    }

    /// Apply `ACL_RESOLUTION`, `ACL_SCOPE_GROUPING`, `ACL_CACHE` and `ACL_CACHE_TTL`
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("ACL_RESOLUTION") {
            self.default_resolution = ResolutionStrategy::parse_lenient(&value);
        }
        if let Some(value) = lookup("ACL_SCOPE_GROUPING") {
            self.default_scope_grouping = GroupingStrategy::parse_lenient(&value);
        }
        if let Some(value) = lookup("ACL_CACHE") {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.cache.enabled = true,
                "0" | "false" | "no" | "off" => self.cache.enabled = false,
                other => warn!("Ignoring invalid ACL_CACHE value '{}'", other),
            }
        }
        if let Some(value) = lookup("ACL_CACHE_TTL") {
            match value.trim().parse() {
                Ok(ttl) => self.cache.ttl_secs = ttl,
                Err(_) => warn!("Ignoring invalid ACL_CACHE_TTL value '{}'", value),
            }
        }
        self
    }

    /// Whether a resource type has its own entry
    pub fn is_configured(&self, resource_type: &str) -> bool {
        self.resource_types.contains_key(resource_type)
    }

    /// Settings for a resource type: the explicit override, then the
    /// resource type's entry, then the global defaults
    pub fn effective(&self, resource_type: &str, overrides: Option<&ResourceTypeConfig>) -> EffectiveConfig {
        let configured = self
            .resource_types
            .get(resource_type)
            .cloned()
            .unwrap_or_default();
        let merged = match overrides {
            Some(overrides) => configured.layered(overrides),
            None => configured,
        };

        EffectiveConfig {
            resolution: merged.resolution.unwrap_or(self.default_resolution),
            scope_grouping: merged.scope_grouping.unwrap_or(self.default_scope_grouping),
            fallback_column: merged.fallback_column,
            integrate_with_policies: merged
                .integrate_with_policies
                .unwrap_or(self.integrations.integrate_with_policies),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AclConfig::from_toml_str("").unwrap();
        assert_eq!(config, AclConfig::default());

        let effective = config.effective("ticket", None);
        assert_eq!(effective.resolution, ResolutionStrategy::Any);
        assert_eq!(effective.scope_grouping, GroupingStrategy::And);
        assert_eq!(effective.fallback_column, None);
        assert!(effective.integrate_with_policies);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 3600);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_resolution = "all"

[integrations]
authoritative_hook = true

[cache]
enabled = false

[resource_types.ticket]
resolution = "priority"
scope_grouping = "or"
fallback_column = "assignee_id"
"#
        )
        .unwrap();

        let config = AclConfig::load(file.path()).unwrap();
        assert!(config.integrations.authoritative_hook);
        assert!(!config.cache.enabled);
        assert!(config.is_configured("ticket"));

        let ticket = config.effective("ticket", None);
        assert_eq!(ticket.resolution, ResolutionStrategy::Priority);
        assert_eq!(ticket.scope_grouping, GroupingStrategy::Or);
        assert_eq!(ticket.fallback_column.as_deref(), Some("assignee_id"));

        let invoice = config.effective("invoice", None);
        assert_eq!(invoice.resolution, ResolutionStrategy::All);
        assert_eq!(invoice.fallback_column, None);
    }

    #[test]
    fn test_overrides_win() {
        let config = AclConfig::from_toml_str(
            r#"
[resource_types.ticket]
resolution = "priority"
fallback_column = "assignee_id"
"#,
        )
        .unwrap();

        let overrides = ResourceTypeConfig {
            resolution: Some(ResolutionStrategy::All),
            integrate_with_policies: Some(false),
            ..Default::default()
        };
        let effective = config.effective("ticket", Some(&overrides));

        assert_eq!(effective.resolution, ResolutionStrategy::All);
        assert_eq!(effective.fallback_column.as_deref(), Some("assignee_id"));
        assert!(!effective.integrate_with_policies);
    }

    #[test]
    fn test_malformed_strategies_fall_back() {
        let config = AclConfig::from_toml_str(
            r#"
default_resolution = "most"
default_scope_grouping = "xor"
"#,
        )
        .unwrap();

        assert_eq!(config.default_resolution, ResolutionStrategy::Any);
        assert_eq!(config.default_scope_grouping, GroupingStrategy::And);
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let result = AclConfig::from_toml_str("default_resolution = [");
        assert!(matches!(result, Err(AclError::Config(_))));
    }

    #[test]
    fn test_env_style_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ACL_RESOLUTION", "priority"),
            ("ACL_SCOPE_GROUPING", "or"),
            ("ACL_CACHE", "off"),
            ("ACL_CACHE_TTL", "60"),
        ]
        .into_iter()
        .collect();

        let config = AclConfig::default().apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.default_resolution, ResolutionStrategy::Priority);
        assert_eq!(config.default_scope_grouping, GroupingStrategy::Or);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 60);
    }
}
