//! Rule lookup cache
//!
//! Wraps any [`RuleSetProvider`] and keeps the rules it returned, keyed by a
//! BLAKE3 digest of the principal id, its sorted roles, the action and the
//! resource type. Entries expire after a TTL; the map is bounded by capacity.

use super::RuleSetProvider;
use crate::config::CacheSection;
use crate::error::Result;
use crate::rule::RuleRef;
use crate::types::{Action, Principal};
use async_trait::async_trait;
use blake3::Hasher;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache key type (BLAKE3 hash)
type CacheKey = [u8; 32];

#[derive(Clone)]
struct CachedEntry {
    rules: Vec<RuleRef>,
    cached_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Caching decorator over a rule set provider
pub struct CachedRuleProvider<P> {
    inner: P,
    entries: Arc<DashMap<CacheKey, CachedEntry>>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
    expirations: AtomicUsize,
}

impl<P: RuleSetProvider> CachedRuleProvider<P> {
    pub fn new(inner: P, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            entries: Arc::new(DashMap::new()),
            ttl,
            capacity: capacity.max(1),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            expirations: AtomicUsize::new(0),
        }
    }

    /// Build from the `[cache]` config section
    pub fn from_config(inner: P, config: &CacheSection) -> Self {
        Self::new(inner, Duration::from_secs(config.ttl_secs), config.capacity)
    }

    /// The wrapped provider
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Drop every cached lookup; call after rules or assignments change
    pub fn invalidate(&self) {
        self.entries.clear();
        debug!("Rule cache invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len(),
            max_entries: self.capacity,
        }
    }

    fn compute_key(principal: &Principal, action: &Action, resource_type: &str) -> CacheKey {
        let mut hasher = Hasher::new();

        hasher.update(principal.id.as_bytes());
        hasher.update(&[0]);

        let mut roles: Vec<&String> = principal.roles.iter().collect();
        roles.sort();
        roles.dedup();
        for role in roles {
            hasher.update(role.as_bytes());
            hasher.update(&[0]);
        }

        hasher.update(&[1]);
        hasher.update(action.name.as_bytes());
        hasher.update(&[0]);
        hasher.update(resource_type.as_bytes());

        *hasher.finalize().as_bytes()
    }

    fn lookup(&self, key: &CacheKey) -> Option<Vec<RuleRef>> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(self.ttl) {
            drop(entry);
            self.entries.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        Some(entry.rules.clone())
    }

    /// Make room for one entry: expired entries go first, then the oldest one
    fn evict(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));

        if self.entries.len() < self.capacity {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().cached_at)
            .map(|entry| *entry.key());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

#[async_trait]
impl<P: RuleSetProvider> RuleSetProvider for CachedRuleProvider<P> {
    async fn applicable_rules(
        &self,
        principal: &Principal,
        action: &Action,
        resource_type: &str,
    ) -> Result<Vec<RuleRef>> {
        let key = Self::compute_key(principal, action, resource_type);

        if let Some(rules) = self.lookup(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(rules);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let rules = self
            .inner
            .applicable_rules(principal, action, resource_type)
            .await?;

        if self.entries.len() >= self.capacity {
            self.evict();
        }
        self.entries.insert(
            key,
            CachedEntry {
                rules: rules.clone(),
                cached_at: Instant::now(),
            },
        );

        Ok(rules)
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
    pub max_entries: usize,
}
