// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Time-bounded memoization of template lookups.
//!
//! Template rows change rarely and are fetched on every generation request,
//! so lookups are memoized per (cloud, resource type, module version) key.
//! Entries expire after [`TEMPLATE_CACHE_TTL`] and are never invalidated
//! explicitly: an updated template row becomes visible only once the TTL
//! lapses. Beyond [`TEMPLATE_CACHE_CAPACITY`] distinct keys the
//! least-recently-used entry is evicted.
//!
//! Concurrent misses for the same key may each hit the backing store; the
//! last fetch wins the cache slot. That stampede is accepted rather than
//! guarded with per-key locks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::store::Store;

/// How long a cached template stays valid.
pub const TEMPLATE_CACHE_TTL: Duration = Duration::from_secs(600);

/// Maximum number of distinct template keys held at once.
pub const TEMPLATE_CACHE_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TemplateKey {
    cloud_id: String,
    resource_type: String,
    module_version: String,
}

#[derive(Debug)]
struct CacheEntry {
    text: String,
    fetched_at: Instant,
    last_used: Instant,
}

/// Bounded TTL cache in front of [`Store::fetch_template`].
#[derive(Debug)]
pub struct TemplateCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<TemplateKey, CacheEntry>>,
}

impl TemplateCache {
    /// Create a cache with the default TTL and capacity.
    pub fn new() -> Self {
        Self::with_limits(TEMPLATE_CACHE_TTL, TEMPLATE_CACHE_CAPACITY)
    }

    /// Create a cache with explicit limits.
    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a template, from cache when fresh, from the store otherwise.
    ///
    /// Returns `None` when no template row matches. Backing-store faults are
    /// logged and also map to `None`; the caller cannot distinguish a missing
    /// template from an unreachable template table, and treats both as
    /// "template missing".
    pub async fn get(
        &self,
        store: &dyn Store,
        cloud_id: &str,
        resource_type: &str,
        module_version: &str,
    ) -> Option<String> {
        let key = TemplateKey {
            cloud_id: cloud_id.to_string(),
            resource_type: resource_type.to_string(),
            module_version: module_version.to_string(),
        };

        if let Some(text) = self.lookup(&key) {
            debug!(cloud_id, resource_type, module_version, "Template cache hit");
            return Some(text);
        }

        let fetched = match store
            .fetch_template(cloud_id, resource_type, module_version)
            .await
        {
            Ok(template) => template,
            Err(e) => {
                warn!(
                    cloud_id,
                    resource_type,
                    module_version,
                    error = %e,
                    "Template fetch failed; treating as missing"
                );
                return None;
            }
        };

        if let Some(text) = &fetched {
            self.insert(key, text.clone());
        }
        fetched
    }

    /// Return the cached text for a key if present and fresh.
    ///
    /// Stale entries are evicted on sight.
    fn lookup(&self, key: &TemplateKey) -> Option<String> {
        let mut entries = self.entries.lock().expect("template cache poisoned");
        match entries.get_mut(key) {
            Some(entry) if entry.fetched_at.elapsed() <= self.ttl => {
                entry.last_used = Instant::now();
                Some(entry.text.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&self, key: TemplateKey, text: String) {
        let mut entries = self.entries.lock().expect("template cache poisoned");
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        let now = Instant::now();
        entries.insert(
            key,
            CacheEntry {
                text,
                fetched_at: now,
                last_used: now,
            },
        );
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().expect("template cache poisoned").len()
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}
