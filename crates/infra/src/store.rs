//! In-memory entity stores.
//!
//! Entities are held behind `Arc<Mutex<_>>` so the same live handle can be
//! tracked by the unit of work: handler mutations and relay scans observe one
//! state.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, RwLock};

use campushub_auth::{TenantContext, TenantDirectory};
use campushub_core::TenantId;
use campushub_tenancy::Tenant;

/// Generic keyed in-memory store of shared entity handles.
pub struct InMemoryStore<K, E> {
    entries: RwLock<HashMap<K, Arc<Mutex<E>>>>,
}

impl<K, E> InMemoryStore<K, E>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity, returning the shared handle.
    pub fn insert(&self, key: K, entity: E) -> Arc<Mutex<E>> {
        let handle = Arc::new(Mutex::new(entity));
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, handle.clone());
        }
        handle
    }

    pub fn get(&self, key: &K) -> Option<Arc<Mutex<E>>> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, E> Default for InMemoryStore<K, E> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl TenantDirectory for InMemoryStore<TenantId, Tenant> {
    fn find(&self, tenant_id: TenantId) -> Option<TenantContext> {
        let handle = self.get(&tenant_id)?;
        let tenant = handle.lock().ok()?;
        Some(TenantContext::new(
            tenant.tenant_id(),
            tenant.name(),
            tenant.is_active(),
            tenant.plan(),
            tenant.settings().clone(),
        ))
    }
}
