//! In-process store with the optimistic-concurrency and deletion semantics of
//! the API server: every write bumps `resourceVersion`, a deleted resource
//! lingers with a deletion timestamp until its last finalizer is removed.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;

use super::{DomainStore, ResourceId, StoreError, StoredDomain};
use crate::operator::crd::{ElasticsearchDomain, ElasticsearchDomainStatus};
use crate::operator::finalizer::FINALIZER;

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<ResourceId, ElasticsearchDomain>,
    next_version: u64,
    pending_conflicts: u32,
    status_writes: u32,
}

impl MemoryState {
    fn bump(&mut self, domain: &mut ElasticsearchDomain) {
        self.next_version += 1;
        domain.metadata.resource_version = Some(self.next_version.to_string());
    }
}

#[derive(Default)]
pub struct MemoryDomainStore {
    state: Mutex<MemoryState>,
}

impl MemoryDomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    /// Create the resource, or replace its spec. A changed spec bumps the
    /// generation like the API server does.
    pub fn apply(&self, mut domain: ElasticsearchDomain) -> Result<ResourceId, StoreError> {
        if domain.namespace().is_none() {
            domain.metadata.namespace = Some("default".to_string());
        }
        let id = ResourceId::from_resource(&domain);
        let mut state = self.lock()?;

        let mut stored = match state.objects.remove(&id) {
            Some(mut existing) => {
                if existing.spec != domain.spec {
                    existing.spec = domain.spec;
                    existing.metadata.generation = existing.metadata.generation.map(|g| g + 1);
                }
                existing
            }
            None => {
                domain.metadata.generation = Some(1);
                domain.status = None;
                domain
            }
        };
        state.bump(&mut stored);
        state.objects.insert(id.clone(), stored);
        Ok(id)
    }

    /// Mark for deletion; the object disappears once no finalizer is left.
    pub fn request_delete(&self, id: &ResourceId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let mut domain = state
            .objects
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if domain.finalizers().is_empty() {
            return Ok(());
        }
        if domain.metadata.deletion_timestamp.is_none() {
            domain.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        }
        state.bump(&mut domain);
        state.objects.insert(id.clone(), domain);
        Ok(())
    }

    pub fn get(&self, id: &ResourceId) -> Option<ElasticsearchDomain> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.objects.get(id).cloned())
    }

    pub fn ids(&self) -> Vec<ResourceId> {
        self.state
            .lock()
            .map(|state| state.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Make the next `count` versioned status writes fail with a conflict,
    /// as if another writer got there first.
    pub fn inject_conflicts(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.pending_conflicts += count;
        }
    }

    pub fn status_writes(&self) -> u32 {
        self.state.lock().map(|s| s.status_writes).unwrap_or(0)
    }
}

#[async_trait]
impl DomainStore for MemoryDomainStore {
    async fn load(&self, id: &ResourceId) -> Result<Option<StoredDomain>, StoreError> {
        let state = self.lock()?;
        Ok(state.objects.get(id).map(StoredDomain::from_resource))
    }

    async fn write_status(
        &self,
        id: &ResourceId,
        resource_version: Option<&str>,
        status: &ElasticsearchDomainStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if resource_version.is_some() && state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            // The competing writer's update moves the version forward.
            if let Some(mut domain) = state.objects.remove(id) {
                state.bump(&mut domain);
                state.objects.insert(id.clone(), domain);
            }
            return Err(StoreError::Conflict(id.clone()));
        }

        let mut domain = state
            .objects
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if let Some(expected) = resource_version {
            if domain.metadata.resource_version.as_deref() != Some(expected) {
                state.objects.insert(id.clone(), domain);
                return Err(StoreError::Conflict(id.clone()));
            }
        }
        domain.status = Some(status.clone());
        state.bump(&mut domain);
        state.status_writes += 1;
        state.objects.insert(id.clone(), domain);
        Ok(())
    }

    async fn add_finalizer(&self, id: &ResourceId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let mut domain = state
            .objects
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !domain.finalizers().iter().any(|f| f == FINALIZER) {
            domain.finalizers_mut().push(FINALIZER.to_string());
            state.bump(&mut domain);
        }
        state.objects.insert(id.clone(), domain);
        Ok(())
    }

    async fn remove_finalizer(&self, id: &ResourceId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let Some(mut domain) = state.objects.remove(id) else {
            return Ok(());
        };
        domain.finalizers_mut().retain(|f| f != FINALIZER);
        if domain.deletion_requested() && domain.finalizers().is_empty() {
            return Ok(());
        }
        state.bump(&mut domain);
        state.objects.insert(id.clone(), domain);
        Ok(())
    }
}
