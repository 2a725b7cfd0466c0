//! Where desired state is read from and status is written to.

pub mod k8s;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use kube::ResourceExt;

use crate::operator::crd::{ElasticsearchDomain, ElasticsearchDomainSpec, ElasticsearchDomainStatus};

pub use k8s::KubeDomainStore;
pub use memory::MemoryDomainStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_resource(domain: &ElasticsearchDomain) -> Self {
        Self::new(
            domain.namespace().unwrap_or_else(|| "default".to_string()),
            domain.name_any(),
        )
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A snapshot of the stored resource.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDomain {
    pub spec: ElasticsearchDomainSpec,
    pub status: Option<ElasticsearchDomainStatus>,
    pub deletion_requested: bool,
    pub finalizers: Vec<String>,
    pub resource_version: Option<String>,
    pub generation: Option<i64>,
}

impl StoredDomain {
    pub fn from_resource(domain: &ElasticsearchDomain) -> Self {
        Self {
            spec: domain.spec.clone(),
            status: domain.status.clone(),
            deletion_requested: domain.deletion_requested(),
            finalizers: domain.finalizers().to_vec(),
            resource_version: domain.resource_version(),
            generation: domain.metadata.generation,
        }
    }

    /// The spec to converge towards, or `None` once deletion was requested.
    pub fn desired(&self) -> Option<&ElasticsearchDomainSpec> {
        (!self.deletion_requested).then_some(&self.spec)
    }

    pub fn has_finalizer(&self) -> bool {
        self.finalizers
            .iter()
            .any(|f| f == crate::operator::finalizer::FINALIZER)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource {0} was modified concurrently")]
    Conflict(ResourceId),
    #[error("resource {0} not found")]
    NotFound(ResourceId),
    #[error("Kubernetes reported error: {0}")]
    Kube(#[from] kube::Error),
    #[error("store error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DomainStore: Send + Sync {
    async fn load(&self, id: &ResourceId) -> Result<Option<StoredDomain>, StoreError>;

    /// Replace the status. With `resource_version` set the write fails with
    /// `StoreError::Conflict` when the stored version moved on.
    async fn write_status(
        &self,
        id: &ResourceId,
        resource_version: Option<&str>,
        status: &ElasticsearchDomainStatus,
    ) -> Result<(), StoreError>;

    async fn add_finalizer(&self, id: &ResourceId) -> Result<(), StoreError>;

    async fn remove_finalizer(&self, id: &ResourceId) -> Result<(), StoreError>;
}
