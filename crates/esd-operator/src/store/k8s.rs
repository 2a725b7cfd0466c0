use async_trait::async_trait;
use kube::api::PostParams;
use kube::{Api, Client, Resource};
use serde_json::{json, Value};

use super::{DomainStore, ResourceId, StoreError, StoredDomain};
use crate::operator::crd::{ElasticsearchDomain, ElasticsearchDomainStatus};
use crate::operator::finalizer::{self, Finalizers};

/// Desired state and status backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeDomainStore {
    client: Client,
}

impl KubeDomainStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, id: &ResourceId) -> Api<ElasticsearchDomain> {
        Api::namespaced(self.client.clone(), &id.namespace)
    }
}

fn classify(id: &ResourceId, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(ref response) if response.code == 409 => StoreError::Conflict(id.clone()),
        kube::Error::Api(ref response) if response.code == 404 => StoreError::NotFound(id.clone()),
        other => StoreError::Kube(other),
    }
}

/// Body for a status replace. With a resourceVersion the API server answers
/// 409 when the object moved on since it was read.
fn status_body(
    id: &ResourceId,
    resource_version: Option<&str>,
    status: &ElasticsearchDomainStatus,
) -> Value {
    let mut metadata = json!({ "name": id.name, "namespace": id.namespace });
    if let Some(version) = resource_version {
        metadata["resourceVersion"] = json!(version);
    }
    json!({
        "apiVersion": ElasticsearchDomain::api_version(&()),
        "kind": ElasticsearchDomain::kind(&()),
        "metadata": metadata,
        "status": status,
    })
}

#[async_trait]
impl DomainStore for KubeDomainStore {
    async fn load(&self, id: &ResourceId) -> Result<Option<StoredDomain>, StoreError> {
        let domain = self.api(id).get_opt(&id.name).await?;
        Ok(domain.as_ref().map(StoredDomain::from_resource))
    }

    async fn write_status(
        &self,
        id: &ResourceId,
        resource_version: Option<&str>,
        status: &ElasticsearchDomainStatus,
    ) -> Result<(), StoreError> {
        // A merge patch would keep keys that serialize as absent, so the
        // status subresource is replaced wholesale.
        let body = serde_json::to_vec(&status_body(id, resource_version, status))
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        self.api(id)
            .replace_status(&id.name, &PostParams::default(), body)
            .await
            .map(|_| ())
            .map_err(|e| classify(id, e))
    }

    async fn add_finalizer(&self, id: &ResourceId) -> Result<(), StoreError> {
        let stored = match self.load(id).await? {
            Some(stored) if stored.has_finalizer() => return Ok(()),
            Some(stored) => stored,
            None => return Err(StoreError::NotFound(id.clone())),
        };
        let read = Finalizers {
            existing: &stored.finalizers,
            resource_version: stored.resource_version.as_deref(),
        };
        finalizer::add(self.client.clone(), &id.name, &id.namespace, read)
            .await
            .map(|_| ())
            .map_err(|e| classify(id, e))
    }

    async fn remove_finalizer(&self, id: &ResourceId) -> Result<(), StoreError> {
        let stored = match self.load(id).await? {
            Some(stored) if stored.has_finalizer() => stored,
            _ => return Ok(()),
        };
        let read = Finalizers {
            existing: &stored.finalizers,
            resource_version: stored.resource_version.as_deref(),
        };
        match finalizer::delete(self.client.clone(), &id.name, &id.namespace, read).await {
            Ok(_) => Ok(()),
            Err(e) => match classify(id, e) {
                StoreError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::Observation;
    use crate::operator::crd::DomainPhase;
    use crate::provider::{DomainStatus, ElasticsearchClusterConfig};
    use crate::status::{merge, StatusReport};

    fn id() -> ResourceId {
        ResourceId {
            namespace: "default".into(),
            name: "my-es-domain".into(),
        }
    }

    #[test]
    fn cleared_fields_leave_the_body() {
        let live = DomainStatus {
            domain_id: "123456789012/my-es-domain".into(),
            domain_name: "my-es-domain".into(),
            arn: "arn:aws:es:us-west-2:123456789012:domain/my-es-domain".into(),
            created: true,
            deleted: false,
            processing: false,
            endpoint: Some("search-my-es-domain.us-west-2.es.amazonaws.com".into()),
            elasticsearch_version: "7.9".into(),
            cluster_config: ElasticsearchClusterConfig {
                instance_type: "r5.large.elasticsearch".into(),
                instance_count: 1,
                dedicated_master_enabled: false,
                dedicated_master_type: None,
                dedicated_master_count: None,
                zone_awareness_enabled: false,
                availability_zone_count: None,
            },
            ebs_options: None,
            vpc_options: None,
        };
        let found = merge(
            &ElasticsearchDomainStatus::default(),
            &StatusReport::observed(DomainPhase::Created, Observation::Found(live), Some(1)),
            "2024-01-01T00:00:00Z",
        );
        assert!(found.endpoint.is_some());

        let gone = merge(
            &found,
            &StatusReport::observed(DomainPhase::Absent, Observation::NotFound, Some(1)),
            "2024-01-01T00:01:00Z",
        );
        let body = status_body(&id(), Some("42"), &gone);

        assert_eq!(body["kind"], "ElasticsearchDomain");
        assert_eq!(body["metadata"]["resourceVersion"], "42");
        assert_eq!(body["metadata"]["name"], "my-es-domain");
        let status = body["status"].as_object().unwrap();
        for key in ["endpoint", "arn", "domainId", "clusterConfig", "vpcOptions", "deleted"] {
            assert!(!status.contains_key(key), "{key} still present");
        }
        assert_eq!(status["phase"], "Absent");
    }

    #[test]
    fn unversioned_body_omits_resource_version() {
        let body = status_body(&id(), None, &ElasticsearchDomainStatus::default());
        assert!(body["metadata"].get("resourceVersion").is_none());
        assert_eq!(body["metadata"]["namespace"], "default");
    }
}
