use kube::{
    api::{Patch, PatchParams},
    Api, Client, Error,
};
use serde_json::{json, Value};

use super::crd::ElasticsearchDomain;

pub const FINALIZER: &str = "finalizers.elasticsearchservice.services.k8s.aws/ElasticsearchDomain";

/// The finalizer list read at `resource_version`, for the patch to be
/// applied against.
pub struct Finalizers<'a> {
    pub existing: &'a [String],
    pub resource_version: Option<&'a str>,
}

pub async fn add(
    client: Client,
    name: &str,
    namespace: &str,
    read: Finalizers<'_>,
) -> Result<ElasticsearchDomain, Error> {
    let mut finalizers = read.existing.to_vec();
    if !finalizers.iter().any(|f| f == FINALIZER) {
        finalizers.push(FINALIZER.to_string());
    }
    patch_finalizers(client, name, namespace, &finalizers, read.resource_version).await
}

/// Drops only our finalizer; finalizers owned by other controllers stay.
pub async fn delete(
    client: Client,
    name: &str,
    namespace: &str,
    read: Finalizers<'_>,
) -> Result<ElasticsearchDomain, Error> {
    let finalizers: Vec<String> = read
        .existing
        .iter()
        .filter(|f| f.as_str() != FINALIZER)
        .cloned()
        .collect();
    patch_finalizers(client, name, namespace, &finalizers, read.resource_version).await
}

/// The list is replaced as a whole, so the patch carries the version it was
/// computed from and a concurrent change answers 409.
fn finalizer_patch(finalizers: &[String], resource_version: Option<&str>) -> Value {
    let mut metadata = json!({ "finalizers": finalizers });
    if let Some(version) = resource_version {
        metadata["resourceVersion"] = json!(version);
    }
    json!({ "metadata": metadata })
}

async fn patch_finalizers(
    client: Client,
    name: &str,
    namespace: &str,
    finalizers: &[String],
    resource_version: Option<&str>,
) -> Result<ElasticsearchDomain, Error> {
    let api: Api<ElasticsearchDomain> = Api::namespaced(client, namespace);
    let finalizer = finalizer_patch(finalizers, resource_version);

    let patch: Patch<&Value> = Patch::Merge(&finalizer);
    api.patch(name, &PatchParams::default(), &patch).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_pins_the_read_version() {
        let finalizers = vec!["other.io/guard".to_string(), FINALIZER.to_string()];
        let patch = finalizer_patch(&finalizers, Some("17"));

        assert_eq!(patch["metadata"]["resourceVersion"], "17");
        assert_eq!(
            patch["metadata"]["finalizers"],
            json!(["other.io/guard", FINALIZER])
        );
    }

    #[test]
    fn unversioned_patch_has_no_version() {
        let patch = finalizer_patch(&[], None);
        assert!(patch["metadata"].get("resourceVersion").is_none());
        assert_eq!(patch["metadata"]["finalizers"], json!([]));
    }
}
