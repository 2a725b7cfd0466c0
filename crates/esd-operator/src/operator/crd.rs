use std::fmt;

use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::finalizer::FINALIZER;
use crate::provider::{EbsOptions, ElasticsearchClusterConfig, VpcDerivedInfo};

pub const DEFAULT_ELASTICSEARCH_VERSION: &str = "7.9";

#[derive(CustomResource, Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "elasticsearchservice.services.k8s.aws",
    version = "v1alpha1",
    kind = "ElasticsearchDomain",
    plural = "elasticsearchdomains",
    shortname = "esdomain",
    status = "ElasticsearchDomainStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Domain","type":"string","jsonPath":".spec.domainName"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchDomainSpec {
    pub domain_name: String,
    #[serde(default = "default_elasticsearch_version")]
    pub elasticsearch_version: String,
    pub cluster_config: ClusterConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebs_options: Option<EbsOptionsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_options: Option<VpcOptions>,
}

/// Data and master node layout. Unset optionals take the provider default
/// and are never compared against what the provider reports.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    pub instance_count: i32,
    /// Unset or zero means no dedicated master nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedicated_master_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedicated_master_type: Option<String>,
    #[serde(default)]
    pub zone_awareness_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone_count: Option<i32>,
}

impl ClusterConfig {
    pub fn dedicated_masters(&self) -> Option<i32> {
        self.dedicated_master_count.filter(|count| *count > 0)
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct EbsOptionsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct VpcOptions {
    /// When set, every subnet must belong to this VPC.
    #[serde(default, rename = "vpcID", skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, JsonSchema, Default)]
pub enum DomainPhase {
    #[default]
    Absent,
    Creating,
    Processing,
    Created,
    Deleting,
    Failed,
}

impl fmt::Display for DomainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            DomainPhase::Absent => "Absent",
            DomainPhase::Creating => "Creating",
            DomainPhase::Processing => "Processing",
            DomainPhase::Created => "Created",
            DomainPhase::Deleting => "Deleting",
            DomainPhase::Failed => "Failed",
        };
        f.write_str(phase)
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, JsonSchema)]
pub enum ConditionType {
    /// Observed provider state matches the spec
    Synced,
    /// The spec can never converge as written
    Terminal,
    /// Repeated provider failures that are still being retried
    Recoverable,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchDomainStatus {
    #[serde(default)]
    pub phase: DomainPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_config: Option<ElasticsearchClusterConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebs_options: Option<EbsOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_options: Option<VpcDerivedInfo>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ElasticsearchDomainStatus {
    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

impl ElasticsearchDomain {
    pub fn deletion_requested(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == FINALIZER)
    }
}

fn default_elasticsearch_version() -> String {
    DEFAULT_ELASTICSEARCH_VERSION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn crd_names() {
        let crd = ElasticsearchDomain::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("elasticsearchdomains.elasticsearchservice.services.k8s.aws")
        );
        assert_eq!(crd.spec.names.kind, "ElasticsearchDomain");
    }

    #[test]
    fn manifest_defaults() {
        let spec: ElasticsearchDomainSpec = serde_yaml::from_str(
            r#"
domainName: my-es-domain
clusterConfig:
  instanceCount: 1
"#,
        )
        .unwrap();
        assert_eq!(spec.elasticsearch_version, "7.9");
        assert!(!spec.cluster_config.zone_awareness_enabled);
        assert_eq!(spec.cluster_config.dedicated_masters(), None);
        assert!(spec.vpc_options.is_none());
    }

    #[test]
    fn zero_master_count_means_none() {
        let config = ClusterConfig {
            instance_count: 2,
            dedicated_master_count: Some(0),
            ..Default::default()
        };
        assert_eq!(config.dedicated_masters(), None);
    }

    #[test]
    fn vpc_manifest_fields() {
        let spec: ElasticsearchDomainSpec = serde_yaml::from_str(
            r#"
domainName: my-es-domain3
clusterConfig:
  instanceCount: 2
  dedicatedMasterCount: 3
  zoneAwarenessEnabled: true
vpcOptions:
  vpcID: vpc-1
  subnetIds: [subnet-a, subnet-b]
"#,
        )
        .unwrap();
        let vpc = spec.vpc_options.unwrap();
        assert_eq!(vpc.vpc_id.as_deref(), Some("vpc-1"));
        assert_eq!(vpc.subnet_ids, vec!["subnet-a", "subnet-b"]);
        assert_eq!(spec.cluster_config.dedicated_masters(), Some(3));
    }

    #[test]
    fn finalizer_and_deletion_flags() {
        let mut domain = ElasticsearchDomain::new(
            "my-es-domain",
            ElasticsearchDomainSpec {
                domain_name: "my-es-domain".into(),
                elasticsearch_version: DEFAULT_ELASTICSEARCH_VERSION.into(),
                cluster_config: ClusterConfig {
                    instance_count: 1,
                    ..Default::default()
                },
                ebs_options: None,
                vpc_options: None,
            },
        );
        assert!(!domain.has_finalizer());
        assert!(!domain.deletion_requested());

        domain.finalizers_mut().push(FINALIZER.to_string());
        assert!(domain.has_finalizer());
    }
}
