//! Desired spec vs. observed provider state.
//!
//! Every comparable field is tagged mutable or immutable. A difference in an
//! immutable field is a configuration error that no amount of retrying will
//! fix; differences in mutable fields become a [`ChangeSet`] that touches
//! exactly those fields and nothing else.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::operator::crd::ElasticsearchDomainSpec;
use crate::provider::{
    CreateDomainRequest, DomainConfigUpdate, DomainStatus, EbsOptions,
    ElasticsearchClusterConfig, ProviderError, SubnetInfo,
};

pub const DEFAULT_INSTANCE_TYPE: &str = "r5.large.elasticsearch";
pub const DEFAULT_AVAILABILITY_ZONE_COUNT: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DomainField {
    ElasticsearchVersion,
    InstanceType,
    InstanceCount,
    DedicatedMasterCount,
    DedicatedMasterType,
    ZoneAwarenessEnabled,
    AvailabilityZoneCount,
    EbsVolumeSize,
    EbsVolumeType,
    VpcId,
    SubnetIds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Mutable,
    Immutable,
}

impl DomainField {
    pub fn mutability(self) -> Mutability {
        match self {
            DomainField::ElasticsearchVersion
            | DomainField::DedicatedMasterCount
            | DomainField::VpcId => Mutability::Immutable,
            _ => Mutability::Mutable,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            DomainField::ElasticsearchVersion => "spec.elasticsearchVersion",
            DomainField::InstanceType => "spec.clusterConfig.instanceType",
            DomainField::InstanceCount => "spec.clusterConfig.instanceCount",
            DomainField::DedicatedMasterCount => "spec.clusterConfig.dedicatedMasterCount",
            DomainField::DedicatedMasterType => "spec.clusterConfig.dedicatedMasterType",
            DomainField::ZoneAwarenessEnabled => "spec.clusterConfig.zoneAwarenessEnabled",
            DomainField::AvailabilityZoneCount => "spec.clusterConfig.availabilityZoneCount",
            DomainField::EbsVolumeSize => "spec.ebsOptions.volumeSize",
            DomainField::EbsVolumeType => "spec.ebsOptions.volumeType",
            DomainField::VpcId => "spec.vpcOptions.vpcID",
            DomainField::SubnetIds => "spec.vpcOptions.subnetIds",
        }
    }
}

impl fmt::Display for DomainField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: DomainField,
    pub desired: String,
    pub observed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    pub fn fields(&self) -> Vec<DomainField> {
        self.changes.iter().map(|c| c.field).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn contains(&self, field: DomainField) -> bool {
        self.changes.iter().any(|c| c.field == field)
    }

    /// Build an update that carries only the changed fields.
    pub fn to_update(&self, spec: &ElasticsearchDomainSpec) -> DomainConfigUpdate {
        let cluster = &spec.cluster_config;
        let ebs = spec.ebs_options.as_ref();
        let mut update = DomainConfigUpdate::default();

        for change in &self.changes {
            match change.field {
                DomainField::InstanceType => update.instance_type = cluster.instance_type.clone(),
                DomainField::InstanceCount => update.instance_count = Some(cluster.instance_count),
                DomainField::DedicatedMasterType => {
                    update.dedicated_master_type = cluster.dedicated_master_type.clone()
                }
                DomainField::ZoneAwarenessEnabled => {
                    update.zone_awareness_enabled = Some(cluster.zone_awareness_enabled)
                }
                DomainField::AvailabilityZoneCount => {
                    update.availability_zone_count = cluster.availability_zone_count
                }
                DomainField::EbsVolumeSize => {
                    update.ebs_volume_size = ebs.and_then(|e| e.volume_size)
                }
                DomainField::EbsVolumeType => {
                    update.ebs_volume_type = ebs.and_then(|e| e.volume_type.clone())
                }
                DomainField::SubnetIds => {
                    update.subnet_ids = spec.vpc_options.as_ref().map(|v| v.subnet_ids.clone())
                }
                // Immutable fields never reach a change set.
                DomainField::ElasticsearchVersion
                | DomainField::DedicatedMasterCount
                | DomainField::VpcId => {}
            }
        }
        update
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diff {
    NoChange,
    Changes(ChangeSet),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} cannot be changed on an existing domain (desired {desired}, observed {observed})")]
    ImmutableField {
        field: DomainField,
        desired: String,
        observed: String,
    },
    #[error("{field} is invalid: {reason}")]
    InvalidField { field: DomainField, reason: String },
    #[error("spec.domainName must not be empty")]
    MissingDomainName,
    #[error("provider rejected the configuration: {0}")]
    Rejected(ProviderError),
}

impl ConfigError {
    fn invalid(field: DomainField, reason: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub fn field(&self) -> Option<DomainField> {
        match self {
            ConfigError::ImmutableField { field, .. } | ConfigError::InvalidField { field, .. } => {
                Some(*field)
            }
            ConfigError::MissingDomainName | ConfigError::Rejected(_) => None,
        }
    }

    /// Machine-readable condition reason.
    pub fn reason(&self) -> &'static str {
        match self {
            ConfigError::ImmutableField { .. } => "ImmutableFieldChanged",
            ConfigError::InvalidField { .. } | ConfigError::MissingDomainName => "InvalidSpec",
            ConfigError::Rejected(_) => "ProviderRejected",
        }
    }
}

struct Comparison {
    changes: Vec<FieldChange>,
}

impl Comparison {
    fn check<T: PartialEq + fmt::Debug>(&mut self, field: DomainField, desired: T, observed: T) {
        if desired != observed {
            self.changes.push(FieldChange {
                field,
                desired: render(&desired),
                observed: render(&observed),
            });
        }
    }
}

fn render<T: fmt::Debug>(value: &T) -> String {
    format!("{value:?}")
}

/// Compare the spec against one observation of the provider resource.
pub fn diff(spec: &ElasticsearchDomainSpec, observed: &DomainStatus) -> Result<Diff, ConfigError> {
    let desired = &spec.cluster_config;
    let current = &observed.cluster_config;
    let mut cmp = Comparison {
        changes: Vec::new(),
    };

    cmp.check(
        DomainField::ElasticsearchVersion,
        spec.elasticsearch_version.as_str(),
        observed.elasticsearch_version.as_str(),
    );
    if let Some(instance_type) = &desired.instance_type {
        cmp.check(
            DomainField::InstanceType,
            instance_type.as_str(),
            current.instance_type.as_str(),
        );
    }
    cmp.check(
        DomainField::InstanceCount,
        desired.instance_count,
        current.instance_count,
    );

    let observed_masters = current
        .dedicated_master_enabled
        .then_some(current.dedicated_master_count)
        .flatten()
        .filter(|count| *count > 0);
    cmp.check(
        DomainField::DedicatedMasterCount,
        desired.dedicated_masters(),
        observed_masters,
    );
    if let (Some(_), Some(master_type)) = (desired.dedicated_masters(), &desired.dedicated_master_type) {
        cmp.check(
            DomainField::DedicatedMasterType,
            Some(master_type.as_str()),
            current.dedicated_master_type.as_deref(),
        );
    }

    cmp.check(
        DomainField::ZoneAwarenessEnabled,
        desired.zone_awareness_enabled,
        current.zone_awareness_enabled,
    );
    if desired.zone_awareness_enabled {
        if let Some(az_count) = desired.availability_zone_count {
            cmp.check(
                DomainField::AvailabilityZoneCount,
                az_count,
                current
                    .availability_zone_count
                    .unwrap_or(DEFAULT_AVAILABILITY_ZONE_COUNT),
            );
        }
    }

    if let Some(ebs) = &spec.ebs_options {
        let current_ebs = observed.ebs_options.as_ref();
        if let Some(size) = ebs.volume_size {
            cmp.check(
                DomainField::EbsVolumeSize,
                Some(size),
                current_ebs.and_then(|e| e.volume_size),
            );
        }
        if let Some(volume_type) = &ebs.volume_type {
            cmp.check(
                DomainField::EbsVolumeType,
                Some(volume_type.as_str()),
                current_ebs.and_then(|e| e.volume_type.as_deref()),
            );
        }
    }

    match (&spec.vpc_options, &observed.vpc_options) {
        (Some(vpc), Some(current_vpc)) => {
            if let Some(vpc_id) = &vpc.vpc_id {
                cmp.check(
                    DomainField::VpcId,
                    vpc_id.as_str(),
                    current_vpc.vpc_id.as_str(),
                );
            }
            let desired_subnets: BTreeSet<&str> =
                vpc.subnet_ids.iter().map(String::as_str).collect();
            let observed_subnets: BTreeSet<&str> =
                current_vpc.subnet_ids.iter().map(String::as_str).collect();
            cmp.check(DomainField::SubnetIds, desired_subnets, observed_subnets);
        }
        (None, None) => {}
        (desired_vpc, current_vpc) => cmp.check(
            DomainField::VpcId,
            placement(desired_vpc.as_ref().and_then(|v| v.vpc_id.as_deref()), desired_vpc.is_some()),
            placement(current_vpc.as_ref().map(|v| v.vpc_id.as_str()), current_vpc.is_some()),
        ),
    }

    let mut changes = cmp.changes;
    changes.sort_by_key(|c| c.field);

    if let Some(immutable) = changes
        .iter()
        .find(|c| c.field.mutability() == Mutability::Immutable)
    {
        return Err(ConfigError::ImmutableField {
            field: immutable.field,
            desired: immutable.desired.clone(),
            observed: immutable.observed.clone(),
        });
    }

    if changes.is_empty() {
        Ok(Diff::NoChange)
    } else {
        Ok(Diff::Changes(ChangeSet { changes }))
    }
}

fn placement(vpc_id: Option<&str>, in_vpc: bool) -> String {
    match (in_vpc, vpc_id) {
        (false, _) => "public".to_string(),
        (true, Some(id)) => id.to_string(),
        (true, None) => "vpc".to_string(),
    }
}

/// Checks that need no provider data. Run before any provider call.
pub fn validate_spec(spec: &ElasticsearchDomainSpec) -> Result<(), ConfigError> {
    let cluster = &spec.cluster_config;

    if spec.domain_name.is_empty() {
        return Err(ConfigError::MissingDomainName);
    }
    if cluster.instance_count < 1 {
        return Err(ConfigError::invalid(
            DomainField::InstanceCount,
            "must be at least 1",
        ));
    }
    if matches!(cluster.dedicated_master_count, Some(count) if count < 0) {
        return Err(ConfigError::invalid(
            DomainField::DedicatedMasterCount,
            "must not be negative",
        ));
    }

    let az_count = availability_zone_count(spec);
    if cluster.zone_awareness_enabled {
        if !(2..=3).contains(&az_count) {
            return Err(ConfigError::invalid(
                DomainField::AvailabilityZoneCount,
                format!("must be 2 or 3, got {az_count}"),
            ));
        }
        if cluster.instance_count % az_count != 0 {
            return Err(ConfigError::invalid(
                DomainField::InstanceCount,
                format!("must be a multiple of the availability zone count ({az_count})"),
            ));
        }
    }

    if let Some(vpc) = &spec.vpc_options {
        if vpc.subnet_ids.is_empty() {
            return Err(ConfigError::invalid(
                DomainField::SubnetIds,
                "must not be empty",
            ));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = vpc.subnet_ids.iter().find(|s| !seen.insert(s.as_str())) {
            return Err(ConfigError::invalid(
                DomainField::SubnetIds,
                format!("subnet {dup} is listed twice"),
            ));
        }
        let expected = if cluster.zone_awareness_enabled {
            az_count as usize
        } else {
            1
        };
        if vpc.subnet_ids.len() != expected {
            return Err(ConfigError::invalid(
                DomainField::SubnetIds,
                format!(
                    "needs exactly {expected} subnet(s), one per availability zone, got {}",
                    vpc.subnet_ids.len()
                ),
            ));
        }
    }
    Ok(())
}

/// Checks the subnets against what the provider knows about them: all must
/// exist and belong to one VPC, the spec's VPC when it names one.
pub fn validate_placement(
    spec: &ElasticsearchDomainSpec,
    subnets: &[SubnetInfo],
) -> Result<(), ConfigError> {
    let Some(vpc) = &spec.vpc_options else {
        return Ok(());
    };

    let known: BTreeMap<&str, &SubnetInfo> = subnets
        .iter()
        .map(|s| (s.subnet_id.as_str(), s))
        .collect();

    let mut vpcs = BTreeSet::new();
    for subnet_id in &vpc.subnet_ids {
        let info = known.get(subnet_id.as_str()).ok_or_else(|| {
            ConfigError::invalid(
                DomainField::SubnetIds,
                format!("subnet {subnet_id} does not exist"),
            )
        })?;
        vpcs.insert(info.vpc_id.as_str());
    }

    if vpcs.len() > 1 {
        let list: Vec<&str> = vpcs.into_iter().collect();
        return Err(ConfigError::invalid(
            DomainField::SubnetIds,
            format!("subnets span more than one VPC: {}", list.join(", ")),
        ));
    }
    if let (Some(expected), Some(actual)) = (&vpc.vpc_id, vpcs.first()) {
        if expected != actual {
            return Err(ConfigError::invalid(
                DomainField::VpcId,
                format!("subnets belong to {actual}, not {expected}"),
            ));
        }
    }
    Ok(())
}

fn availability_zone_count(spec: &ElasticsearchDomainSpec) -> i32 {
    spec.cluster_config
        .availability_zone_count
        .unwrap_or(DEFAULT_AVAILABILITY_ZONE_COUNT)
}

pub fn create_request(spec: &ElasticsearchDomainSpec) -> CreateDomainRequest {
    let cluster = &spec.cluster_config;
    let masters = cluster.dedicated_masters();

    CreateDomainRequest {
        domain_name: spec.domain_name.clone(),
        elasticsearch_version: spec.elasticsearch_version.clone(),
        cluster_config: ElasticsearchClusterConfig {
            instance_type: cluster
                .instance_type
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string()),
            instance_count: cluster.instance_count,
            dedicated_master_enabled: masters.is_some(),
            dedicated_master_type: masters.map(|_| {
                cluster
                    .dedicated_master_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string())
            }),
            dedicated_master_count: masters,
            zone_awareness_enabled: cluster.zone_awareness_enabled,
            availability_zone_count: cluster
                .zone_awareness_enabled
                .then(|| availability_zone_count(spec)),
        },
        ebs_options: spec.ebs_options.as_ref().map(|ebs| EbsOptions {
            ebs_enabled: true,
            volume_type: ebs.volume_type.clone(),
            volume_size: ebs.volume_size,
        }),
        subnet_ids: spec.vpc_options.as_ref().map(|v| v.subnet_ids.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::crd::{ClusterConfig, EbsOptionsSpec, VpcOptions};
    use crate::provider::VpcDerivedInfo;

    fn spec() -> ElasticsearchDomainSpec {
        ElasticsearchDomainSpec {
            domain_name: "my-es-domain".into(),
            elasticsearch_version: "7.9".into(),
            cluster_config: ClusterConfig {
                instance_count: 1,
                ..Default::default()
            },
            ebs_options: None,
            vpc_options: None,
        }
    }

    fn vpc_spec() -> ElasticsearchDomainSpec {
        ElasticsearchDomainSpec {
            domain_name: "my-es-domain3".into(),
            elasticsearch_version: "7.9".into(),
            cluster_config: ClusterConfig {
                instance_count: 2,
                dedicated_master_count: Some(3),
                zone_awareness_enabled: true,
                ..Default::default()
            },
            ebs_options: Some(EbsOptionsSpec {
                volume_size: Some(10),
                volume_type: Some("gp2".into()),
            }),
            vpc_options: Some(VpcOptions {
                vpc_id: Some("vpc-1".into()),
                subnet_ids: vec!["subnet-a".into(), "subnet-b".into()],
            }),
        }
    }

    /// What the provider reports once it has materialized `spec`.
    fn observed(spec: &ElasticsearchDomainSpec) -> DomainStatus {
        let request = create_request(spec);
        DomainStatus {
            domain_id: format!("123456789012/{}", spec.domain_name),
            domain_name: spec.domain_name.clone(),
            arn: format!("arn:aws:es:us-west-2:123456789012:domain/{}", spec.domain_name),
            created: true,
            deleted: false,
            processing: false,
            endpoint: None,
            elasticsearch_version: request.elasticsearch_version,
            cluster_config: request.cluster_config,
            ebs_options: request.ebs_options,
            vpc_options: request.subnet_ids.map(|subnet_ids| VpcDerivedInfo {
                vpc_id: "vpc-1".into(),
                subnet_ids,
                availability_zones: vec!["us-west-2a".into(), "us-west-2b".into()],
            }),
        }
    }

    fn subnet(id: &str, vpc: &str) -> SubnetInfo {
        SubnetInfo {
            subnet_id: id.into(),
            vpc_id: vpc.into(),
            availability_zone: "us-west-2a".into(),
        }
    }

    #[test]
    fn materialized_spec_has_no_change() {
        for s in [spec(), vpc_spec()] {
            assert_eq!(diff(&s, &observed(&s)), Ok(Diff::NoChange));
        }
    }

    #[test]
    fn provider_defaults_are_not_compared() {
        let s = spec();
        let mut current = observed(&s);
        current.cluster_config.instance_type = "m5.large.elasticsearch".into();
        current.ebs_options = Some(EbsOptions {
            ebs_enabled: true,
            volume_type: Some("gp2".into()),
            volume_size: Some(35),
        });
        assert_eq!(diff(&s, &current), Ok(Diff::NoChange));
    }

    #[test]
    fn mutable_changes_name_exactly_the_changed_fields() {
        let current = observed(&vpc_spec());
        let mut desired = vpc_spec();
        desired.cluster_config.instance_count = 4;
        desired.ebs_options = Some(EbsOptionsSpec {
            volume_size: Some(20),
            volume_type: Some("gp2".into()),
        });

        let Ok(Diff::Changes(changes)) = diff(&desired, &current) else {
            panic!("expected a change set");
        };
        assert_eq!(
            changes.fields(),
            vec![DomainField::InstanceCount, DomainField::EbsVolumeSize]
        );

        let update = changes.to_update(&desired);
        assert_eq!(
            update,
            DomainConfigUpdate {
                instance_count: Some(4),
                ebs_volume_size: Some(20),
                ..Default::default()
            }
        );
    }

    #[test]
    fn subnet_order_is_irrelevant() {
        let current = observed(&vpc_spec());
        let mut desired = vpc_spec();
        desired.vpc_options.as_mut().unwrap().subnet_ids.reverse();
        assert_eq!(diff(&desired, &current), Ok(Diff::NoChange));
    }

    #[test]
    fn subnet_swap_is_a_mutable_change() {
        let current = observed(&vpc_spec());
        let mut desired = vpc_spec();
        desired.vpc_options.as_mut().unwrap().subnet_ids[1] = "subnet-c".into();

        let Ok(Diff::Changes(changes)) = diff(&desired, &current) else {
            panic!("expected a change set");
        };
        assert_eq!(changes.fields(), vec![DomainField::SubnetIds]);
        assert_eq!(
            changes.to_update(&desired).subnet_ids,
            Some(vec!["subnet-a".to_string(), "subnet-c".to_string()])
        );
    }

    #[test]
    fn master_count_is_immutable() {
        let current = observed(&vpc_spec());
        let mut desired = vpc_spec();
        desired.cluster_config.dedicated_master_count = Some(5);
        desired.cluster_config.instance_count = 4;

        let err = diff(&desired, &current).unwrap_err();
        assert_eq!(err.field(), Some(DomainField::DedicatedMasterCount));
        assert_eq!(err.reason(), "ImmutableFieldChanged");
    }

    #[test]
    fn version_is_immutable() {
        let current = observed(&spec());
        let mut desired = spec();
        desired.elasticsearch_version = "7.10".into();
        assert_eq!(
            diff(&desired, &current).unwrap_err().field(),
            Some(DomainField::ElasticsearchVersion)
        );
    }

    #[test]
    fn moving_into_a_vpc_is_immutable() {
        let current = observed(&spec());
        let mut desired = spec();
        desired.vpc_options = Some(VpcOptions {
            vpc_id: None,
            subnet_ids: vec!["subnet-a".into()],
        });
        let err = diff(&desired, &current).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ImmutableField {
                field: DomainField::VpcId,
                desired: "\"vpc\"".into(),
                observed: "\"public\"".into(),
            }
        );
    }

    #[test]
    fn zone_awareness_toggle_is_mutable() {
        let mut desired = spec();
        desired.cluster_config.instance_count = 2;
        let current = observed(&desired);
        desired.cluster_config.zone_awareness_enabled = true;

        let Ok(Diff::Changes(changes)) = diff(&desired, &current) else {
            panic!("expected a change set");
        };
        assert_eq!(changes.fields(), vec![DomainField::ZoneAwarenessEnabled]);
    }

    #[test]
    fn validate_rejects_bad_counts() {
        let mut s = spec();
        s.cluster_config.instance_count = 0;
        assert_eq!(
            validate_spec(&s).unwrap_err().field(),
            Some(DomainField::InstanceCount)
        );

        let mut s = vpc_spec();
        s.cluster_config.instance_count = 3;
        assert_eq!(
            validate_spec(&s).unwrap_err().field(),
            Some(DomainField::InstanceCount)
        );
    }

    #[test]
    fn validate_rejects_empty_and_duplicate_subnets() {
        let mut s = vpc_spec();
        s.vpc_options.as_mut().unwrap().subnet_ids.clear();
        assert!(matches!(
            validate_spec(&s),
            Err(ConfigError::InvalidField { field: DomainField::SubnetIds, .. })
        ));

        let mut s = vpc_spec();
        s.vpc_options.as_mut().unwrap().subnet_ids = vec!["subnet-a".into(), "subnet-a".into()];
        assert!(matches!(
            validate_spec(&s),
            Err(ConfigError::InvalidField { field: DomainField::SubnetIds, reason }) if reason.contains("twice")
        ));
    }

    #[test]
    fn placement_requires_single_vpc() {
        let s = vpc_spec();
        assert_eq!(
            validate_placement(&s, &[subnet("subnet-a", "vpc-1"), subnet("subnet-b", "vpc-1")]),
            Ok(())
        );

        let err = validate_placement(&s, &[subnet("subnet-a", "vpc-1"), subnet("subnet-b", "vpc-2")])
            .unwrap_err();
        assert_eq!(err.field(), Some(DomainField::SubnetIds));

        let err = validate_placement(&s, &[subnet("subnet-a", "vpc-9"), subnet("subnet-b", "vpc-9")])
            .unwrap_err();
        assert_eq!(err.field(), Some(DomainField::VpcId));

        let err = validate_placement(&s, &[subnet("subnet-a", "vpc-1")]).unwrap_err();
        assert!(err.to_string().contains("subnet-b does not exist"));
    }

    #[test]
    fn create_request_fills_defaults() {
        let request = create_request(&vpc_spec());
        assert_eq!(request.cluster_config.instance_type, DEFAULT_INSTANCE_TYPE);
        assert!(request.cluster_config.dedicated_master_enabled);
        assert_eq!(request.cluster_config.dedicated_master_count, Some(3));
        assert_eq!(request.cluster_config.availability_zone_count, Some(2));

        let request = create_request(&spec());
        assert!(!request.cluster_config.dedicated_master_enabled);
        assert_eq!(request.cluster_config.dedicated_master_type, None);
        assert_eq!(request.subnet_ids, None);
    }
}
