//! An in-process search service.
//!
//! Domains go through the same life cycle the real service shows: a create
//! or configuration change leaves the domain `processing` for a number of
//! describe calls, and a deleted domain stays visible with `deleted = true`
//! for a while before describes start returning NotFound.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use esd_common::bootstrap::BootstrapResources;
use tracing::debug;

use super::{
    CloudApi, CreateDomainRequest, DomainConfigUpdate, DomainStatus, EbsOptions, ErrorCode,
    ProviderError, SubnetInfo, VpcDerivedInfo,
};

const ACCOUNT_ID: &str = "123456789012";
const REGION: &str = "us-west-2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CloudOperation {
    DescribeDomain,
    CreateDomain,
    UpdateDomainConfig,
    DeleteDomain,
    DescribeSubnets,
}

impl CloudOperation {
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            CloudOperation::CreateDomain
                | CloudOperation::UpdateDomainConfig
                | CloudOperation::DeleteDomain
        )
    }
}

struct SimDomain {
    status: DomainStatus,
    processing_left: u32,
    /// Describes left before a deleted domain disappears.
    deleted_left: Option<u32>,
}

#[derive(Default)]
struct SimState {
    domains: BTreeMap<String, SimDomain>,
    subnets: BTreeMap<String, SubnetInfo>,
    calls: BTreeMap<CloudOperation, u32>,
    faults: BTreeMap<CloudOperation, VecDeque<ProviderError>>,
}

impl SimState {
    /// Count the call and hand out the next injected fault, if any.
    fn enter(&mut self, op: CloudOperation) -> Result<(), ProviderError> {
        *self.calls.entry(op).or_default() += 1;
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(fault) => {
                debug!(operation = ?op, code = %fault.code, "Injected provider fault");
                Err(fault)
            }
            None => Ok(()),
        }
    }

    fn placement(&self, subnet_ids: &[String]) -> Result<VpcDerivedInfo, ProviderError> {
        let mut info = VpcDerivedInfo::default();
        for subnet_id in subnet_ids {
            let subnet = self.subnets.get(subnet_id).ok_or_else(|| {
                ProviderError::new(
                    ErrorCode::Validation,
                    format!("The subnet ID '{subnet_id}' does not exist"),
                )
            })?;
            if info.vpc_id.is_empty() {
                info.vpc_id = subnet.vpc_id.clone();
            } else if info.vpc_id != subnet.vpc_id {
                return Err(ProviderError::new(
                    ErrorCode::Validation,
                    "All subnets must belong to the same VPC",
                ));
            }
            info.subnet_ids.push(subnet_id.clone());
            if !info.availability_zones.contains(&subnet.availability_zone) {
                info.availability_zones.push(subnet.availability_zone.clone());
            }
        }
        Ok(info)
    }
}

pub struct SimulatedCloud {
    state: Mutex<SimState>,
    processing_describes: u32,
    deleting_describes: u32,
}

impl Default for SimulatedCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            processing_describes: 2,
            deleting_describes: 1,
        }
    }

    /// Number of describes that still report `processing` after a create or
    /// update.
    pub fn with_processing_describes(mut self, describes: u32) -> Self {
        self.processing_describes = describes;
        self
    }

    /// Number of describes that still return a deleted domain before it is
    /// gone.
    pub fn with_deleting_describes(mut self, describes: u32) -> Self {
        self.deleting_describes = describes;
        self
    }

    /// Seed the network the provisioning scripts created.
    pub fn with_bootstrap(self, bootstrap: &BootstrapResources) -> Self {
        for (index, subnet_id) in bootstrap.vpc_subnet_ids.iter().enumerate() {
            let zone = format!("{REGION}{}", (b'a' + (index % 26) as u8) as char);
            self.register_subnet(subnet_id, &bootstrap.vpc_id, &zone);
        }
        self
    }

    pub fn register_subnet(&self, subnet_id: &str, vpc_id: &str, availability_zone: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.subnets.insert(
                subnet_id.to_string(),
                SubnetInfo {
                    subnet_id: subnet_id.to_string(),
                    vpc_id: vpc_id.to_string(),
                    availability_zone: availability_zone.to_string(),
                },
            );
        }
    }

    /// Fail the next call of `op` with `error`. Faults queue up in order.
    pub fn inject_fault(&self, op: CloudOperation, error: ProviderError) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.entry(op).or_default().push_back(error);
        }
    }

    pub fn calls(&self, op: CloudOperation) -> u32 {
        self.state
            .lock()
            .map(|state| state.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn mutating_calls(&self) -> u32 {
        self.state
            .lock()
            .map(|state| {
                state
                    .calls
                    .iter()
                    .filter(|(op, _)| op.is_mutating())
                    .map(|(_, count)| count)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Current provider view of a domain without counting a describe.
    pub fn peek(&self, domain_name: &str) -> Option<DomainStatus> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.domains.get(domain_name).map(|d| d.status.clone()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>, ProviderError> {
        self.state.lock().map_err(|_| {
            ProviderError::new(
                ErrorCode::ServiceUnavailable,
                "simulated provider state is poisoned",
            )
        })
    }
}

fn validate_cluster(request: &CreateDomainRequest) -> Result<(), ProviderError> {
    let cluster = &request.cluster_config;
    if cluster.instance_count < 1 {
        return Err(ProviderError::new(
            ErrorCode::Validation,
            "InstanceCount must be at least 1",
        ));
    }
    if cluster.zone_awareness_enabled {
        let zones = cluster.availability_zone_count.unwrap_or(2);
        if cluster.instance_count % zones != 0 {
            return Err(ProviderError::new(
                ErrorCode::Validation,
                format!("You must choose an even number of data nodes for a {zones}-zone deployment"),
            ));
        }
    }
    Ok(())
}

fn endpoint(status: &DomainStatus) -> String {
    let prefix = if status.vpc_options.is_some() {
        "vpc"
    } else {
        "search"
    };
    format!("{prefix}-{}.{REGION}.es.amazonaws.com", status.domain_name)
}

#[async_trait]
impl CloudApi for SimulatedCloud {
    async fn describe_domain(&self, domain_name: &str) -> Result<DomainStatus, ProviderError> {
        let mut state = self.lock()?;
        state.enter(CloudOperation::DescribeDomain)?;

        let gone = matches!(
            state.domains.get(domain_name),
            Some(SimDomain { deleted_left: Some(0), .. })
        );
        if gone {
            state.domains.remove(domain_name);
            debug!(domain = %domain_name, "Deleted domain is gone");
        }

        let domain = state.domains.get_mut(domain_name).ok_or_else(|| {
            ProviderError::not_found(format!("Domain not found: {domain_name}"))
        })?;

        if let Some(left) = domain.deleted_left.as_mut() {
            *left -= 1;
            return Ok(domain.status.clone());
        }

        domain.status.processing = domain.processing_left > 0;
        if domain.processing_left > 0 {
            domain.processing_left -= 1;
        } else if domain.status.endpoint.is_none() {
            domain.status.endpoint = Some(endpoint(&domain.status));
        }
        Ok(domain.status.clone())
    }

    async fn create_domain(
        &self,
        request: &CreateDomainRequest,
    ) -> Result<DomainStatus, ProviderError> {
        let mut state = self.lock()?;
        state.enter(CloudOperation::CreateDomain)?;

        if state.domains.contains_key(&request.domain_name) {
            return Err(ProviderError::new(
                ErrorCode::ResourceAlreadyExists,
                format!("Domain {} already exists", request.domain_name),
            ));
        }
        validate_cluster(request)?;
        let vpc_options = match &request.subnet_ids {
            Some(subnet_ids) => Some(state.placement(subnet_ids)?),
            None => None,
        };

        let status = DomainStatus {
            domain_id: format!("{ACCOUNT_ID}/{}", request.domain_name),
            domain_name: request.domain_name.clone(),
            arn: format!("arn:aws:es:{REGION}:{ACCOUNT_ID}:domain/{}", request.domain_name),
            created: true,
            deleted: false,
            processing: true,
            endpoint: None,
            elasticsearch_version: request.elasticsearch_version.clone(),
            cluster_config: request.cluster_config.clone(),
            ebs_options: request.ebs_options.clone(),
            vpc_options,
        };
        debug!(domain = %request.domain_name, "Simulated domain created");

        state.domains.insert(
            request.domain_name.clone(),
            SimDomain {
                status: status.clone(),
                processing_left: self.processing_describes,
                deleted_left: None,
            },
        );
        Ok(status)
    }

    async fn update_domain_config(
        &self,
        domain_name: &str,
        update: &DomainConfigUpdate,
    ) -> Result<DomainStatus, ProviderError> {
        let mut state = self.lock()?;
        state.enter(CloudOperation::UpdateDomainConfig)?;

        let placement = match &update.subnet_ids {
            Some(subnet_ids) => Some(state.placement(subnet_ids)?),
            None => None,
        };
        let domain = state.domains.get_mut(domain_name).ok_or_else(|| {
            ProviderError::not_found(format!("Domain not found: {domain_name}"))
        })?;
        if domain.status.deleted {
            return Err(ProviderError::new(
                ErrorCode::Validation,
                format!("Domain {domain_name} is being deleted"),
            ));
        }

        let mut next = domain.status.clone();
        let cluster = &mut next.cluster_config;
        if let Some(instance_type) = &update.instance_type {
            cluster.instance_type = instance_type.clone();
        }
        if let Some(count) = update.instance_count {
            cluster.instance_count = count;
        }
        if let Some(master_type) = &update.dedicated_master_type {
            cluster.dedicated_master_type = Some(master_type.clone());
        }
        if let Some(enabled) = update.zone_awareness_enabled {
            cluster.zone_awareness_enabled = enabled;
            cluster.availability_zone_count = if enabled {
                cluster.availability_zone_count.or(Some(2))
            } else {
                None
            };
        }
        if let Some(zones) = update.availability_zone_count {
            cluster.availability_zone_count = Some(zones);
        }
        if update.ebs_volume_size.is_some() || update.ebs_volume_type.is_some() {
            let ebs = next.ebs_options.get_or_insert(EbsOptions {
                ebs_enabled: true,
                volume_type: None,
                volume_size: None,
            });
            if let Some(size) = update.ebs_volume_size {
                ebs.volume_size = Some(size);
            }
            if let Some(volume_type) = &update.ebs_volume_type {
                ebs.volume_type = Some(volume_type.clone());
            }
        }
        if let Some(placement) = placement {
            next.vpc_options = Some(placement);
        }

        validate_cluster(&CreateDomainRequest {
            domain_name: next.domain_name.clone(),
            elasticsearch_version: next.elasticsearch_version.clone(),
            cluster_config: next.cluster_config.clone(),
            ebs_options: next.ebs_options.clone(),
            subnet_ids: None,
        })?;

        next.processing = true;
        domain.status = next;
        domain.processing_left = self.processing_describes;
        debug!(domain = %domain_name, "Simulated domain config updated");
        Ok(domain.status.clone())
    }

    async fn delete_domain(&self, domain_name: &str) -> Result<DomainStatus, ProviderError> {
        let mut state = self.lock()?;
        state.enter(CloudOperation::DeleteDomain)?;

        let domain = state.domains.get_mut(domain_name).ok_or_else(|| {
            ProviderError::not_found(format!("Domain not found: {domain_name}"))
        })?;
        if domain.deleted_left.is_none() {
            domain.status.deleted = true;
            domain.status.processing = true;
            domain.deleted_left = Some(self.deleting_describes);
            debug!(domain = %domain_name, "Simulated domain deletion started");
        }
        Ok(domain.status.clone())
    }

    async fn describe_subnets(
        &self,
        subnet_ids: &[String],
    ) -> Result<Vec<SubnetInfo>, ProviderError> {
        let mut state = self.lock()?;
        state.enter(CloudOperation::DescribeSubnets)?;
        Ok(subnet_ids
            .iter()
            .filter_map(|id| state.subnets.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        create_if_absent, delete_if_present, CreateOutcome, DeleteOutcome,
        ElasticsearchClusterConfig,
    };

    fn request(name: &str) -> CreateDomainRequest {
        CreateDomainRequest {
            domain_name: name.to_string(),
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
            subnet_ids: None,
        }
    }

    #[tokio::test]
    async fn create_processes_then_settles() {
        let cloud = SimulatedCloud::new().with_processing_describes(1);
        let created = cloud.create_domain(&request("a")).await.unwrap();
        assert!(created.processing);
        assert!(created.created);

        assert!(cloud.describe_domain("a").await.unwrap().processing);
        let settled = cloud.describe_domain("a").await.unwrap();
        assert!(!settled.processing);
        assert!(settled.endpoint.is_some());
    }

    #[tokio::test]
    async fn duplicate_create_is_already_exists() {
        let cloud = SimulatedCloud::new();
        cloud.create_domain(&request("a")).await.unwrap();
        assert_eq!(
            create_if_absent(&cloud, &request("a")).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(cloud.calls(CloudOperation::CreateDomain), 2);
    }

    #[tokio::test]
    async fn deleted_domain_lingers_then_disappears() {
        let cloud = SimulatedCloud::new().with_deleting_describes(1);
        cloud.create_domain(&request("a")).await.unwrap();
        cloud.delete_domain("a").await.unwrap();

        assert!(cloud.describe_domain("a").await.unwrap().deleted);
        let err = cloud.describe_domain("a").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);

        assert_eq!(
            delete_if_present(&cloud, "a").await.unwrap(),
            DeleteOutcome::AlreadyDeleted
        );
    }

    #[tokio::test]
    async fn faults_fire_once_in_order() {
        let cloud = SimulatedCloud::new();
        cloud.inject_fault(
            CloudOperation::DescribeDomain,
            ProviderError::new(ErrorCode::Throttling, "Rate exceeded"),
        );
        let err = cloud.describe_domain("a").await.unwrap_err();
        assert!(err.is_transient());
        let err = cloud.describe_domain("a").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
        assert_eq!(cloud.calls(CloudOperation::DescribeDomain), 2);
        assert_eq!(cloud.mutating_calls(), 0);
    }

    #[tokio::test]
    async fn vpc_placement_from_bootstrap() {
        let bootstrap = BootstrapResources {
            vpc_id: "vpc-1".into(),
            vpc_subnet_ids: vec!["subnet-a".into(), "subnet-b".into()],
            service_linked_role_name: "AWSServiceRoleForAmazonElasticsearchService".into(),
        };
        let cloud = SimulatedCloud::new().with_bootstrap(&bootstrap);

        let mut req = request("v");
        req.subnet_ids = Some(bootstrap.vpc_subnet_ids.clone());
        let status = cloud.create_domain(&req).await.unwrap();
        let vpc = status.vpc_options.unwrap();
        assert_eq!(vpc.vpc_id, "vpc-1");
        assert_eq!(vpc.availability_zones, vec!["us-west-2a", "us-west-2b"]);

        let mut bad = request("w");
        bad.subnet_ids = Some(vec!["subnet-zz".into()]);
        let err = cloud.create_domain(&bad).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let cloud = SimulatedCloud::new().with_processing_describes(0);
        cloud.create_domain(&request("a")).await.unwrap();
        let updated = cloud
            .update_domain_config(
                "a",
                &DomainConfigUpdate {
                    instance_count: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.cluster_config.instance_count, 3);
        assert_eq!(updated.cluster_config.instance_type, "r5.large.elasticsearch");
        assert!(updated.processing);
        assert!(!cloud.describe_domain("a").await.unwrap().processing);
    }
}
