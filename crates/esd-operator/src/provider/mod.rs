//! The seam between the controller and the search-service API.
//!
//! Every call is fallible and safe to retry except `create_domain`, which is
//! only issued after a describe returned NotFound and whose
//! `ResourceAlreadyExists` answer is folded into success.

pub mod simulated;

use std::fmt;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use simulated::SimulatedCloud;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchClusterConfig {
    pub instance_type: String,
    pub instance_count: i32,
    pub dedicated_master_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedicated_master_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedicated_master_count: Option<i32>,
    pub zone_awareness_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone_count: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EbsOptions {
    pub ebs_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<i32>,
}

/// Network placement as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct VpcDerivedInfo {
    #[serde(rename = "vpcID")]
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub availability_zones: Vec<String>,
}

/// One describe result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainStatus {
    pub domain_id: String,
    pub domain_name: String,
    pub arn: String,
    pub created: bool,
    pub deleted: bool,
    pub processing: bool,
    pub endpoint: Option<String>,
    pub elasticsearch_version: String,
    pub cluster_config: ElasticsearchClusterConfig,
    pub ebs_options: Option<EbsOptions>,
    pub vpc_options: Option<VpcDerivedInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDomainRequest {
    pub domain_name: String,
    pub elasticsearch_version: String,
    pub cluster_config: ElasticsearchClusterConfig,
    pub ebs_options: Option<EbsOptions>,
    pub subnet_ids: Option<Vec<String>>,
}

/// Partial configuration update. Unset fields are left alone by the
/// provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainConfigUpdate {
    pub instance_type: Option<String>,
    pub instance_count: Option<i32>,
    pub dedicated_master_type: Option<String>,
    pub zone_awareness_enabled: Option<bool>,
    pub availability_zone_count: Option<i32>,
    pub ebs_volume_size: Option<i32>,
    pub ebs_volume_type: Option<String>,
    pub subnet_ids: Option<Vec<String>>,
}

impl DomainConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetInfo {
    pub subnet_id: String,
    pub vpc_id: String,
    pub availability_zone: String,
}

/// Structured provider error codes. Classification never looks at the
/// message text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ResourceNotFound,
    ResourceAlreadyExists,
    Throttling,
    ServiceUnavailable,
    Network,
    Validation,
    InvalidInput,
    LimitExceeded,
    AccessDenied,
    Other(String),
}

impl ErrorCode {
    pub fn from_code(code: &str) -> Self {
        match code {
            "ResourceNotFoundException" | "NoSuchEntity" => Self::ResourceNotFound,
            "ResourceAlreadyExistsException" | "EntityAlreadyExists" => {
                Self::ResourceAlreadyExists
            }
            "ThrottlingException" | "Throttling" | "TooManyRequestsException" => Self::Throttling,
            "InternalException" | "ServiceUnavailable" | "ServiceUnavailableException" => {
                Self::ServiceUnavailable
            }
            "NetworkError" | "RequestTimeout" => Self::Network,
            "ValidationException" | "InvalidTypeException" | "DisabledOperationException" => {
                Self::Validation
            }
            "InvalidInput" => Self::InvalidInput,
            "LimitExceededException" => Self::LimitExceeded,
            "AccessDeniedException" => Self::AccessDenied,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ResourceNotFound => "ResourceNotFoundException",
            Self::ResourceAlreadyExists => "ResourceAlreadyExistsException",
            Self::Throttling => "ThrottlingException",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::Network => "NetworkError",
            Self::Validation => "ValidationException",
            Self::InvalidInput => "InvalidInput",
            Self::LimitExceeded => "LimitExceededException",
            Self::AccessDenied => "AccessDeniedException",
            Self::Other(code) => code,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ResourceNotFound => ErrorClass::NotFound,
            Self::ResourceAlreadyExists => ErrorClass::AlreadyExists,
            Self::Throttling | Self::ServiceUnavailable | Self::Network => ErrorClass::Transient,
            Self::Validation | Self::InvalidInput => ErrorClass::Config,
            Self::LimitExceeded | Self::AccessDenied | Self::Other(_) => ErrorClass::Unknown,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    AlreadyExists,
    Transient,
    Config,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: ErrorCode,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    pub fn class(&self) -> ErrorClass {
        self.code.class()
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(DomainStatus),
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleting(DomainStatus),
    AlreadyDeleted,
}

#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn describe_domain(&self, domain_name: &str) -> Result<DomainStatus, ProviderError>;

    async fn create_domain(
        &self,
        request: &CreateDomainRequest,
    ) -> Result<DomainStatus, ProviderError>;

    async fn update_domain_config(
        &self,
        domain_name: &str,
        update: &DomainConfigUpdate,
    ) -> Result<DomainStatus, ProviderError>;

    async fn delete_domain(&self, domain_name: &str) -> Result<DomainStatus, ProviderError>;

    async fn describe_subnets(&self, subnet_ids: &[String])
        -> Result<Vec<SubnetInfo>, ProviderError>;
}

/// Create, treating an existing domain of the same name as success.
pub async fn create_if_absent(
    cloud: &dyn CloudApi,
    request: &CreateDomainRequest,
) -> Result<CreateOutcome, ProviderError> {
    match cloud.create_domain(request).await {
        Ok(status) => Ok(CreateOutcome::Created(status)),
        Err(e) if e.class() == ErrorClass::AlreadyExists => Ok(CreateOutcome::AlreadyExists),
        Err(e) => Err(e),
    }
}

/// Delete, treating a domain that is already gone as success.
pub async fn delete_if_present(
    cloud: &dyn CloudApi,
    domain_name: &str,
) -> Result<DeleteOutcome, ProviderError> {
    match cloud.delete_domain(domain_name).await {
        Ok(status) => Ok(DeleteOutcome::Deleting(status)),
        Err(e) if e.class() == ErrorClass::NotFound => Ok(DeleteOutcome::AlreadyDeleted),
        Err(e) => Err(e),
    }
}
