//! The bootstrap record written by the provisioning harness: the shared VPC,
//! its subnets and the service-linked role the provider needs for VPC
//! placement. The controller only ever reads it.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EsdError, EsdResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootstrapResources {
    #[serde(rename = "VPCID")]
    pub vpc_id: String,

    /// Ordered; one subnet per availability zone.
    #[serde(rename = "VPCSubnetIDs")]
    pub vpc_subnet_ids: Vec<String>,

    #[serde(rename = "ServiceLinkedRoleName")]
    pub service_linked_role_name: String,
}

impl BootstrapResources {
    pub fn read(path: &Path) -> EsdResult<Self> {
        if !path.exists() {
            return Err(EsdError::FileNotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let resources: Self = serde_yaml::from_str(&raw)?;
        resources.validate()?;
        Ok(resources)
    }

    pub fn write(&self, path: &Path) -> EsdResult {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> EsdResult {
        if self.vpc_id.is_empty() {
            return Err(EsdError::InvalidBootstrap("VPCID is empty".into()));
        }
        if self.vpc_subnet_ids.is_empty() {
            return Err(EsdError::InvalidBootstrap("VPCSubnetIDs is empty".into()));
        }
        let mut seen = BTreeSet::new();
        for subnet in &self.vpc_subnet_ids {
            if !seen.insert(subnet.as_str()) {
                return Err(EsdError::InvalidBootstrap(format!(
                    "subnet {subnet} is listed twice"
                )));
            }
        }
        if self.service_linked_role_name.is_empty() {
            return Err(EsdError::InvalidBootstrap(
                "ServiceLinkedRoleName is empty".into(),
            ));
        }
        Ok(())
    }
}
