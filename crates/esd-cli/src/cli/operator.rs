use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use esd_common::bootstrap::BootstrapResources;
use esd_common::settings::Settings;
use esd_operator::operator::operator;
use esd_operator::provider::SimulatedCloud;
use tracing::{info, warn};

use crate::error::EsdCliResult;

#[derive(Parser, Debug, Clone)]
pub struct OperatorArgs {
    /// Watch only this namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Bootstrap record that seeds the provider's network
    #[arg(short, long)]
    pub bootstrap: Option<PathBuf>,
}

pub async fn run(args: OperatorArgs, config: &Settings) -> EsdCliResult<()> {
    let mut settings = config.operator.clone();
    if args.namespace.is_some() {
        settings.namespace = args.namespace;
    }

    let path = args.bootstrap.unwrap_or_else(|| config.bootstrap.path.clone());
    let cloud = match BootstrapResources::read(&path) {
        Ok(record) => {
            info!(path = %path.display(), vpc = %record.vpc_id, "Loaded bootstrap record");
            SimulatedCloud::new().with_bootstrap(&record)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "No bootstrap record, VPC domains will not validate");
            SimulatedCloud::new()
        }
    };

    operator(&settings, Arc::new(cloud)).await?;
    Ok(())
}
