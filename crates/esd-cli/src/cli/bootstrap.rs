use std::path::PathBuf;

use clap::Parser;
use esd_common::bootstrap::BootstrapResources;
use esd_common::settings::Settings;
use tracing::info;

use crate::error::EsdCliResult;

#[derive(Parser, Debug, Clone)]
pub struct BootstrapArgs {
    /// Record location; defaults to `bootstrap.path` from the settings
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    #[command(subcommand)]
    pub action: BootstrapAction,
}

#[derive(Parser, Debug, Clone)]
pub enum BootstrapAction {
    #[command(about = "Print the record")]
    Show,
    #[command(about = "Check the record is usable")]
    Validate,
    #[command(about = "Write a new record")]
    Write {
        #[arg(long)]
        vpc_id: String,
        #[arg(long = "subnet-id", required = true)]
        subnet_ids: Vec<String>,
        #[arg(long, default_value = "AWSServiceRoleForAmazonElasticsearchService")]
        service_linked_role_name: String,
    },
}

pub async fn run(args: BootstrapArgs, config: &Settings) -> EsdCliResult<()> {
    let path = args.path.unwrap_or_else(|| config.bootstrap.path.clone());

    match args.action {
        BootstrapAction::Show => {
            let record = BootstrapResources::read(&path)?;
            print!("{}", serde_yaml::to_string(&record).map_err(anyhow::Error::from)?);
        }
        BootstrapAction::Validate => {
            let record = BootstrapResources::read(&path)?;
            info!(
                path = %path.display(),
                vpc = %record.vpc_id,
                subnets = record.vpc_subnet_ids.len(),
                "Bootstrap record is valid"
            );
        }
        BootstrapAction::Write {
            vpc_id,
            subnet_ids,
            service_linked_role_name,
        } => {
            let record = BootstrapResources {
                vpc_id,
                vpc_subnet_ids: subnet_ids,
                service_linked_role_name,
            };
            record.write(&path)?;
            info!(path = %path.display(), "Bootstrap record written");
        }
    }
    Ok(())
}
