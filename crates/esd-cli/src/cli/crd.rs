use std::path::PathBuf;

use clap::Parser;
use esd_common::settings::Settings;
use esd_operator::operator::crd_yaml;

use crate::error::EsdCliResult;

#[derive(Parser, Debug, Clone)]
pub struct CrdArgs {
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: CrdArgs, _config: &Settings) -> EsdCliResult<()> {
    let yaml = crd_yaml()?;
    match args.output {
        Some(path) => tokio::fs::write(&path, yaml).await?,
        None => print!("{yaml}"),
    }
    Ok(())
}
