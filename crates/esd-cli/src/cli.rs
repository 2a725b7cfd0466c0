use std::path::PathBuf;

use clap::Parser;
use esd_common::{
    metadata::LevelFilter, settings::ObservabilityConfig, util::tracing::setup_tracing,
};

use crate::{error::EsdCliResult, init::init_config};

mod bootstrap;
mod crd;
mod info;
mod operator;
mod simulate;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Overrides `observability.log_level`
    #[clap(short('l'), long, value_name("LEVEL"))]
    pub log_level: Option<LevelFilter>,

    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Parser, Clone)]
pub enum Command {
    #[command(about = "Show build information")]
    Info(info::InfoArgs),
    #[command(about = "Print the ElasticsearchDomain CustomResourceDefinition")]
    Crd(crd::CrdArgs),
    #[command(about = "Inspect or write the bootstrap record", alias = "b")]
    Bootstrap(bootstrap::BootstrapArgs),
    #[command(about = "Run the ElasticsearchDomain controller", alias = "op")]
    Operator(operator::OperatorArgs),
    #[command(about = "Reconcile domain manifests against a simulated provider", alias = "sim")]
    Simulate(simulate::SimulateArgs),
}

pub async fn exec() -> EsdCliResult {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let cfg = match init_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Still report the failure through the default subscriber.
            setup_tracing(&ObservabilityConfig::default()).ok();
            return Err(e);
        }
    };
    setup_tracing(&cfg.observability)?;

    match cli.cmd {
        Command::Info(args) => info::run(args, &cfg).await?,
        Command::Crd(args) => crd::run(args, &cfg).await?,
        Command::Bootstrap(args) => bootstrap::run(args, &cfg).await?,
        Command::Operator(args) => operator::run(args, &cfg).await?,
        Command::Simulate(args) => simulate::run(args, &cfg).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_and_subcommand() {
        let cli = Cli::try_parse_from(["esd", "-l", "debug", "simulate", "demos/my-es-domain.yaml"])
            .unwrap();
        assert_eq!(cli.log_level, Some(LevelFilter::DEBUG));
        assert!(matches!(cli.cmd, Command::Simulate(_)));
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Cli::try_parse_from(["esd"]).is_err());
    }
}
